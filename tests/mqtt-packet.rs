// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

mod common;

use edge_runtime_core::error::Error;
use edge_runtime_core::mqtt::packet::{
    decode_remaining_length, encode_packet_id_only, encode_pingreq, encode_remaining_length,
    parse_packet, AckKind, Connect, Packet, Publish, Qos, Subscribe, SubEntry,
    MAX_REMAINING_LENGTH,
};

#[test]
fn remaining_length_vectors() {
    common::init_tracing();
    let cases: &[(u32, &[u8])] = &[
        (0, &[0x00]),
        (127, &[0x7F]),
        (128, &[0x80, 0x01]),
        (16_383, &[0xFF, 0x7F]),
        (16_384, &[0x80, 0x80, 0x01]),
        (MAX_REMAINING_LENGTH, &[0xFF, 0xFF, 0xFF, 0x7F]),
    ];
    for (value, encoded) in cases {
        let mut out = Vec::new();
        encode_remaining_length(*value, &mut out).unwrap();
        assert_eq!(out, *encoded, "encoding {value}");
        assert_eq!(
            decode_remaining_length(encoded).unwrap(),
            Some((*value, encoded.len()))
        );
    }

    let mut out = Vec::new();
    assert_eq!(
        encode_remaining_length(MAX_REMAINING_LENGTH + 1, &mut out),
        Err(Error::Range)
    );
    // Truncated continuation: need more bytes.
    assert_eq!(decode_remaining_length(&[0x80]).unwrap(), None);
    // Five continuation bytes is malformed.
    assert_eq!(
        decode_remaining_length(&[0x80, 0x80, 0x80, 0x80, 0x01]),
        Err(Error::Parse)
    );
}

#[test]
fn connect_wire_format() {
    common::init_tracing();
    let connect = Connect::builder()
        .client_id("a")
        .keep_alive(30)
        .clean_session(true)
        .build()
        .unwrap();
    assert_eq!(
        connect.to_bytes(),
        [
            0x10, 13, // fixed header
            0, 4, b'M', b'Q', b'T', b'T', 4,    // protocol name + level
            0x02, // clean session
            0, 30, // keep alive
            0, 1, b'a', // client id
        ]
    );

    assert_eq!(
        Connect::builder().build().unwrap_err(),
        Error::Range,
        "empty client id rejected"
    );
}

#[test]
fn connack_parsing() {
    common::init_tracing();
    match parse_packet(0x20, &[0x00, 0x00]).unwrap() {
        Packet::Connack(connack) => {
            assert!(connack.accepted());
            assert!(!connack.session_present());
        }
        other => panic!("unexpected packet {other:?}"),
    }
    // Refused: server unavailable.
    match parse_packet(0x20, &[0x00, 0x03]).unwrap() {
        Packet::Connack(connack) => assert!(!connack.accepted()),
        other => panic!("unexpected packet {other:?}"),
    }
    assert_eq!(parse_packet(0x20, &[0x00]), Err(Error::Parse));
}

#[test]
fn publish_qos0_roundtrip() {
    common::init_tracing();
    let publish = Publish::builder()
        .topic(b"a/b".as_slice())
        .payload(b"\x01\x02".as_slice())
        .build()
        .unwrap();
    let bytes = publish.to_bytes();
    assert_eq!(bytes, [0x30, 7, 0, 3, b'a', b'/', b'b', 0x01, 0x02]);

    match parse_packet(bytes[0], &bytes[2..]).unwrap() {
        Packet::Publish(parsed) => {
            assert_eq!(parsed.topic(), b"a/b");
            assert_eq!(parsed.payload(), b"\x01\x02");
            assert_eq!(parsed.qos(), Qos::AtMostOnce);
            assert_eq!(parsed.packet_id(), None);
        }
        other => panic!("unexpected packet {other:?}"),
    }
}

#[test]
fn publish_qos1_carries_packet_id_and_flags() {
    common::init_tracing();
    let publish = Publish::builder()
        .topic(b"t".as_slice())
        .qos(Qos::AtLeastOnce)
        .packet_id(0x1234)
        .retain(true)
        .payload(b"x".as_slice())
        .build()
        .unwrap();
    let bytes = publish.to_bytes();
    assert_eq!(bytes[0], 0x33); // qos 1 + retain

    match parse_packet(bytes[0], &bytes[2..]).unwrap() {
        Packet::Publish(parsed) => {
            assert_eq!(parsed.packet_id(), Some(0x1234));
            assert!(parsed.retain());
            assert!(!parsed.dup());
        }
        other => panic!("unexpected packet {other:?}"),
    }

    // A duplicate delivery sets bit 3.
    match parse_packet(bytes[0] | 0x08, &bytes[2..]).unwrap() {
        Packet::Publish(parsed) => assert!(parsed.dup()),
        other => panic!("unexpected packet {other:?}"),
    }
}

#[test]
fn publish_builder_validation() {
    common::init_tracing();
    assert_eq!(
        Publish::builder().payload(b"x".as_slice()).build().unwrap_err(),
        Error::Range,
        "topic required"
    );
    assert_eq!(
        Publish::builder()
            .topic(b"t".as_slice())
            .qos(Qos::AtLeastOnce)
            .build()
            .unwrap_err(),
        Error::Invalid,
        "qos > 0 requires a packet id"
    );
    assert_eq!(
        Publish::builder()
            .topic(b"t".as_slice())
            .packet_id(1)
            .build()
            .unwrap_err(),
        Error::Invalid,
        "qos 0 forbids a packet id"
    );
}

#[test]
fn subscribe_wire_format() {
    common::init_tracing();
    let subscribe = Subscribe::new(
        7,
        vec![
            SubEntry {
                filter: b"a/+".to_vec(),
                qos: Qos::AtLeastOnce,
            },
            SubEntry {
                filter: b"b".to_vec(),
                qos: Qos::AtLeastOnce,
            },
        ],
    )
    .unwrap();
    assert_eq!(
        subscribe.to_bytes(),
        [0x82, 10, 0, 7, 0, 3, b'a', b'/', b'+', 1, 0, 1, b'b', 1]
    );
}

#[test]
fn suback_and_acks() {
    common::init_tracing();
    match parse_packet(0x90, &[0, 7, 1]).unwrap() {
        Packet::Suback(suback) => {
            assert_eq!(suback.packet_id, 7);
            assert_eq!(suback.return_codes, vec![1]);
            assert!(!suback.any_rejected());
        }
        other => panic!("unexpected packet {other:?}"),
    }
    match parse_packet(0x90, &[0, 7, 0x80]).unwrap() {
        Packet::Suback(suback) => assert!(suback.any_rejected()),
        other => panic!("unexpected packet {other:?}"),
    }

    assert_eq!(
        encode_packet_id_only(AckKind::Puback, 0x0102),
        [0x40, 2, 1, 2]
    );
    assert_eq!(
        encode_packet_id_only(AckKind::Pubrel, 5),
        [0x62, 2, 0, 5]
    );
    assert_eq!(
        parse_packet(0x40, &[1, 2]).unwrap(),
        Packet::Puback { packet_id: 0x0102 }
    );

    assert_eq!(encode_pingreq(), [0xC0, 0]);
    assert_eq!(parse_packet(0xD0, &[]).unwrap(), Packet::Pingresp);
    assert_eq!(parse_packet(0xD0, &[0]), Err(Error::Parse));
}
