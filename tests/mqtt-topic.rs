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

use edge_runtime_core::mqtt::topic_filter_match;

#[test]
fn exact_match() {
    common::init_tracing();
    assert!(topic_filter_match(b"a/b/c", b"a/b/c"));
    assert!(!topic_filter_match(b"a/b/c", b"a/b"));
    assert!(!topic_filter_match(b"a/b", b"a/b/c"));
    assert!(!topic_filter_match(b"a/b/c", b"a/b/d"));
}

#[test]
fn single_level_wildcard() {
    common::init_tracing();
    assert!(topic_filter_match(b"a/+/c", b"a/b/c"));
    assert!(topic_filter_match(b"a/+/c", b"a/x/c"));
    assert!(!topic_filter_match(b"a/+/c", b"a/b/d"));
    assert!(!topic_filter_match(b"a/+/c", b"a/b/c/d"));
    assert!(!topic_filter_match(b"a/+/c", b"a/c"));
    assert!(topic_filter_match(b"+", b"finance"));
    assert!(!topic_filter_match(b"+", b"finance/stock"));
    // `+` matches an empty level.
    assert!(topic_filter_match(b"sport/+", b"sport/"));
}

#[test]
fn multi_level_wildcard() {
    common::init_tracing();
    assert!(topic_filter_match(b"#", b"a"));
    assert!(topic_filter_match(b"#", b"a/b/c"));
    assert!(topic_filter_match(b"sport/#", b"sport"));
    assert!(topic_filter_match(b"sport/#", b"sport/tennis"));
    assert!(topic_filter_match(b"sport/#", b"sport/tennis/player1"));
    assert!(!topic_filter_match(b"sport/#", b"sports"));
    // `#` must be the last level.
    assert!(!topic_filter_match(b"sport/#/x", b"sport/a/x"));
}

#[test]
fn dollar_topics_excluded_from_wildcards() {
    common::init_tracing();
    assert!(!topic_filter_match(b"#", b"$SYS/broker"));
    assert!(!topic_filter_match(b"+/broker", b"$SYS/broker"));
    assert!(topic_filter_match(b"$SYS/#", b"$SYS/broker"));
    assert!(topic_filter_match(b"$SYS/broker", b"$SYS/broker"));
}

#[test]
fn empty_inputs_never_match() {
    common::init_tracing();
    assert!(!topic_filter_match(b"", b"a"));
    assert!(!topic_filter_match(b"a", b""));
}
