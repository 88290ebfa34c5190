/**
 * MIT License
 *
 * Copyright (c) 2025 Takatoshi Kondo
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustls::{ClientConfig, ClientConnection, RootCertStore};
use rustls_pki_types::ServerName;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::mqtt::session::SessionConfig;

/// TLS port of the broker.
pub const BROKER_PORT: u16 = 8883;

/// Blocking TLS link to the broker.
///
/// The rustls session is shared between the receive thread and senders
/// behind a mutex, but the lock is never held across a blocking socket
/// read: raw bytes are pulled from the socket first and only then fed
/// into the locked session, so a sender never waits on a stalled read.
pub struct TlsLink {
    tls: Mutex<ClientConnection>,
    sock: TcpStream,
}

impl TlsLink {
    /// Establish a TCP (optionally proxied) and TLS session per the
    /// configured endpoint and credentials.
    pub fn connect(config: &SessionConfig) -> Result<Arc<TlsLink>> {
        let sock = match proxy_for(config) {
            Some(proxy) => connect_via_proxy(&proxy, config.endpoint())?,
            None => {
                debug!("connecting without proxy");
                TcpStream::connect((config.endpoint().as_str(), BROKER_PORT))?
            }
        };
        sock.set_nodelay(true)?;

        let tls_config = client_config(config.root_ca(), config.cert(), config.key())?;
        let server_name =
            ServerName::try_from(config.endpoint().to_owned()).map_err(|_| Error::Config)?;
        let mut tls =
            ClientConnection::new(Arc::new(tls_config), server_name).map_err(|e| {
                error!(error = %e, "failed to create TLS session");
                Error::Config
            })?;

        while tls.is_handshaking() {
            tls.complete_io(&mut &sock).map_err(|e| {
                error!(error = %e, "TLS handshake failed");
                Error::NoConn
            })?;
        }
        debug!("TLS session established");

        Ok(Arc::new(TlsLink {
            tls: Mutex::new(tls),
            sock,
        }))
    }

    /// Read decrypted bytes, blocking until at least one is available.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            {
                let mut tls = self.tls.lock().unwrap();
                match tls.reader().read(buf) {
                    Ok(0) => return Err(Error::NoConn),
                    Ok(n) => return Ok(n),
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(e) => return Err(e.into()),
                }
            }

            // No plaintext buffered; pull raw bytes with the session
            // unlocked.
            let mut raw = [0u8; 4096];
            let n = (&self.sock).read(&mut raw)?;
            if n == 0 {
                return Err(Error::NoConn);
            }

            let mut tls = self.tls.lock().unwrap();
            let mut fed = 0;
            while fed < n {
                let consumed = tls.read_tls(&mut &raw[fed..n])?;
                if consumed == 0 {
                    break;
                }
                fed += consumed;
                tls.process_new_packets().map_err(|e| {
                    error!(error = %e, "TLS protocol error");
                    Error::NoConn
                })?;
            }
            while tls.wants_write() {
                tls.write_tls(&mut &self.sock)?;
            }
        }
    }

    pub fn read_exact(&self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            filled += self.read(&mut buf[filled..])?;
        }
        Ok(())
    }

    pub fn write_all(&self, data: &[u8]) -> Result<()> {
        let mut tls = self.tls.lock().unwrap();
        tls.writer().write_all(data)?;
        while tls.wants_write() {
            tls.write_tls(&mut &self.sock)?;
        }
        Ok(())
    }

    /// Force-close the socket; the receive loop observes the error.
    pub fn shutdown(&self) {
        let _ = self.sock.shutdown(Shutdown::Both);
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.sock.set_read_timeout(timeout)?;
        Ok(())
    }
}

impl Read for &TlsLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        TlsLink::read(self, buf).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}

fn client_config(root_ca: &Path, cert: &Path, key: &Path) -> Result<ClientConfig> {
    let mut roots = RootCertStore::empty();
    let mut ca_reader = BufReader::new(File::open(root_ca).map_err(|e| {
        error!(?root_ca, error = %e, "failed to load root CA");
        Error::Config
    })?);
    for ca in rustls_pemfile::certs(&mut ca_reader) {
        let ca = ca.map_err(|_| Error::Config)?;
        roots.add(ca).map_err(|_| Error::Config)?;
    }
    if roots.is_empty() {
        error!(?root_ca, "no usable root certificate");
        return Err(Error::Config);
    }

    let mut cert_reader = BufReader::new(File::open(cert).map_err(|e| {
        error!(?cert, error = %e, "failed to load client certificate");
        Error::Config
    })?);
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| Error::Config)?;

    let mut key_reader = BufReader::new(File::open(key).map_err(|e| {
        error!(?key, error = %e, "failed to load client private key");
        Error::Config
    })?);
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|_| Error::Config)?
        .ok_or_else(|| {
            error!("no private key in key file");
            Error::Config
        })?;

    ClientConfig::builder()
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)
        .map_err(|e| {
            error!(error = %e, "client certificate and private key rejected");
            Error::Config
        })
}

struct ProxyInfo {
    host: String,
    port: u16,
}

/// Decide whether the endpoint goes through the configured HTTP proxy.
///
/// `https` proxies are not supported; `no_proxy` is a comma-separated
/// domain suffix list.
fn proxy_for(config: &SessionConfig) -> Option<ProxyInfo> {
    let uri = config.proxy_uri().as_deref()?;

    if let Some(no_proxy) = config.no_proxy().as_deref() {
        for entry in no_proxy.split(',') {
            let entry = entry.trim();
            if !entry.is_empty() && config.endpoint().ends_with(entry) {
                debug!(entry, "endpoint excluded from proxying");
                return None;
            }
        }
    }

    let rest = match uri.split_once("://") {
        Some(("http", rest)) => rest,
        Some(("https", _)) => {
            warn!("https proxies are not supported; connecting directly");
            return None;
        }
        Some((_, _)) => {
            warn!(uri, "unrecognized proxy scheme; connecting directly");
            return None;
        }
        None => uri,
    };

    // Userinfo is not forwarded; authenticating proxies are unsupported.
    let rest = match rest.rsplit_once('@') {
        Some((_, host_port)) => {
            warn!("ignoring proxy credentials");
            host_port
        }
        None => rest,
    };
    let rest = rest.trim_end_matches('/');

    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => (host, port.parse().ok()?),
        None => (rest, 80),
    };
    if host.is_empty() {
        warn!("no proxy host provided");
        return None;
    }

    Some(ProxyInfo {
        host: host.to_owned(),
        port,
    })
}

/// Open a tunnel to `endpoint:8883` through an HTTP CONNECT proxy.
fn connect_via_proxy(proxy: &ProxyInfo, endpoint: &str) -> Result<TcpStream> {
    debug!(proxy.host, proxy.port, "connecting via HTTP proxy");
    let mut sock = TcpStream::connect((proxy.host.as_str(), proxy.port))?;

    let request = format!(
        "CONNECT {endpoint}:{port} HTTP/1.1\r\nHost: {endpoint}:{port}\r\n\r\n",
        port = BROKER_PORT,
    );
    sock.write_all(request.as_bytes())?;

    // Read the response head only; the tunnel bytes follow it.
    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() > 4096 {
            error!("oversized proxy response");
            return Err(Error::Remote);
        }
        sock.read_exact(&mut byte)?;
        head.push(byte[0]);
    }

    let status_line = head.split(|&b| b == b'\r').next().unwrap_or(&[]);
    let ok = status_line
        .split(|&b| b == b' ')
        .nth(1)
        .is_some_and(|code| code == b"200");
    if !ok {
        error!(
            status = %String::from_utf8_lossy(status_line),
            "proxy refused CONNECT"
        );
        return Err(Error::Remote);
    }

    Ok(sock)
}
