// Copyright 2020 Adam Reichold
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// 	http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
#[cfg(feature = "tls")]
use std::convert::TryFrom;
use std::io::{ErrorKind::NotConnected, Read, Result as IoResult, Write};
use std::net::{Shutdown, TcpStream};
#[cfg(feature = "tls")]
use std::sync::Arc;

use http::uri::Scheme;
#[cfg(feature = "native-tls")]
use native_tls::{HandshakeError, TlsConnector, TlsStream};
#[cfg(feature = "tls")]
use once_cell::sync::Lazy;
#[cfg(feature = "tls")]
use rustls::{pki_types::ServerName, ClientConfig, ClientConnection, RootCertStore, StreamOwned};
#[cfg(feature = "tls")]
use webpki_roots::TLS_SERVER_ROOTS;

use super::{
    connection::{Connector, Transport},
    Error, Options,
};

pub enum Stream {
    Tcp(TcpStream),
    #[cfg(feature = "native-tls")]
    NativeTls(TlsStream<TcpStream>),
    #[cfg(feature = "tls")]
    Rustls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

/// Connects over plain TCP, or TLS for `https` when a TLS backend is compiled in.
#[derive(Clone, Default)]
pub struct TcpConnector {
    #[cfg(feature = "native-tls")]
    tls_connector: Option<TlsConnector>,
    #[cfg(feature = "tls")]
    client_config: Option<Arc<ClientConfig>>,
}

impl TcpConnector {
    pub fn new(opts: &Options) -> Self {
        #[cfg(not(any(feature = "native-tls", feature = "tls")))]
        let _ = opts;

        Self {
            #[cfg(feature = "native-tls")]
            tls_connector: opts.tls_connector.clone(),
            #[cfg(feature = "tls")]
            client_config: opts.client_config.clone(),
        }
    }
}

impl Connector for TcpConnector {
    type Transport = Stream;

    fn connect(&self, scheme: &Scheme, host: &str, port: u16) -> Result<Stream, Error> {
        Stream::new(scheme, host, port, self)
    }
}

impl Stream {
    pub fn new(
        scheme: &Scheme,
        host: &str,
        port: u16,
        connector: &TcpConnector,
    ) -> Result<Self, Error> {
        if scheme == &Scheme::HTTP {
            let stream = connect(host, port)?;

            return Ok(Self::Tcp(stream));
        }

        #[cfg(feature = "native-tls")]
        if scheme == &Scheme::HTTPS {
            let stream = connect(host, port)?;
            let stream =
                perform_native_tls_handshake(stream, host, connector.tls_connector.as_ref())?;

            return Ok(Self::NativeTls(stream));
        }

        #[cfg(feature = "tls")]
        if scheme == &Scheme::HTTPS {
            let stream = connect(host, port)?;
            let stream = perform_rustls_handshake(stream, host, connector.client_config.as_ref())?;

            return Ok(Self::Rustls(Box::new(stream)));
        }

        let _ = connector;

        Err(Error::UnsupportedProtocol)
    }

    fn socket(&self) -> &TcpStream {
        match self {
            Self::Tcp(stream) => stream,
            #[cfg(feature = "native-tls")]
            Self::NativeTls(stream) => stream.get_ref(),
            #[cfg(feature = "tls")]
            Self::Rustls(stream) => &stream.sock,
        }
    }
}

/// Tries each resolved address in turn and keeps the first that accepts.
fn connect(host: &str, port: u16) -> Result<TcpStream, Error> {
    // `Uri` keeps the brackets around IPv6 literals.
    let host = host.trim_start_matches('[').trim_end_matches(']');

    TcpStream::connect((host, port)).map_err(Error::from)
}

#[cfg(feature = "native-tls")]
fn perform_native_tls_handshake(
    stream: TcpStream,
    host: &str,
    tls_connector: Option<&TlsConnector>,
) -> Result<TlsStream<TcpStream>, Error> {
    let handshake = match tls_connector {
        Some(tls_connector) => tls_connector.connect(host, stream),
        None => TlsConnector::new()?.connect(host, stream),
    };

    match handshake {
        Ok(stream) => Ok(stream),
        Err(HandshakeError::Failure(err)) => Err(err.into()),
        Err(HandshakeError::WouldBlock(mut stream)) => loop {
            match stream.handshake() {
                Ok(stream) => return Ok(stream),
                Err(HandshakeError::Failure(err)) => return Err(err.into()),
                Err(HandshakeError::WouldBlock(stream1)) => stream = stream1,
            }
        },
    }
}

#[cfg(feature = "tls")]
static DEFAULT_CLIENT_CONFIG: Lazy<Arc<ClientConfig>> = Lazy::new(|| {
    let mut root_store = RootCertStore::empty();
    root_store.extend(TLS_SERVER_ROOTS.iter().cloned());

    let client_config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(client_config)
});

#[cfg(feature = "tls")]
fn perform_rustls_handshake(
    mut stream: TcpStream,
    host: &str,
    client_config: Option<&Arc<ClientConfig>>,
) -> Result<StreamOwned<ClientConnection, TcpStream>, Error> {
    let name = host.trim_start_matches('[').trim_end_matches(']');
    let name = ServerName::try_from(name)
        .map_err(|_| Error::InvalidDnsName(host.to_owned()))?
        .to_owned();

    let client_config = client_config
        .cloned()
        .unwrap_or_else(|| DEFAULT_CLIENT_CONFIG.clone());

    let mut conn = ClientConnection::new(client_config, name)?;

    while conn.is_handshaking() {
        conn.complete_io(&mut stream)?;
    }

    Ok(StreamOwned::new(conn, stream))
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(feature = "native-tls")]
            Self::NativeTls(stream) => stream.read(buf),
            #[cfg(feature = "tls")]
            Self::Rustls(stream) => stream.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(feature = "native-tls")]
            Self::NativeTls(stream) => stream.write(buf),
            #[cfg(feature = "tls")]
            Self::Rustls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> IoResult<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(feature = "native-tls")]
            Self::NativeTls(stream) => stream.flush(),
            #[cfg(feature = "tls")]
            Self::Rustls(stream) => stream.flush(),
        }
    }
}

impl Transport for Stream {
    fn close(&mut self) -> IoResult<()> {
        // The peer may already be gone.
        match self {
            Self::Tcp(_) => (),
            #[cfg(feature = "native-tls")]
            Self::NativeTls(stream) => {
                let _ = stream.shutdown();
            }
            #[cfg(feature = "tls")]
            Self::Rustls(stream) => {
                stream.conn.send_close_notify();
                let _ = stream.conn.complete_io(&mut stream.sock);
            }
        }

        match self.socket().shutdown(Shutdown::Both) {
            Err(err) if err.kind() == NotConnected => Ok(()),
            res => res,
        }
    }
}
