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
#![forbid(unsafe_code)]

//! Fetch a single URL with a blocking HTTP GET and stream the response body out verbatim.
//!
//! ```no_run
//! # use std::{error::Error, io::stdout};
//! use httpget::{Fetcher, Options};
//!
//! # fn main() -> Result<(), Box<dyn Error>> {
//! let fetcher = Fetcher::new(Options::default());
//! let status = fetcher.fetch_to("http://example.com/", stdout().lock())?;
//! assert!(status.is_success());
//! #
//! # Ok(())
//! # }
//! ```

mod body_reader;
mod chunked;
mod connection;
mod error;
mod length;
mod parse;
mod stream;

pub use http;
#[cfg(feature = "native-tls")]
pub use native_tls;
#[cfg(feature = "tls")]
pub use rustls;

pub use body_reader::BodyReader;
pub use connection::{Connection, Connector, Transport};
pub use error::Error;
pub use stream::{Stream, TcpConnector};

use std::convert::TryInto;
use std::io::{copy, BufReader, BufWriter, Write};
#[cfg(feature = "tls")]
use std::sync::Arc;

use http::{
    header::{HeaderValue, CONNECTION, HOST, LOCATION, USER_AGENT},
    request::{Builder as RequestBuilder, Parts as RequestParts},
    response::Response,
    uri::{Authority, PathAndQuery, Scheme, Uri},
    Method, StatusCode, Version,
};
use log::debug;
use url::Url;
#[cfg(feature = "native-tls")]
use native_tls::TlsConnector;
#[cfg(feature = "tls")]
use rustls::ClientConfig;

use parse::read_response_head;

#[derive(Clone)]
pub struct Options {
    /// Maximum number of redirects to follow, `None` returns redirect responses as they are.
    pub follow_redirects: Option<usize>,
    #[cfg(feature = "native-tls")]
    pub tls_connector: Option<TlsConnector>,
    #[cfg(feature = "tls")]
    pub client_config: Option<Arc<ClientConfig>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            follow_redirects: Some(5),
            #[cfg(feature = "native-tls")]
            tls_connector: None,
            #[cfg(feature = "tls")]
            client_config: None,
        }
    }
}

/// Performs one GET per call, over a fresh connection which is released before returning
/// or when the returned body is dropped.
pub struct Fetcher<C = TcpConnector> {
    connector: C,
    follow_redirects: Option<usize>,
}

impl Fetcher<TcpConnector> {
    pub fn new(opts: Options) -> Self {
        let connector = TcpConnector::new(&opts);

        Self::with_connector(connector, opts)
    }
}

impl Default for Fetcher<TcpConnector> {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl<C: Connector> Fetcher<C> {
    pub fn with_connector(connector: C, opts: Options) -> Self {
        Self {
            connector,
            follow_redirects: opts.follow_redirects,
        }
    }

    /// Sends the request and returns the final response with its body still unread.
    pub fn get(&self, url: &str) -> Result<Response<BodyReader>, Error> {
        let mut uri: Uri = url.parse()?;
        let mut redirects = self.follow_redirects;

        loop {
            let scheme = uri.scheme().ok_or(Error::MissingScheme)?.clone();
            let authority = uri.authority().ok_or(Error::MissingAuthority)?.clone();

            let port = match authority.port_u16() {
                Some(port) => port,
                None if scheme == Scheme::HTTP => 80,
                None if scheme == Scheme::HTTPS => 443,
                _ => return Err(Error::UnsupportedProtocol),
            };

            let parts = request_parts(&uri, &authority)?;

            let mut conn = Connection::open(&self.connector, &scheme, authority.host(), port)?;

            write_request(&mut conn, &parts)?;
            let resp = read_response(conn)?;

            debug!("status code {}", resp.status().as_u16());

            if let Some(location) = handle_redirects(&resp, &mut redirects)? {
                uri = resolve_location(&uri, &location)?;

                debug!("redirected to {}", uri);
                continue;
            }

            return Ok(resp);
        }
    }

    /// Writes `GET <url>`, `Response Code: <code>` and then the raw body to `out`.
    ///
    /// The trace line is written before connecting so that it appears even if the fetch fails.
    pub fn fetch_to<W: Write>(&self, url: &str, mut out: W) -> Result<StatusCode, Error> {
        writeln!(out, "GET {}", url)?;
        out.flush()?;

        let resp = self.get(url)?;

        let status = resp.status();
        writeln!(out, "Response Code: {}", status.as_u16())?;

        let mut body = resp.into_body();
        let copied = copy(&mut body, &mut out)?;
        drop(body);

        debug!("copied {} body bytes", copied);

        out.flush()?;

        Ok(status)
    }
}

/// Fetches `url` with the default options, see [`Fetcher::fetch_to`].
pub fn fetch_to<W: Write>(url: &str, out: W) -> Result<StatusCode, Error> {
    Fetcher::new(Options::default()).fetch_to(url, out)
}

fn request_parts(uri: &Uri, authority: &Authority) -> Result<RequestParts, Error> {
    let host: HeaderValue = match authority.port() {
        Some(port) => format!("{}:{}", authority.host(), port).try_into()?,
        None => authority.host().try_into()?,
    };

    let (parts, ()) = RequestBuilder::new()
        .method(Method::GET)
        .uri(uri.clone())
        .version(Version::HTTP_11)
        .header(HOST, host)
        .header(USER_AGENT, HeaderValue::from_static(DEF_USER_AGENT))
        .header(CONNECTION, HeaderValue::from_static("close"))
        .body(())?
        .into_parts();

    Ok(parts)
}

fn write_request<W: Write>(writer: W, parts: &RequestParts) -> Result<(), Error> {
    let mut writer = BufWriter::new(writer);

    let target = parts.uri.path_and_query().map_or("/", PathAndQuery::as_str);

    debug!("{} {} {:?}", parts.method, target, parts.version);

    write!(writer, "{} {} {:?}\r\n", parts.method, target, parts.version)?;

    for (key, value) in &parts.headers {
        writer.write_all(key.as_ref())?;
        writer.write_all(b": ")?;
        writer.write_all(value.as_bytes())?;
        writer.write_all(b"\r\n")?;
    }

    writer.write_all(b"\r\n")?;

    writer.flush()?;

    Ok(())
}

fn read_response<T: Transport + Send + 'static>(
    conn: Connection<T>,
) -> Result<Response<BodyReader>, Error> {
    let mut reader = BufReader::new(conn);

    let parts = loop {
        let (parts, ()) = read_response_head(&mut reader)?.into_parts();

        if parts.status.is_informational() && parts.status != StatusCode::SWITCHING_PROTOCOLS {
            debug!("skipping interim response {}", parts.status.as_u16());
            continue;
        }

        break parts;
    };

    let body = BodyReader::new(Box::new(reader), parts.status, &parts.headers)?;

    Ok(Response::from_parts(parts, body))
}

fn handle_redirects(
    resp: &Response<BodyReader>,
    redirects: &mut Option<usize>,
) -> Result<Option<String>, Error> {
    if let Some(redirects) = redirects {
        match resp.status().as_u16() {
            301 | 302 | 303 | 307 | 308 => {
                let location = match resp.headers().get(LOCATION) {
                    Some(location) => location.to_str()?.trim().to_owned(),
                    None => return Ok(None),
                };

                if *redirects == 0 {
                    return Err(Error::TooManyRedirects);
                }

                *redirects -= 1;

                return Ok(Some(location));
            }
            _ => (),
        }
    }

    Ok(None)
}

/// Resolves a `Location` value against the URI that produced it.
fn resolve_location(base: &Uri, location: &str) -> Result<Uri, Error> {
    let mut url = match Url::parse(location) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(&base.to_string())?;

            base.join(location)?
        }
        Err(err) => return Err(err.into()),
    };

    url.set_fragment(None);

    url.as_str().parse().map_err(Error::from)
}

const DEF_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const MAX_HEADERS: usize = 128;
const MAX_PARSE_BUF_LEN: usize = MAX_HEADERS * 1024;
