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
use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Everything that can go wrong between parsing the URL and reading the last body byte.
#[derive(Debug)]
pub enum Error {
    MissingScheme,
    MissingAuthority,
    MissingStatus,
    UnsupportedProtocol,
    TooManyRedirects,
    InvalidChunkSize,
    InvalidLineEnding,
    InvalidContentLength,
    Io(io::Error),
    Http(http::Error),
    HttpInvalidUri(http::uri::InvalidUri),
    HttpHeaderInvalidValue(http::header::InvalidHeaderValue),
    HttpHeaderToStr(http::header::ToStrError),
    Httparse(httparse::Error),
    Url(url::ParseError),
    #[cfg(feature = "native-tls")]
    NativeTls(native_tls::Error),
    #[cfg(feature = "tls")]
    Tls(rustls::Error),
    #[cfg(feature = "tls")]
    InvalidDnsName(String),
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Http(err) => Some(err),
            Self::HttpInvalidUri(err) => Some(err),
            Self::HttpHeaderInvalidValue(err) => Some(err),
            Self::HttpHeaderToStr(err) => Some(err),
            Self::Httparse(err) => Some(err),
            Self::Url(err) => Some(err),
            #[cfg(feature = "native-tls")]
            Self::NativeTls(err) => Some(err),
            #[cfg(feature = "tls")]
            Self::Tls(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingScheme => write!(fmt, "Missing scheme"),
            Self::MissingAuthority => write!(fmt, "Missing authority"),
            Self::MissingStatus => write!(fmt, "Missing status"),
            Self::UnsupportedProtocol => write!(fmt, "Unsupported protocol"),
            Self::TooManyRedirects => write!(fmt, "Too many redirects"),
            Self::InvalidChunkSize => write!(fmt, "Invalid chunk size"),
            Self::InvalidLineEnding => write!(fmt, "Invalid line ending"),
            Self::InvalidContentLength => write!(fmt, "Invalid content length"),
            Self::Io(_) => write!(fmt, "I/O error"),
            Self::Http(_) => write!(fmt, "HTTP error"),
            Self::HttpInvalidUri(_) => write!(fmt, "HTTP invalid URI"),
            Self::HttpHeaderInvalidValue(_) => write!(fmt, "HTTP header invalid value"),
            Self::HttpHeaderToStr(_) => write!(fmt, "HTTP header to string"),
            Self::Httparse(_) => write!(fmt, "HTTP parser error"),
            Self::Url(_) => write!(fmt, "Invalid redirect location"),
            #[cfg(feature = "native-tls")]
            Self::NativeTls(_) => write!(fmt, "TLS error"),
            #[cfg(feature = "tls")]
            Self::Tls(_) => write!(fmt, "TLS error"),
            #[cfg(feature = "tls")]
            Self::InvalidDnsName(name) => write!(fmt, "Invalid DNS name: {}", name),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        // Framing errors raised inside `Read` impls travel as `io::Error`; unwrap them again.
        if err.get_ref().map_or(false, |inner| inner.is::<Error>()) {
            if let Some(inner) = err.into_inner() {
                if let Ok(err) = inner.downcast::<Error>() {
                    return *err;
                }
            }

            return Self::Io(io::ErrorKind::Other.into());
        }

        Self::Io(err)
    }
}

impl From<io::ErrorKind> for Error {
    fn from(err: io::ErrorKind) -> Self {
        Self::Io(err.into())
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Self::Http(err)
    }
}

impl From<http::uri::InvalidUri> for Error {
    fn from(err: http::uri::InvalidUri) -> Self {
        Self::HttpInvalidUri(err)
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::HttpHeaderInvalidValue(err)
    }
}

impl From<http::header::ToStrError> for Error {
    fn from(err: http::header::ToStrError) -> Self {
        Self::HttpHeaderToStr(err)
    }
}

impl From<httparse::Error> for Error {
    fn from(err: httparse::Error) -> Self {
        Self::Httparse(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::Url(err)
    }
}

#[cfg(feature = "native-tls")]
impl From<native_tls::Error> for Error {
    fn from(err: native_tls::Error) -> Self {
        Self::NativeTls(err)
    }
}

#[cfg(feature = "tls")]
impl From<rustls::Error> for Error {
    fn from(err: rustls::Error) -> Self {
        Self::Tls(err)
    }
}
