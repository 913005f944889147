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
use std::io::{BufRead, Read, Result as IoResult};

use http::{
    header::{HeaderMap, HeaderValue, ToStrError, CONTENT_LENGTH, TRANSFER_ENCODING},
    StatusCode,
};
use log::debug;

use super::{chunked::ChunkedReader, length::LengthReader, Error};

/// The response payload with the transfer framing removed.
///
/// The reader owns the connection it reads from, so dropping it releases the connection
/// whether or not the body was read to the end.
pub struct BodyReader(Box<dyn BufRead + Send>);

impl BodyReader {
    pub(crate) fn new(
        reader: Box<dyn BufRead + Send>,
        status: StatusCode,
        headers: &HeaderMap,
    ) -> Result<Self, Error> {
        if status.is_informational()
            || status == StatusCode::NO_CONTENT
            || status == StatusCode::NOT_MODIFIED
        {
            debug!("no body expected for status {}", status.as_u16());
            return Ok(Self(Box::new(LengthReader::new(reader, 0))));
        }

        if is_chunked(headers)? {
            debug!("reading chunked body");
            return Ok(Self(Box::new(ChunkedReader::new(reader))));
        }

        if let Some(len) = content_length(headers)? {
            debug!("reading body of length {}", len);
            return Ok(Self(Box::new(LengthReader::new(reader, len))));
        }

        debug!("reading body until connection is closed");
        Ok(Self(reader))
    }
}

impl BufRead for BodyReader {
    fn fill_buf(&mut self) -> IoResult<&[u8]> {
        self.0.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.0.consume(amt);
    }
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        self.0.read(buf)
    }
}

fn is_chunked(headers: &HeaderMap) -> Result<bool, Error> {
    for encodings in headers.get_all(TRANSFER_ENCODING) {
        if split_encodings(encodings)?.any(|encoding| encoding == "chunked") {
            return Ok(true);
        }
    }

    Ok(false)
}

fn content_length(headers: &HeaderMap) -> Result<Option<u64>, Error> {
    match headers.get(CONTENT_LENGTH) {
        Some(len) => len
            .to_str()?
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::InvalidContentLength),
        None => Ok(None),
    }
}

fn split_encodings(
    encodings: &HeaderValue,
) -> Result<impl Iterator<Item = String> + '_, ToStrError> {
    encodings.to_str().map(|encodings| {
        encodings
            .split(',')
            .map(str::trim)
            .map(str::to_ascii_lowercase)
    })
}
