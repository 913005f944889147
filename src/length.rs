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
use std::io::{BufRead, Error as IoError, ErrorKind::UnexpectedEof, Read, Result as IoResult};

/// Yields exactly `Content-Length` bytes and treats an early end of stream as an error.
pub struct LengthReader<R> {
    reader: R,
    rem: u64,
}

impl<R> LengthReader<R> {
    pub fn new(reader: R, len: u64) -> Self {
        Self { reader, rem: len }
    }
}

impl<R: BufRead> BufRead for LengthReader<R> {
    fn fill_buf(&mut self) -> IoResult<&[u8]> {
        if self.rem == 0 {
            return Ok(&[]);
        }

        let buf = self.reader.fill_buf()?;

        if buf.is_empty() {
            return Err(IoError::new(
                UnexpectedEof,
                "connection closed before Content-Length was reached",
            ));
        }

        let len = (buf.len() as u64).min(self.rem) as usize;

        Ok(&buf[..len])
    }

    fn consume(&mut self, amt: usize) {
        let amt = (amt as u64).min(self.rem);

        self.reader.consume(amt as usize);
        self.rem -= amt;
    }
}

impl<R: BufRead> Read for LengthReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        let read = self.fill_buf()?.read(buf)?;
        self.consume(read);
        Ok(read)
    }
}
