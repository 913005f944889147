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
use std::convert::TryInto;
use std::io::{
    BufRead, Error as IoError,
    ErrorKind::{Other, UnexpectedEof},
    Read, Result as IoResult,
};

use httparse::{
    parse_chunk_size, InvalidChunkSize,
    Status::{Complete, Partial},
};

use super::{parse::parse, Error};

/// Strips the chunked transfer coding, yielding only the payload bytes.
pub struct ChunkedReader<R> {
    reader: R,
    rem: usize,
    state: State,
}

#[derive(PartialEq)]
enum State {
    Init,
    Next,
    Done,
}

impl<R> ChunkedReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            rem: 0,
            state: State::Init,
        }
    }
}

impl<R: BufRead> BufRead for ChunkedReader<R> {
    fn fill_buf(&mut self) -> IoResult<&[u8]> {
        if self.rem == 0 && self.state != State::Done {
            if self.state != State::Init {
                read_line_ending(&mut self.reader)?;
            } else {
                self.state = State::Next;
            }

            self.rem = read_chunk_size(&mut self.reader)?;

            if self.rem == 0 {
                skip_trailers(&mut self.reader)?;

                self.state = State::Done;
            }
        }

        if self.state == State::Done {
            return Ok(&[]);
        }

        let buf = self.reader.fill_buf()?;

        if buf.is_empty() {
            return Err(IoError::new(UnexpectedEof, "connection closed inside chunk"));
        }

        let len = buf.len().min(self.rem);

        Ok(&buf[..len])
    }

    fn consume(&mut self, mut amt: usize) {
        if amt > self.rem {
            amt = self.rem;
        }

        self.reader.consume(amt);
        self.rem -= amt;
    }
}

impl<R: BufRead> Read for ChunkedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        let read = self.fill_buf()?.read(buf)?;
        self.consume(read);
        Ok(read)
    }
}

fn read_chunk_size<R: BufRead>(reader: R) -> IoResult<usize> {
    parse(reader, |buf| match parse_chunk_size(buf) {
        Ok(Complete((parsed, chunk_size))) => {
            let chunk_size: usize = chunk_size
                .try_into()
                .map_err(|_| IoError::new(Other, Error::InvalidChunkSize))?;
            Ok(Complete((parsed, chunk_size)))
        }
        Ok(Partial) => Ok(Partial),
        Err(InvalidChunkSize) => Err(IoError::new(Other, Error::InvalidChunkSize)),
    })
}

fn read_line_ending<R: BufRead>(reader: R) -> IoResult<()> {
    parse(reader, |buf| {
        if buf.starts_with(b"\r\n") {
            Ok(Complete((2, ())))
        } else if buf == b"" || buf == b"\r" {
            Ok(Partial)
        } else {
            Err(IoError::new(Other, Error::InvalidLineEnding))
        }
    })
}

/// Trailer fields carry no payload; consume them up to and including the blank line.
fn skip_trailers<R: BufRead>(mut reader: R) -> IoResult<()> {
    loop {
        let empty = parse(&mut reader, |buf| match buf.windows(2).position(|w| w == b"\r\n") {
            Some(pos) => Ok(Complete((pos + 2, pos == 0))),
            None => Ok::<_, IoError>(Partial),
        })?;

        if empty {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::BufReader;

    #[test]
    fn parse_chunks() {
        let mut buf = Vec::new();
        ChunkedReader::new(&b"3\r\nfoo\r\n3\r\nbar\r\n0\r\n\r\n"[..])
            .read_to_end(&mut buf)
            .unwrap();
        assert_eq!(b"foobar", &buf[..]);
    }

    #[test]
    fn parse_empty_chunks() {
        let mut buf = Vec::new();
        ChunkedReader::new(&b"0\r\n\r\n"[..])
            .read_to_end(&mut buf)
            .unwrap();
        assert_eq!(b"", &buf[..]);
    }

    #[test]
    fn parse_chunks_with_extensions_and_trailers() {
        let mut buf = Vec::new();
        ChunkedReader::new(&b"4;name=value\r\n\x00\xff\r\n\r\n0\r\nExpires: never\r\n\r\n"[..])
            .read_to_end(&mut buf)
            .unwrap();
        assert_eq!(b"\x00\xff\r\n", &buf[..]);
    }

    #[test]
    fn leaves_following_bytes_unread() {
        let mut reader = BufReader::with_capacity(3, &b"2\r\nhi\r\n0\r\n\r\nrest"[..]);

        let mut buf = Vec::new();
        ChunkedReader::new(&mut reader)
            .read_to_end(&mut buf)
            .unwrap();
        assert_eq!(b"hi", &buf[..]);

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(b"rest", &rest[..]);
    }

    #[test]
    fn parse_missing_line_ending() {
        let mut buf = Vec::new();
        ChunkedReader::new(&b"0\r\n"[..])
            .read_to_end(&mut buf)
            .unwrap_err();
    }

    #[test]
    fn parse_truncated_chunk() {
        let mut buf = Vec::new();
        let err = ChunkedReader::new(&b"a\r\nshort"[..])
            .read_to_end(&mut buf)
            .unwrap_err();
        assert_eq!(UnexpectedEof, err.kind());
        assert_eq!(b"short", &buf[..]);
    }

    #[test]
    fn parse_invalid_chunk_size() {
        let mut buf = Vec::new();
        let err = ChunkedReader::new(&b"zz\r\nfoo\r\n0\r\n\r\n"[..])
            .read_to_end(&mut buf)
            .unwrap_err();

        match Error::from(err) {
            Error::InvalidChunkSize => (),
            err => panic!("Unexpected error: {}", err),
        }
    }

    #[test]
    fn parse_line_endings() {
        read_line_ending(&b"\r\nfoo"[..]).unwrap();

        let err = read_line_ending(&b"bar"[..]).unwrap_err();
        assert_eq!(Other, err.kind());

        let err = read_line_ending(&b"\rbaz"[..]).unwrap_err();
        assert_eq!(Other, err.kind());

        let err = read_line_ending(&b""[..]).unwrap_err();
        assert_eq!(UnexpectedEof, err.kind());

        let err = read_line_ending(&b"\r"[..]).unwrap_err();
        assert_eq!(UnexpectedEof, err.kind());
    }
}
