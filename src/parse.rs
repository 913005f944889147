use std::io::{
    BufRead, Error as IoError,
    ErrorKind::{Other, UnexpectedEof},
};

use http::{response::Builder as ResponseBuilder, Response, Version};
use httparse::{
    Response as ResponseParser,
    Status::{self, Complete, Partial},
    EMPTY_HEADER,
};

use super::{Error, MAX_HEADERS, MAX_PARSE_BUF_LEN};

/// Runs `parser` over the buffered input until it reports a complete item,
/// consuming exactly the bytes it claims.
pub fn parse<R, P, T, E>(mut reader: R, parser: P) -> Result<T, E>
where
    R: BufRead,
    P: Fn(&[u8]) -> Result<Status<(usize, T)>, E>,
    E: From<IoError>,
{
    let buf = reader.fill_buf()?;
    if let Complete((parsed, val)) = parser(buf)? {
        reader.consume(parsed);
        return Ok(val);
    }

    parse_buffered(reader, parser)
}

#[cold]
fn parse_buffered<R, P, T, E>(mut reader: R, parser: P) -> Result<T, E>
where
    R: BufRead,
    P: Fn(&[u8]) -> Result<Status<(usize, T)>, E>,
    E: From<IoError>,
{
    let mut acc = Vec::new();
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Err(IoError::from(UnexpectedEof).into());
        }
        if acc.len() + buf.len() > MAX_PARSE_BUF_LEN {
            return Err(IoError::new(Other, "Maximum parse buffer length reached").into());
        }
        acc.extend_from_slice(buf);

        match parser(&acc)? {
            Complete((parsed, val)) => {
                let amt = parsed - (acc.len() - buf.len());
                reader.consume(amt);

                return Ok(val);
            }
            Partial => {
                let amt = buf.len();
                reader.consume(amt);
            }
        }
    }
}

/// Reads the status line and headers, leaving `reader` positioned at the first body byte.
pub fn read_response_head<R: BufRead>(reader: R) -> Result<Response<()>, Error> {
    let resp = parse(reader, |buf| -> Result<_, Error> {
        let mut headers = [EMPTY_HEADER; MAX_HEADERS];
        let mut parser = ResponseParser::new(&mut headers);

        match parser.parse(buf)? {
            Complete(parsed) => {
                let mut resp = ResponseBuilder::new();

                resp = resp.status(parser.code.ok_or(Error::MissingStatus)?);

                resp = match parser.version {
                    Some(0) => resp.version(Version::HTTP_10),
                    Some(1) => resp.version(Version::HTTP_11),
                    _ => resp,
                };

                for header in parser.headers.iter() {
                    resp = resp.header(header.name, header.value);
                }

                Ok(Complete((parsed, resp)))
            }
            Partial => Ok(Partial),
        }
    })?;

    resp.body(()).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{BufReader, Read};

    use http::{header::CONTENT_LENGTH, StatusCode};

    #[test]
    fn head_is_consumed_up_to_the_body() {
        let mut reader = &b"HTTP/1.1 404 Not Found\r\nContent-Length: 4\r\n\r\nnope"[..];

        let resp = read_response_head(&mut reader).unwrap();
        assert_eq!(StatusCode::NOT_FOUND, resp.status());
        assert_eq!(Version::HTTP_11, resp.version());
        assert_eq!("4", resp.headers()[CONTENT_LENGTH]);
        assert_eq!(b"nope", reader);
    }

    #[test]
    fn head_split_across_reads() {
        let data = b"HTTP/1.0 200 OK\r\nX-Padding: abcdefghijklmnopqrstuvwxyz\r\n\r\nbody";
        let mut reader = BufReader::with_capacity(7, &data[..]);

        let resp = read_response_head(&mut reader).unwrap();
        assert_eq!(StatusCode::OK, resp.status());
        assert_eq!(Version::HTTP_10, resp.version());

        let mut body = String::new();
        reader.read_to_string(&mut body).unwrap();
        assert_eq!("body", body);
    }

    #[test]
    fn truncated_head_is_an_error() {
        match read_response_head(&b"HTTP/1.1 200 OK\r\nServer: x"[..]) {
            Err(Error::Io(err)) => assert_eq!(UnexpectedEof, err.kind()),
            Err(err) => panic!("Unexpected error: {}", err),
            Ok(resp) => panic!("Unexpected response: {}", resp.status()),
        }
    }

    #[test]
    fn garbage_is_rejected() {
        match read_response_head(&b"SSH-2.0-OpenSSH_9.6\r\n\r\n"[..]) {
            Err(Error::Httparse(_)) => (),
            Err(err) => panic!("Unexpected error: {}", err),
            Ok(resp) => panic!("Unexpected response: {}", resp.status()),
        }
    }
}
