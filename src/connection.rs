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
use std::io::{Read, Result as IoResult, Write};

use http::uri::Scheme;
use log::{debug, trace};

use super::Error;

/// A byte pipe to a server which can be shut down explicitly.
pub trait Transport: Read + Write {
    fn close(&mut self) -> IoResult<()>;
}

/// Opens transports to an origin.
pub trait Connector {
    type Transport: Transport + Send + 'static;

    fn connect(&self, scheme: &Scheme, host: &str, port: u16) -> Result<Self::Transport, Error>;
}

/// Scoped ownership of a transport: it is closed exactly once, when the connection is
/// dropped or explicitly closed, on success and error paths alike.
pub struct Connection<T: Transport> {
    transport: T,
    closed: bool,
}

impl<T: Transport> Connection<T> {
    pub fn open<C>(connector: &C, scheme: &Scheme, host: &str, port: u16) -> Result<Self, Error>
    where
        C: Connector<Transport = T>,
    {
        debug!("connecting to {}:{}", host, port);

        let transport = connector.connect(scheme, host, port)?;

        Ok(Self {
            transport,
            closed: false,
        })
    }

    pub fn close(mut self) -> IoResult<()> {
        self.release()
    }

    fn release(&mut self) -> IoResult<()> {
        if self.closed {
            return Ok(());
        }

        self.closed = true;
        trace!("releasing connection");

        self.transport.close()
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            debug!("failed to close connection: {}", err);
        }
    }
}

impl<T: Transport> Read for Connection<T> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        self.transport.read(buf)
    }
}

impl<T: Transport> Write for Connection<T> {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        self.transport.write(buf)
    }

    fn flush(&mut self) -> IoResult<()> {
        self.transport.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{sink, ErrorKind::BrokenPipe};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    struct CountingTransport {
        closes: Arc<AtomicUsize>,
        fail_close: bool,
    }

    impl Read for CountingTransport {
        fn read(&mut self, _buf: &mut [u8]) -> IoResult<usize> {
            Ok(0)
        }
    }

    impl Write for CountingTransport {
        fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
            sink().write(buf)
        }

        fn flush(&mut self) -> IoResult<()> {
            Ok(())
        }
    }

    impl Transport for CountingTransport {
        fn close(&mut self) -> IoResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);

            if self.fail_close {
                Err(BrokenPipe.into())
            } else {
                Ok(())
            }
        }
    }

    struct CountingConnector {
        closes: Arc<AtomicUsize>,
        fail_close: bool,
    }

    impl Connector for CountingConnector {
        type Transport = CountingTransport;

        fn connect(&self, _scheme: &Scheme, _host: &str, _port: u16) -> Result<Self::Transport, Error> {
            Ok(CountingTransport {
                closes: self.closes.clone(),
                fail_close: self.fail_close,
            })
        }
    }

    fn connector(fail_close: bool) -> CountingConnector {
        CountingConnector {
            closes: Arc::new(AtomicUsize::new(0)),
            fail_close,
        }
    }

    #[test]
    fn drop_closes_once() {
        let connector = connector(false);

        let conn = Connection::open(&connector, &Scheme::HTTP, "localhost", 80).unwrap();
        assert_eq!(0, connector.closes.load(Ordering::SeqCst));

        drop(conn);
        assert_eq!(1, connector.closes.load(Ordering::SeqCst));
    }

    #[test]
    fn explicit_close_is_not_repeated_on_drop() {
        let connector = connector(false);

        let conn = Connection::open(&connector, &Scheme::HTTP, "localhost", 80).unwrap();
        conn.close().unwrap();

        assert_eq!(1, connector.closes.load(Ordering::SeqCst));
    }

    #[test]
    fn close_errors_are_reported_but_not_retried() {
        let connector = connector(true);

        let conn = Connection::open(&connector, &Scheme::HTTP, "localhost", 80).unwrap();
        assert_eq!(BrokenPipe, conn.close().unwrap_err().kind());

        assert_eq!(1, connector.closes.load(Ordering::SeqCst));
    }
}
