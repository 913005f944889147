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
#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener};
use std::sync::{Arc, Mutex};
use std::thread::{spawn, JoinHandle};

/// Replays one canned response per accepted connection, replacing `{uri}` with its own base URI.
pub struct MockServer {
    port: u16,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
    server: Option<JoinHandle<()>>,
}

impl MockServer {
    pub fn start(resps: Vec<&'static str>) -> Self {
        Self::start_raw(resps.into_iter().map(|resp| resp.as_bytes().to_vec()).collect())
    }

    pub fn start_raw(resps: Vec<Vec<u8>>) -> Self {
        let listener = TcpListener::bind("localhost:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let requests = Arc::new(Mutex::new(Vec::new()));
        let requests1 = requests.clone();

        let server = spawn(move || {
            let uri = format!("http://localhost:{port}");

            for resp in resps {
                let resp = replace_uri(&resp, &uri);

                let (mut stream, _peer_addr) = listener.accept().unwrap();

                stream.write_all(&resp).unwrap();
                stream.shutdown(Shutdown::Write).unwrap();

                // Clients may reset the connection instead of closing it if they skip the body.
                let mut buf = Vec::new();
                let _ = stream.read_to_end(&mut buf);

                requests1.lock().unwrap().push(buf);
            }
        });

        Self {
            port,
            requests,
            server: Some(server),
        }
    }

    pub fn uri(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// Requests received so far; only complete once the server has been dropped or all
    /// responses were consumed.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|req| String::from_utf8_lossy(req).into_owned())
            .collect()
    }

    pub fn join(mut self) -> Vec<String> {
        self.server.take().unwrap().join().unwrap();
        self.requests()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(server) = self.server.take() {
            server.join().unwrap();
        }
    }
}

fn replace_uri(resp: &[u8], uri: &str) -> Vec<u8> {
    const PLACEHOLDER: &[u8] = b"{uri}";

    let mut out = Vec::with_capacity(resp.len());
    let mut rest = resp;

    while let Some(pos) = rest.windows(PLACEHOLDER.len()).position(|w| w == PLACEHOLDER) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(uri.as_bytes());
        rest = &rest[pos + PLACEHOLDER.len()..];
    }

    out.extend_from_slice(rest);
    out
}

/// Port on localhost which nothing listens on.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("localhost:0").unwrap();
    listener.local_addr().unwrap().port()
}
