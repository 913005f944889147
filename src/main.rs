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
use std::env::args;
use std::error::Error as StdError;
use std::io::{stderr, stdout, Write};
use std::process::ExitCode;

use log::error;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();

    let mut args = args();
    let program = args.next().unwrap_or_else(|| env!("CARGO_PKG_NAME").to_owned());

    let url = match args.next() {
        Some(url) => url,
        None => {
            eprintln!("missing argument");
            eprintln!("usage: {} <url>", program);
            return ExitCode::FAILURE;
        }
    };

    match httpget::fetch_to(&url, stdout().lock()) {
        Ok(_status) => ExitCode::SUCCESS,
        Err(err) => {
            error!("fetching {} failed: {:?}", url, err);
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn report(err: &dyn StdError) {
    let mut stderr = stderr().lock();

    let _ = writeln!(stderr, "Error: {}", err);

    let mut source = err.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  caused by: {}", cause);
        source = cause.source();
    }
}
