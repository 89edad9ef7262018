// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! shape_main - DDS Shapes interoperability exerciser
//!
//! Publishes or subscribes `ShapeType` samples with the QoS given on the
//! command line and prints one line per sample, so that two runs (possibly
//! built on different DDS implementations) can be compared.
//!
//! The provider is the in-process loopback bus, private to this process: a
//! publisher and a subscriber started as two separate `shape_main` processes
//! do not see each other. Runs against another DDS implementation need a
//! provider backed by a real transport.
//!
//! Exit codes: 0 done, 1 bad arguments, 2 initialization failure,
//! 3 run-time failure.

use clap::CommandFactory;
use shapes::config::{self, ShapeArgs, ShapeOptions};
use shapes::provider::loopback::{LoopbackBus, LoopbackProvider};
use shapes::provider::ConsoleListener;
use shapes::{Error, ExitCode, StopFlag};
use std::process;
use std::sync::Arc;

fn main() {
    let args = match config::parse_args(std::env::args_os()) {
        Ok(args) => args,
        Err(e) => exit_with(Error::from(e)),
    };

    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();

    let options = match ShapeOptions::from_args(args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", ShapeArgs::command().render_usage());
            process::exit(ExitCode::BadArguments.code());
        }
    };
    for warning in &options.warnings {
        log::warn!("{}", warning);
    }

    let stop = StopFlag::new();
    let handler = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || handler.stop()) {
        log::warn!("failed to install Ctrl-C handler: {}", e);
    }

    let provider = LoopbackProvider::new(LoopbackBus::new());
    let mut stdout = std::io::stdout();
    match shapes::run(provider, &options, Arc::new(ConsoleListener), &stop, &mut stdout) {
        Ok(()) => println!("Done."),
        Err(e) => exit_with(e),
    }
}

fn exit_with(err: Error) -> ! {
    let code = err.exit_code();
    if code == ExitCode::Ok {
        print!("{}", err);
    } else {
        eprintln!("Error: {}", err);
    }
    process::exit(code.code());
}
