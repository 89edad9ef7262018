// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Shapes - DDS interoperability exerciser
//!
//! Drives the `ShapeType` data type through a pub/sub middleware while varying
//! QoS, so that independent DDS implementations can be checked against each
//! other. The engine never talks to a middleware directly: everything goes
//! through the [`Provider`](provider::Provider) trait. An in-process
//! [`LoopbackProvider`](provider::loopback::LoopbackProvider) ships with the
//! crate.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shapes::config::ShapeOptions;
//! use shapes::provider::loopback::{LoopbackBus, LoopbackProvider};
//! use shapes::provider::ConsoleListener;
//! use shapes::{run, StopFlag};
//! use std::sync::Arc;
//!
//! let options = ShapeOptions::parse_from(["shape_main", "-P", "-t", "Square", "-c", "RED"])?;
//! let provider = LoopbackProvider::new(LoopbackBus::new());
//! run(provider, &options, Arc::new(ConsoleListener), &StopFlag::new(), &mut std::io::stdout())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |  shape_main: clap args -> env_logger -> ctrlc -> exit code    |
//! +---------------------------------------------------------------+
//! |  config    | ShapeOptions, validation, options -> QoS          |
//! |  entities  | participant, topics x N, writers / readers        |
//! |  publication / subscription loops  (motion, coherent sets)    |
//! +---------------------------------------------------------------+
//! |  provider::Provider  (handles, loans, masks, listeners)       |
//! |  provider::loopback  (in-process bus, caches, filters)        |
//! +---------------------------------------------------------------+
//! ```

pub mod config;
pub mod entities;
pub mod error;
pub mod motion;
pub mod provider;
pub mod publication;
pub mod qos;
pub mod shape;
pub mod stop;
pub mod subscription;

pub use config::{Role, ShapeOptions};
pub use entities::ShapeEntities;
pub use error::{Error, ExitCode, ProviderError, Result};
pub use shape::ShapeType;
pub use stop::StopFlag;

use provider::{EntityListener, Provider};
use std::io::Write;
use std::sync::Arc;

/// Create the entities for `options` and run the matching loop until it stops.
pub fn run<P: Provider>(
    provider: P,
    options: &ShapeOptions,
    listener: Arc<dyn EntityListener>,
    stop: &StopFlag,
    out: &mut dyn Write,
) -> Result<()> {
    log::info!(
        "[shapes] {} on topic '{}' via {} provider",
        match options.role {
            Role::Publish => "publishing",
            Role::Subscribe => "subscribing",
        },
        options.topic_name,
        provider.name()
    );
    let mut entities = ShapeEntities::initialize(provider, options, Some(listener), out)?;
    let result = match options.role {
        Role::Publish => publication::run(&mut entities, options, stop, out).map(|report| {
            log::info!("[shapes] {}", report);
        }),
        Role::Subscribe => subscription::run(&mut entities, options, stop, out).map(|report| {
            log::info!("[shapes] {}", report);
        }),
    };
    entities.teardown();
    result
}
