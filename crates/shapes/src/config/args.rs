// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Raw command line, as accepted by `shape_main`.

use crate::motion::BounceMode;
use clap::{Parser, ValueEnum};

/// DDS Shapes interoperability exerciser
#[derive(Parser, Debug, Clone)]
#[command(name = "shape_main")]
#[command(version)]
#[command(about = "Publish or subscribe Shape samples with configurable QoS")]
pub struct ShapeArgs {
    /// Domain id
    #[arg(short = 'd', long = "domain", default_value_t = 0)]
    pub domain_id: u32,

    /// BEST_EFFORT reliability
    #[arg(short = 'b', long = "best-effort", conflicts_with = "reliable")]
    pub best_effort: bool,

    /// RELIABLE reliability (default)
    #[arg(short = 'r', long = "reliable")]
    pub reliable: bool,

    /// History depth, 0 = KEEP_ALL
    #[arg(short = 'k', long = "history-depth", allow_negative_numbers = true)]
    pub history_depth: Option<i64>,

    /// Deadline period in milliseconds
    #[arg(short = 'f', long = "deadline", value_name = "MS")]
    pub deadline_ms: Option<u64>,

    /// Time-based filter minimum separation in milliseconds (subscriber)
    #[arg(short = 'i', long = "time-filter", value_name = "MS")]
    pub time_filter_ms: Option<u64>,

    /// Ownership strength, -1 = SHARED
    #[arg(short = 's', long = "ownership-strength", allow_negative_numbers = true)]
    pub ownership_strength: Option<i64>,

    /// Topic name
    #[arg(short = 't', long = "topic")]
    pub topic: Option<String>,

    /// Color to publish, or to filter on when subscribing
    #[arg(short = 'c', long = "color")]
    pub color: Option<String>,

    /// Partition name
    #[arg(short = 'p', long = "partition")]
    pub partition: Option<String>,

    /// Durability kind
    #[arg(short = 'D', long = "durability", value_enum)]
    pub durability: Option<DurabilityArg>,

    /// Publish samples
    #[arg(short = 'P', long = "publish", conflicts_with = "subscribe")]
    pub publish: bool,

    /// Subscribe to samples
    #[arg(short = 'S', long = "subscribe")]
    pub subscribe: bool,

    /// Data representation: 1 = XCDR, 2 = XCDR2
    #[arg(
        short = 'x',
        long = "data-representation",
        value_parser = clap::value_parser!(u8).range(1..=2)
    )]
    pub data_representation: Option<u8>,

    /// Print every written sample (publisher)
    #[arg(short = 'w', long = "print-writer-samples")]
    pub print_writer_samples: bool,

    /// Shape size, 0 = grow by one every cycle (publisher)
    #[arg(short = 'z', long = "shapesize", allow_negative_numbers = true)]
    pub shapesize: Option<i64>,

    /// Log verbosity: e = errors, d = debug
    #[arg(short = 'v', long = "verbosity", value_enum)]
    pub verbosity: Option<VerbosityArg>,

    /// Milliseconds between publication cycles
    #[arg(long = "write-period", value_name = "MS", default_value_t = 33)]
    pub write_period_ms: u64,

    /// Milliseconds between subscription cycles
    #[arg(long = "read-period", value_name = "MS", default_value_t = 100)]
    pub read_period_ms: u64,

    /// Stop after this many cycles
    #[arg(long = "num-iterations", allow_negative_numbers = true)]
    pub num_iterations: Option<i64>,

    /// Instances per topic (publisher)
    #[arg(long = "num-instances", allow_negative_numbers = true)]
    pub num_instances: Option<i64>,

    /// Number of topics
    #[arg(long = "num-topics", allow_negative_numbers = true)]
    pub num_topics: Option<i64>,

    /// Action on every instance at shutdown: u = unregister, d = dispose (publisher)
    #[arg(long = "final-instance-state", value_enum)]
    pub final_instance_state: Option<FinalInstanceStateArg>,

    /// Presentation access scope
    #[arg(long = "access-scope", value_enum)]
    pub access_scope: Option<AccessScopeArg>,

    /// Enable coherent access
    #[arg(long = "coherent")]
    pub coherent: bool,

    /// Enable ordered access
    #[arg(long = "ordered")]
    pub ordered: bool,

    /// Samples per coherent set (publisher)
    #[arg(long = "coherent-sample-count", allow_negative_numbers = true)]
    pub coherent_sample_count: Option<i64>,

    /// Extra payload bytes appended to every sample (publisher)
    #[arg(long = "additional-payload-size", value_name = "BYTES")]
    pub additional_payload_size: Option<usize>,

    /// Use read instead of take (subscriber)
    #[arg(long = "take-read")]
    pub take_read: bool,

    /// Read every instance at once instead of one instance at a time (subscriber)
    #[arg(long = "bulk")]
    pub bulk: bool,

    /// Sample lifespan in milliseconds (publisher)
    #[arg(long = "lifespan", value_name = "MS")]
    pub lifespan_ms: Option<u64>,

    /// Content filter expression (subscriber), overrides -c
    #[arg(long = "cft", value_name = "EXPR")]
    pub content_filter: Option<String>,

    /// With -z 0, wrap the growing size back to 1 after this value (publisher)
    #[arg(long = "size-modulo", allow_negative_numbers = true)]
    pub size_modulo: Option<i64>,

    /// Reflection rule at the canvas edges
    #[arg(long = "bounce", value_enum, default_value_t = BounceMode::Margin)]
    pub bounce: BounceMode,

    /// Seed for the initial position and velocity
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Initial horizontal velocity
    #[arg(long = "xvel", allow_negative_numbers = true)]
    pub xvel: Option<i32>,

    /// Initial vertical velocity
    #[arg(long = "yvel", allow_negative_numbers = true)]
    pub yvel: Option<i32>,

    /// Canvas width
    #[arg(long = "width", default_value_t = 240)]
    pub width: i32,

    /// Canvas height
    #[arg(long = "height", default_value_t = 270)]
    pub height: i32,
}

impl ShapeArgs {
    /// Log level selected by `-v`.
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbosity {
            Some(VerbosityArg::Error) => log::LevelFilter::Error,
            Some(VerbosityArg::Debug) => log::LevelFilter::Debug,
            None => log::LevelFilter::Warn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DurabilityArg {
    #[value(name = "v")]
    Volatile,
    #[value(name = "l")]
    TransientLocal,
    #[value(name = "t")]
    Transient,
    #[value(name = "p")]
    Persistent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VerbosityArg {
    #[value(name = "e")]
    Error,
    #[value(name = "d")]
    Debug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FinalInstanceStateArg {
    #[value(name = "u")]
    Unregister,
    #[value(name = "d")]
    Dispose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AccessScopeArg {
    #[value(name = "i")]
    Instance,
    #[value(name = "t")]
    Topic,
    #[value(name = "g")]
    Group,
}
