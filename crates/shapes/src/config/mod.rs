// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Command-line configuration.
//!
//! Parsing happens in two stages so the binary can install its logger between
//! them:
//!
//! 1. [`ShapeArgs::try_parse_from`](clap::Parser::try_parse_from) checks syntax;
//! 2. [`ShapeOptions::from_args`] checks ranges and role consistency and
//!    normalizes everything into an immutable intent.
//!
//! ```
//! use shapes::config::{Role, ShapeOptions};
//!
//! let options = ShapeOptions::parse_from(["shape_main", "-P", "-t", "Square"]).unwrap();
//! assert_eq!(options.role, Role::Publish);
//! assert_eq!(options.color.as_deref(), Some("BLUE"));
//! ```

mod args;
mod mapping;

pub use args::{AccessScopeArg, DurabilityArg, FinalInstanceStateArg, ShapeArgs, VerbosityArg};

use crate::motion::BounceMode;
use crate::qos::{
    DataRepresentation, DurabilityKind, History, Ownership, PresentationAccessScope,
    ReliabilityKind,
};
use clap::Parser;
use std::ffi::OsString;
use std::fmt;
use std::time::Duration;

/// Publisher color when `-c` is missing.
pub const DEFAULT_COLOR: &str = "BLUE";

/// Shape size when `-z` is missing.
pub const DEFAULT_SHAPESIZE: i32 = 20;
/// Upper bound for `--additional-payload-size`, in bytes.
pub const MAX_ADDITIONAL_PAYLOAD_SIZE: usize = 64 * 1024;

/// Configuration failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `--help` or `--version`; the payload is the text to print.
    HelpRequested(String),
    /// The command line did not parse.
    Parse(String),
    /// The command line parsed but describes an invalid configuration.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::HelpRequested(text) => write!(f, "{}", text),
            ConfigError::Parse(msg) => write!(f, "{}", msg),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Publish,
    Subscribe,
}

/// Action applied to every published instance on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinalInstanceState {
    #[default]
    None,
    Unregister,
    Dispose,
}

/// Validated, normalized configuration of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeOptions {
    pub domain_id: u32,
    pub role: Role,
    pub topic_name: String,
    /// Published color, or the subscriber's color filter.
    pub color: Option<String>,
    /// Explicit filter expression; wins over `color` on a subscriber.
    pub content_filter: Option<String>,
    pub partition: Option<String>,

    pub reliability: ReliabilityKind,
    pub durability: DurabilityKind,
    pub ownership: Ownership,
    /// `None` keeps the provider default.
    pub history: Option<History>,
    pub deadline: Option<Duration>,
    pub time_based_filter: Option<Duration>,
    pub lifespan: Option<Duration>,
    pub representation: DataRepresentation,

    pub num_topics: u32,
    pub num_instances: u32,
    pub num_iterations: Option<u64>,
    pub write_period: Duration,
    pub read_period: Duration,

    pub coherent: bool,
    pub ordered: bool,
    pub access_scope: PresentationAccessScope,
    pub coherent_sample_count: Option<u32>,
    pub final_instance_state: FinalInstanceState,

    /// 0 grows the shape by one every cycle.
    pub shapesize: i32,
    pub size_modulo: Option<u32>,
    pub additional_payload_size: usize,
    pub width: i32,
    pub height: i32,
    pub bounce: BounceMode,
    pub seed: Option<u64>,
    pub xvel: Option<i32>,
    pub yvel: Option<i32>,
    pub print_writer_samples: bool,

    pub use_read: bool,
    pub use_next_instance: bool,

    /// Accepted-but-ignored or defaulted settings, reported once at startup.
    pub warnings: Vec<String>,
}

impl ShapeOptions {
    /// Parse and validate a full command line (program name first).
    pub fn parse_from<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::from_args(parse_args(args)?)
    }

    /// Validate parsed arguments.
    pub fn from_args(args: ShapeArgs) -> Result<Self, ConfigError> {
        let mut warnings = Vec::new();

        let role = match (args.publish, args.subscribe) {
            (true, false) => Role::Publish,
            (false, true) => Role::Subscribe,
            (true, true) => return Err(invalid("-P and -S are mutually exclusive")),
            (false, false) => {
                return Err(invalid("one of -P (publish) or -S (subscribe) is required"))
            }
        };
        let topic_name = match args.topic {
            Some(ref topic) if !topic.is_empty() => topic.clone(),
            _ => return Err(invalid("a topic name (-t) is required")),
        };

        let mut color = args.color.clone();
        if role == Role::Publish && color.is_none() {
            warnings.push(format!(
                "color was not specified, defaulting to \"{}\"",
                DEFAULT_COLOR
            ));
            color = Some(DEFAULT_COLOR.to_string());
        }

        let history = match args.history_depth {
            None => None,
            Some(0) => Some(History::KeepAll),
            Some(depth) if depth > 0 => Some(History::KeepLast(to_u32("-k", depth)?)),
            Some(depth) => return Err(invalid(format!("-k must be >= 0, got {}", depth))),
        };

        let ownership = match args.ownership_strength {
            None | Some(-1) => Ownership::shared(),
            Some(strength) if strength >= 0 => {
                let strength = i32::try_from(strength)
                    .map_err(|_| invalid(format!("-s {} is out of range", strength)))?;
                Ownership::exclusive(strength)
            }
            Some(strength) => return Err(invalid(format!("-s must be >= -1, got {}", strength))),
        };

        let num_topics = count_at_least("--num-topics", args.num_topics, 1, 1)?;
        let num_instances = count_at_least("--num-instances", args.num_instances, 1, 1)?;
        let num_iterations = match args.num_iterations {
            None => None,
            Some(n) if n >= 1 => Some(n as u64),
            Some(n) => return Err(invalid(format!("--num-iterations must be >= 1, got {}", n))),
        };
        let coherent_sample_count = match args.coherent_sample_count {
            None => None,
            Some(n) if n >= 2 => Some(to_u32("--coherent-sample-count", n)?),
            Some(n) => {
                return Err(invalid(format!(
                    "--coherent-sample-count must be >= 2, got {}",
                    n
                )))
            }
        };
        let size_modulo = match args.size_modulo {
            None => None,
            Some(n) if n >= 1 => Some(to_u32("--size-modulo", n)?),
            Some(n) => return Err(invalid(format!("--size-modulo must be >= 1, got {}", n))),
        };
        let shapesize = match args.shapesize {
            None => DEFAULT_SHAPESIZE,
            Some(size) if size >= 0 => i32::try_from(size)
                .map_err(|_| invalid(format!("-z {} is out of range", size)))?,
            Some(size) => return Err(invalid(format!("-z must be >= 0, got {}", size))),
        };
        if args.width < 1 || args.height < 1 {
            return Err(invalid(format!(
                "--width and --height must be >= 1, got {}x{}",
                args.width, args.height
            )));
        }
        let velocities = [
            ("--xvel", args.xvel, args.width),
            ("--yvel", args.yvel, args.height),
        ];
        for (name, velocity, bound) in velocities {
            if let Some(v) = velocity {
                if v.unsigned_abs() > bound.unsigned_abs() {
                    return Err(invalid(format!("{} must be within ±{}, got {}", name, bound, v)));
                }
            }
        }
        let additional_payload_size = match args.additional_payload_size {
            None => 0,
            Some(n) if n <= MAX_ADDITIONAL_PAYLOAD_SIZE => n,
            Some(n) => {
                return Err(invalid(format!(
                    "--additional-payload-size must be <= {}, got {}",
                    MAX_ADDITIONAL_PAYLOAD_SIZE, n
                )))
            }
        };

        let final_instance_state = match args.final_instance_state {
            None => FinalInstanceState::None,
            Some(FinalInstanceStateArg::Unregister) => FinalInstanceState::Unregister,
            Some(FinalInstanceStateArg::Dispose) => FinalInstanceState::Dispose,
        };

        let grouped = args.coherent || args.ordered;
        if !grouped && args.coherent_sample_count.is_some() {
            warnings.push(
                "--coherent-sample-count has no effect without --coherent or --ordered".into(),
            );
        }
        if !grouped && args.access_scope.is_some() {
            warnings.push("--access-scope has no effect without --coherent or --ordered".into());
        }

        let mut content_filter = args.content_filter.clone();
        match role {
            Role::Publish => {
                let ignored = [
                    ("-i", args.time_filter_ms.is_some()),
                    ("--take-read", args.take_read),
                    ("--bulk", args.bulk),
                    ("--cft", args.content_filter.is_some()),
                ];
                warn_ignored(&mut warnings, "publisher", &ignored);
                content_filter = None;
            }
            Role::Subscribe => {
                let ignored = [
                    ("-z", args.shapesize.is_some()),
                    ("--lifespan", args.lifespan_ms.is_some()),
                    ("--num-instances", args.num_instances.is_some()),
                    ("--final-instance-state", args.final_instance_state.is_some()),
                    ("--additional-payload-size", args.additional_payload_size.is_some()),
                    ("--size-modulo", args.size_modulo.is_some()),
                    ("-w", args.print_writer_samples),
                ];
                warn_ignored(&mut warnings, "subscriber", &ignored);
                if content_filter.is_some() && color.is_some() {
                    warnings.push("--cft overrides the -c color filter".into());
                }
            }
        }

        let subscriber = role == Role::Subscribe;
        let publisher = role == Role::Publish;
        Ok(ShapeOptions {
            domain_id: args.domain_id,
            role,
            topic_name,
            color,
            content_filter,
            partition: args.partition.clone(),
            reliability: if args.best_effort {
                ReliabilityKind::BestEffort
            } else {
                ReliabilityKind::Reliable
            },
            durability: match args.durability {
                None | Some(DurabilityArg::Volatile) => DurabilityKind::Volatile,
                Some(DurabilityArg::TransientLocal) => DurabilityKind::TransientLocal,
                Some(DurabilityArg::Transient) => DurabilityKind::Transient,
                Some(DurabilityArg::Persistent) => DurabilityKind::Persistent,
            },
            ownership,
            history,
            deadline: args.deadline_ms.map(Duration::from_millis),
            time_based_filter: args
                .time_filter_ms
                .filter(|_| subscriber)
                .map(Duration::from_millis),
            lifespan: args.lifespan_ms.filter(|_| publisher).map(Duration::from_millis),
            representation: match args.data_representation {
                Some(2) => DataRepresentation::Xcdr2,
                _ => DataRepresentation::Xcdr,
            },
            num_topics,
            num_instances: if publisher { num_instances } else { 1 },
            num_iterations,
            write_period: Duration::from_millis(args.write_period_ms),
            read_period: Duration::from_millis(args.read_period_ms),
            coherent: args.coherent,
            ordered: args.ordered,
            access_scope: match args.access_scope {
                None | Some(AccessScopeArg::Instance) => PresentationAccessScope::Instance,
                Some(AccessScopeArg::Topic) => PresentationAccessScope::Topic,
                Some(AccessScopeArg::Group) => PresentationAccessScope::Group,
            },
            coherent_sample_count,
            final_instance_state: if publisher {
                final_instance_state
            } else {
                FinalInstanceState::None
            },
            shapesize,
            size_modulo,
            additional_payload_size,
            width: args.width,
            height: args.height,
            bounce: args.bounce,
            seed: args.seed,
            xvel: args.xvel,
            yvel: args.yvel,
            print_writer_samples: args.print_writer_samples && publisher,
            use_read: args.take_read,
            use_next_instance: !args.bulk,
            warnings,
        })
    }

    /// Whether coherent sets or ordered access are requested.
    pub fn is_grouped(&self) -> bool {
        self.coherent || self.ordered
    }

    /// Samples per coherent set; 1 when grouping is on without an explicit count.
    pub fn samples_per_coherent_set(&self) -> u32 {
        self.coherent_sample_count.unwrap_or(1)
    }

    /// Filter applied by the subscriber, if any.
    pub fn subscriber_filter(&self) -> Option<crate::provider::FilterSpec> {
        if self.role != Role::Subscribe {
            return None;
        }
        match (&self.content_filter, &self.color) {
            (Some(expression), _) => Some(crate::provider::FilterSpec::Expression {
                expression: expression.clone(),
                parameters: Vec::new(),
            }),
            (None, Some(color)) => Some(crate::provider::FilterSpec::ColorEquals(color.clone())),
            (None, None) => None,
        }
    }
}

/// Syntax-only parse. `--help`/`--version` come back as [`ConfigError::HelpRequested`].
pub fn parse_args<I, T>(args: I) -> Result<ShapeArgs, ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    ShapeArgs::try_parse_from(args).map_err(|e| match e.kind() {
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
            ConfigError::HelpRequested(e.to_string())
        }
        _ => ConfigError::Parse(e.to_string()),
    })
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

fn to_u32(option: &str, value: i64) -> Result<u32, ConfigError> {
    u32::try_from(value).map_err(|_| invalid(format!("{} {} is out of range", option, value)))
}

fn count_at_least(
    option: &str,
    value: Option<i64>,
    min: i64,
    default: u32,
) -> Result<u32, ConfigError> {
    match value {
        None => Ok(default),
        Some(n) if n >= min => to_u32(option, n),
        Some(n) => Err(invalid(format!("{} must be >= {}, got {}", option, min, n))),
    }
}

fn warn_ignored(warnings: &mut Vec<String>, role: &str, options: &[(&str, bool)]) {
    for (option, set) in options {
        if *set {
            warnings.push(format!("{} is ignored by a {}", option, role));
        }
    }
}
