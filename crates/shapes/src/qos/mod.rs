// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS model for Shapes entities.
//!
//! Policies are grouped per entity kind the way DDS does it:
//!
//! | Entity     | Policies                                                         |
//! |------------|------------------------------------------------------------------|
//! | Publisher  | partition, presentation                                          |
//! | Subscriber | partition, presentation                                          |
//! | DataWriter | reliability, durability, history, ownership(+strength), deadline,|
//! |            | lifespan, data representation, writer data lifecycle             |
//! | DataReader | reliability, durability, history, ownership kind, deadline,      |
//! |            | time-based filter, data representation                           |
//!
//! Builders take `mut self` and return `Self`:
//!
//! ```
//! use shapes::qos::{DurabilityKind, WriterQos};
//!
//! let qos = WriterQos::default()
//!     .reliable()
//!     .durability(DurabilityKind::TransientLocal)
//!     .keep_last(5);
//! assert_eq!(qos.history.depth(), Some(5));
//! ```

mod compat;
mod policy;

pub use compat::{check_compatibility, QosPolicyId};
pub use policy::{
    DataRepresentation, DurabilityKind, History, Ownership, OwnershipKind, Partition,
    Presentation, PresentationAccessScope, ReliabilityKind, WriterDataLifecycle,
};
pub(crate) use policy::wildcard_match;

use std::time::Duration;

/// Publisher-level QoS.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PublisherQos {
    pub partition: Partition,
    pub presentation: Presentation,
}

/// Subscriber-level QoS.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubscriberQos {
    pub partition: Partition,
    pub presentation: Presentation,
}

/// DataWriter QoS (offered side of RxO matching).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterQos {
    pub reliability: ReliabilityKind,
    pub durability: DurabilityKind,
    pub history: History,
    pub ownership: Ownership,
    /// `None` is an infinite deadline.
    pub deadline: Option<Duration>,
    /// `None` is an infinite lifespan.
    pub lifespan: Option<Duration>,
    pub representation: DataRepresentation,
    pub writer_data_lifecycle: WriterDataLifecycle,
}

impl Default for WriterQos {
    fn default() -> Self {
        Self {
            reliability: ReliabilityKind::Reliable,
            durability: DurabilityKind::Volatile,
            history: History::default(),
            ownership: Ownership::default(),
            deadline: None,
            lifespan: None,
            representation: DataRepresentation::default(),
            writer_data_lifecycle: WriterDataLifecycle::default(),
        }
    }
}

impl WriterQos {
    pub fn reliable(mut self) -> Self {
        self.reliability = ReliabilityKind::Reliable;
        self
    }

    pub fn best_effort(mut self) -> Self {
        self.reliability = ReliabilityKind::BestEffort;
        self
    }

    pub fn durability(mut self, kind: DurabilityKind) -> Self {
        self.durability = kind;
        self
    }

    pub fn keep_last(mut self, depth: u32) -> Self {
        self.history = History::KeepLast(depth);
        self
    }

    pub fn keep_all(mut self) -> Self {
        self.history = History::KeepAll;
        self
    }

    pub fn exclusive(mut self, strength: i32) -> Self {
        self.ownership = Ownership::exclusive(strength);
        self
    }

    pub fn deadline(mut self, period: Duration) -> Self {
        self.deadline = Some(period);
        self
    }

    pub fn lifespan(mut self, duration: Duration) -> Self {
        self.lifespan = Some(duration);
        self
    }

    pub fn representation(mut self, representation: DataRepresentation) -> Self {
        self.representation = representation;
        self
    }
}

/// DataReader QoS (requested side of RxO matching).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReaderQos {
    pub reliability: ReliabilityKind,
    pub durability: DurabilityKind,
    pub history: History,
    pub ownership: OwnershipKind,
    pub deadline: Option<Duration>,
    /// Minimum separation between accepted samples of one instance.
    pub time_based_filter: Option<Duration>,
    pub representation: DataRepresentation,
}

impl ReaderQos {
    pub fn reliable(mut self) -> Self {
        self.reliability = ReliabilityKind::Reliable;
        self
    }

    pub fn best_effort(mut self) -> Self {
        self.reliability = ReliabilityKind::BestEffort;
        self
    }

    pub fn durability(mut self, kind: DurabilityKind) -> Self {
        self.durability = kind;
        self
    }

    pub fn keep_last(mut self, depth: u32) -> Self {
        self.history = History::KeepLast(depth);
        self
    }

    pub fn keep_all(mut self) -> Self {
        self.history = History::KeepAll;
        self
    }

    pub fn exclusive(mut self) -> Self {
        self.ownership = OwnershipKind::Exclusive;
        self
    }

    pub fn deadline(mut self, period: Duration) -> Self {
        self.deadline = Some(period);
        self
    }

    pub fn time_based_filter(mut self, separation: Duration) -> Self {
        self.time_based_filter = Some(separation);
        self
    }

    pub fn representation(mut self, representation: DataRepresentation) -> Self {
        self.representation = representation;
        self
    }
}
