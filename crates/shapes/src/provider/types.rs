// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Handles, sample metadata and read masks exchanged with a provider.

use crate::shape::ShapeType;
use std::fmt;

/// Unlimited `max_samples` for read/take calls.
pub const LENGTH_UNLIMITED: usize = usize::MAX;

macro_rules! entity_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

entity_handle!(
    /// Opaque participant handle.
    ParticipantHandle
);
entity_handle!(
    /// Opaque topic description handle (plain or content-filtered topic).
    TopicHandle
);
entity_handle!(
    /// Opaque publisher handle.
    PublisherHandle
);
entity_handle!(
    /// Opaque subscriber handle.
    SubscriberHandle
);
entity_handle!(
    /// Opaque data writer handle.
    WriterHandle
);
entity_handle!(
    /// Opaque data reader handle.
    ReaderHandle
);

/// Instance handle (16-byte key hash).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct InstanceHandle(pub [u8; 16]);

impl InstanceHandle {
    /// The nil handle. Sorts before every other handle.
    pub const fn nil() -> Self {
        InstanceHandle([0; 16])
    }

    pub fn is_nil(&self) -> bool {
        self.0 == [0; 16]
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceHandle(")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

/// Lifecycle state of an instance as seen by a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Alive,
    NotAliveDisposed,
    NotAliveNoWriters,
}

impl InstanceState {
    pub fn mask(self) -> InstanceStateMask {
        match self {
            InstanceState::Alive => InstanceStateMask::ALIVE,
            InstanceState::NotAliveDisposed => InstanceStateMask::NOT_ALIVE_DISPOSED,
            InstanceState::NotAliveNoWriters => InstanceStateMask::NOT_ALIVE_NO_WRITERS,
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstanceState::Alive => "ALIVE",
            InstanceState::NotAliveDisposed => "NOT_ALIVE_DISPOSED",
            InstanceState::NotAliveNoWriters => "NOT_ALIVE_NO_WRITERS",
        };
        f.write_str(name)
    }
}

/// Whether a sample was already returned by a `read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleState {
    Read,
    NotRead,
}

impl SampleState {
    pub fn mask(self) -> SampleStateMask {
        match self {
            SampleState::Read => SampleStateMask::READ,
            SampleState::NotRead => SampleStateMask::NOT_READ,
        }
    }
}

/// Sample state mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleStateMask(u32);

impl SampleStateMask {
    pub const READ: SampleStateMask = SampleStateMask(1 << 0);
    pub const NOT_READ: SampleStateMask = SampleStateMask(1 << 1);
    pub const ANY: SampleStateMask = SampleStateMask(Self::READ.0 | Self::NOT_READ.0);

    pub const fn contains(&self, other: SampleStateMask) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for SampleStateMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        SampleStateMask(self.0 | rhs.0)
    }
}

/// Instance state mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceStateMask(u32);

impl InstanceStateMask {
    pub const ALIVE: InstanceStateMask = InstanceStateMask(1 << 0);
    pub const NOT_ALIVE_DISPOSED: InstanceStateMask = InstanceStateMask(1 << 1);
    pub const NOT_ALIVE_NO_WRITERS: InstanceStateMask = InstanceStateMask(1 << 2);
    pub const ANY: InstanceStateMask = InstanceStateMask(
        Self::ALIVE.0 | Self::NOT_ALIVE_DISPOSED.0 | Self::NOT_ALIVE_NO_WRITERS.0,
    );

    pub const fn contains(&self, other: InstanceStateMask) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for InstanceStateMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        InstanceStateMask(self.0 | rhs.0)
    }
}

/// Sample and instance state masks for a read/take call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadMasks {
    pub sample: SampleStateMask,
    pub instance: InstanceStateMask,
}

impl ReadMasks {
    /// Everything.
    pub const ANY: ReadMasks = ReadMasks {
        sample: SampleStateMask::ANY,
        instance: InstanceStateMask::ANY,
    };

    /// Only samples not returned by an earlier `read`.
    pub const NOT_READ: ReadMasks = ReadMasks {
        sample: SampleStateMask::NOT_READ,
        instance: InstanceStateMask::ANY,
    };

    pub fn accepts(&self, sample: SampleState, instance: InstanceState) -> bool {
        self.sample.contains(sample.mask()) && self.instance.contains(instance.mask())
    }
}

impl Default for ReadMasks {
    fn default() -> Self {
        ReadMasks::ANY
    }
}

/// Metadata accompanying each sample in a [`Loan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleInfo {
    /// `false` for lifecycle notifications (unregister, dispose) that carry no data.
    pub valid_data: bool,
    pub instance_handle: InstanceHandle,
    pub instance_state: InstanceState,
    pub sample_state: SampleState,
}

/// Samples lent by a reader. Must be handed back with `return_loan`.
#[derive(Debug)]
pub struct Loan {
    reader: ReaderHandle,
    samples: Vec<ShapeType>,
    infos: Vec<SampleInfo>,
}

impl Loan {
    pub fn new(reader: ReaderHandle, entries: Vec<(ShapeType, SampleInfo)>) -> Self {
        let (samples, infos): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
        Self {
            reader,
            samples,
            infos,
        }
    }

    pub fn reader(&self) -> ReaderHandle {
        self.reader
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&ShapeType, &SampleInfo)> {
        self.samples.iter().zip(self.infos.iter())
    }

    pub fn infos(&self) -> &[SampleInfo] {
        &self.infos
    }

    /// Handle of the last sample; the next-instance cursor advances to it.
    pub fn last_instance_handle(&self) -> Option<InstanceHandle> {
        self.infos.last().map(|info| info.instance_handle)
    }
}

/// Filter attached to a content-filtered topic.
///
/// Color equality is expressed abstractly so each provider can render it in
/// its own expression syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSpec {
    /// Accept samples whose `color` equals the value.
    ColorEquals(String),
    /// Provider-syntax expression with `%n` parameters.
    Expression {
        expression: String,
        parameters: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nil_handle_sorts_first() {
        let mut other = [0u8; 16];
        other[15] = 1;
        assert!(InstanceHandle::nil() < InstanceHandle(other));
        assert!(InstanceHandle::nil().is_nil());
        assert!(!InstanceHandle(other).is_nil());
    }

    #[test]
    fn test_read_masks() {
        assert!(ReadMasks::ANY.accepts(SampleState::Read, InstanceState::NotAliveDisposed));
        assert!(!ReadMasks::NOT_READ.accepts(SampleState::Read, InstanceState::Alive));
        assert!(ReadMasks::NOT_READ.accepts(SampleState::NotRead, InstanceState::Alive));
        let alive_only = ReadMasks {
            sample: SampleStateMask::ANY,
            instance: InstanceStateMask::ALIVE,
        };
        assert!(!alive_only.accepts(SampleState::NotRead, InstanceState::NotAliveNoWriters));
    }

    #[test]
    fn test_loan_last_handle() {
        let info = |byte: u8| SampleInfo {
            valid_data: true,
            instance_handle: InstanceHandle([byte; 16]),
            instance_state: InstanceState::Alive,
            sample_state: SampleState::NotRead,
        };
        let loan = Loan::new(
            ReaderHandle(1),
            vec![
                (ShapeType::key_only("A"), info(1)),
                (ShapeType::key_only("B"), info(2)),
            ],
        );
        assert_eq!(loan.len(), 2);
        assert_eq!(loan.last_instance_handle(), Some(InstanceHandle([2; 16])));
    }
}
