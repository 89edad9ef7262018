// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-reader instance cache with read/take semantics.
//!
//! ```text
//! instances (ordered by handle)
//! +-- handle -> InstanceEntry
//!     +-- state:   ALIVE | NOT_ALIVE_DISPOSED | NOT_ALIVE_NO_WRITERS
//!     +-- samples: [S0][S1][lifecycle]   (bounded by HISTORY depth)
//!     +-- writers: writer id -> ownership strength
//! ```
//!
//! `read` marks returned samples READ and keeps them; `take` removes them.
//! Unregister and dispose transitions append a sample without valid data.

use crate::provider::{InstanceHandle, InstanceState, ReadMasks, SampleInfo, SampleState};
use crate::qos::{History, OwnershipKind, ReaderQos};
use crate::shape::ShapeType;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct CachedSample {
    /// `None` for lifecycle notifications.
    data: Option<ShapeType>,
    sample_state: SampleState,
    expires: Option<Instant>,
}

#[derive(Debug)]
struct InstanceEntry {
    state: InstanceState,
    samples: VecDeque<CachedSample>,
    writers: BTreeMap<u64, i32>,
    last_accepted: Option<Instant>,
    last_update: Instant,
    deadline_reported: bool,
}

impl InstanceEntry {
    fn new(now: Instant) -> Self {
        Self {
            state: InstanceState::Alive,
            samples: VecDeque::new(),
            writers: BTreeMap::new(),
            last_accepted: None,
            last_update: now,
            deadline_reported: false,
        }
    }

    /// Strongest registered writer; ties go to the lowest writer id.
    fn owner(&self) -> Option<u64> {
        self.writers
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(id, _)| *id)
    }

    fn push(&mut self, sample: CachedSample, history: History) {
        self.samples.push_back(sample);
        if let Some(depth) = history.depth() {
            while self.samples.len() > depth {
                self.samples.pop_front();
            }
        }
    }

    fn push_lifecycle(&mut self, state: InstanceState, history: History, now: Instant) {
        self.state = state;
        self.last_update = now;
        self.push(
            CachedSample {
                data: None,
                sample_state: SampleState::NotRead,
                expires: None,
            },
            history,
        );
    }

    fn has_matching(&self, masks: ReadMasks) -> bool {
        self.samples
            .iter()
            .any(|s| masks.accepts(s.sample_state, self.state))
    }
}

#[derive(Debug)]
pub(super) struct ReaderCache {
    history: History,
    ownership: OwnershipKind,
    time_based_filter: Option<Duration>,
    instances: BTreeMap<InstanceHandle, InstanceEntry>,
    keys: HashMap<InstanceHandle, String>,
}

impl ReaderCache {
    pub(super) fn new(qos: &ReaderQos) -> Self {
        Self {
            history: qos.history,
            ownership: qos.ownership,
            time_based_filter: qos.time_based_filter,
            instances: BTreeMap::new(),
            keys: HashMap::new(),
        }
    }

    /// Store a sample from `writer`. Returns `false` if ownership or the
    /// time-based filter rejected it.
    pub(super) fn write(
        &mut self,
        writer: u64,
        strength: i32,
        handle: InstanceHandle,
        sample: &ShapeType,
        lifespan: Option<Duration>,
        now: Instant,
    ) -> bool {
        self.keys
            .entry(handle)
            .or_insert_with(|| sample.color.clone());
        let entry = self
            .instances
            .entry(handle)
            .or_insert_with(|| InstanceEntry::new(now));
        entry.writers.insert(writer, strength);

        if self.ownership == OwnershipKind::Exclusive && entry.owner() != Some(writer) {
            return false;
        }
        if let (Some(separation), Some(last)) = (self.time_based_filter, entry.last_accepted) {
            if now.saturating_duration_since(last) < separation {
                return false;
            }
        }

        entry.state = InstanceState::Alive;
        entry.last_accepted = Some(now);
        entry.last_update = now;
        entry.deadline_reported = false;
        entry.push(
            CachedSample {
                data: Some(sample.clone()),
                sample_state: SampleState::NotRead,
                expires: lifespan.map(|d| now + d),
            },
            self.history,
        );
        true
    }

    /// Remove `writer` from the instance. Returns `true` if the instance changed state.
    pub(super) fn unregister(
        &mut self,
        writer: u64,
        handle: InstanceHandle,
        autodispose: bool,
        now: Instant,
    ) -> bool {
        let Some(entry) = self.instances.get_mut(&handle) else {
            return false;
        };
        if entry.writers.remove(&writer).is_none() || entry.state != InstanceState::Alive {
            return false;
        }
        if autodispose {
            entry.push_lifecycle(InstanceState::NotAliveDisposed, self.history, now);
            true
        } else if entry.writers.is_empty() {
            entry.push_lifecycle(InstanceState::NotAliveNoWriters, self.history, now);
            true
        } else {
            false
        }
    }

    /// Dispose the instance on behalf of `writer`.
    pub(super) fn dispose(&mut self, writer: u64, handle: InstanceHandle, now: Instant) -> bool {
        let Some(entry) = self.instances.get_mut(&handle) else {
            return false;
        };
        if self.ownership == OwnershipKind::Exclusive && entry.owner() != Some(writer) {
            return false;
        }
        if entry.state == InstanceState::NotAliveDisposed {
            return false;
        }
        entry.push_lifecycle(InstanceState::NotAliveDisposed, self.history, now);
        true
    }

    /// Unregister every instance `writer` had registered.
    pub(super) fn remove_writer(&mut self, writer: u64, autodispose: bool, now: Instant) {
        let handles: Vec<InstanceHandle> = self
            .instances
            .iter()
            .filter(|(_, entry)| entry.writers.contains_key(&writer))
            .map(|(handle, _)| *handle)
            .collect();
        for handle in handles {
            self.unregister(writer, handle, autodispose, now);
        }
    }

    /// Collect up to `max` samples matching `masks`.
    ///
    /// `after == None` visits every instance; `Some(prev)` only the first
    /// instance with matching samples whose handle sorts after `prev`.
    pub(super) fn collect(
        &mut self,
        after: Option<InstanceHandle>,
        max: usize,
        masks: ReadMasks,
        take: bool,
        now: Instant,
    ) -> Vec<(ShapeType, SampleInfo)> {
        self.purge_expired(now);

        let handles: Vec<InstanceHandle> = match after {
            None => self.instances.keys().copied().collect(),
            Some(prev) => self
                .instances
                .range((Bound::Excluded(prev), Bound::Unbounded))
                .find(|(_, entry)| entry.has_matching(masks))
                .map(|(handle, _)| *handle)
                .into_iter()
                .collect(),
        };

        let mut out = Vec::new();
        for handle in handles {
            let Some(entry) = self.instances.get_mut(&handle) else {
                continue;
            };
            let state = entry.state;
            if !masks.instance.contains(state.mask()) {
                continue;
            }
            let mut kept = VecDeque::with_capacity(entry.samples.len());
            for mut sample in std::mem::take(&mut entry.samples) {
                if out.len() >= max || !masks.accepts(sample.sample_state, state) {
                    kept.push_back(sample);
                    continue;
                }
                out.push((
                    sample.data.clone().unwrap_or_default(),
                    SampleInfo {
                        valid_data: sample.data.is_some(),
                        instance_handle: handle,
                        instance_state: state,
                        sample_state: sample.sample_state,
                    },
                ));
                if !take {
                    sample.sample_state = SampleState::Read;
                    kept.push_back(sample);
                }
            }
            entry.samples = kept;
        }

        self.instances.retain(|_, entry| {
            entry.state == InstanceState::Alive
                || !entry.samples.is_empty()
                || !entry.writers.is_empty()
        });
        out
    }

    pub(super) fn key_of(&self, handle: InstanceHandle) -> Option<&str> {
        self.keys.get(&handle).map(String::as_str)
    }

    /// Alive instances not updated within `period`, each reported once per silence.
    pub(super) fn missed_deadlines(
        &mut self,
        period: Duration,
        now: Instant,
    ) -> Vec<InstanceHandle> {
        self.instances
            .iter_mut()
            .filter(|(_, entry)| {
                entry.state == InstanceState::Alive
                    && !entry.deadline_reported
                    && now.saturating_duration_since(entry.last_update) > period
            })
            .map(|(handle, entry)| {
                entry.deadline_reported = true;
                *handle
            })
            .collect()
    }

    #[cfg(test)]
    fn instance_count(&self) -> usize {
        self.instances.len()
    }

    fn purge_expired(&mut self, now: Instant) {
        for entry in self.instances.values_mut() {
            entry
                .samples
                .retain(|s| s.expires.map_or(true, |deadline| deadline > now));
        }
    }
}
