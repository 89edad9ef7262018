// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared entity tables and delivery logic of the loopback provider.
//!
//! ```text
//! BusState
//! +-- participants: id -> domain, listener, registered types
//! +-- topics:       id -> name, matched topic name, type, optional filter
//! +-- publishers:   id -> partition/presentation, open coherent set
//! +-- subscribers:  id -> partition/presentation, access depth
//! +-- writers:      id -> QoS, matched readers, registered + retained instances
//! +-- readers:      id -> QoS, matched writers, instance cache
//! ```
//!
//! A writer and a reader match when they live in the same domain, use the same
//! topic name and type, their partitions intersect and their QoS is compatible.
//! Listener callbacks are queued as [`Event`]s and run once the bus lock is released.

use super::cache::ReaderCache;
use super::filter::ContentFilter;
use super::key_hash;
use crate::error::{ProviderError, ProviderResult};
use crate::provider::listener::{
    DeadlineMissedStatus, InconsistentTopicStatus, IncompatibleQosStatus,
    LivelinessChangedStatus, PublicationMatchedStatus, SubscriptionMatchedStatus,
};
use crate::provider::{
    EntityListener, FilterSpec, InstanceHandle, Loan, ReadMasks, ReaderHandle, TopicInfo,
};
use crate::qos::{
    check_compatibility, History, PublisherQos, ReaderQos, SubscriberQos, WriterQos,
};
use crate::shape::ShapeType;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

/// Deferred listener invocation.
pub(super) type Event = Box<dyn FnOnce() + Send>;

struct ParticipantEntry {
    domain_id: u32,
    listener: Option<Arc<dyn EntityListener>>,
    types: HashSet<String>,
}

struct TopicEntry {
    participant: u64,
    name: String,
    /// Name used for matching; the related topic's name for filtered topics.
    topic_name: String,
    type_name: String,
    filter: Option<ContentFilter>,
}

struct PublisherEntry {
    participant: u64,
    qos: PublisherQos,
    coherent: Option<Vec<Change>>,
}

struct SubscriberEntry {
    participant: u64,
    qos: SubscriberQos,
    access_depth: u32,
}

struct WriterEntry {
    participant: u64,
    publisher: u64,
    topic: u64,
    qos: WriterQos,
    matched: BTreeSet<u64>,
    matched_total: u32,
    incompatible_total: u32,
    deadline_total: u32,
    registered: BTreeMap<InstanceHandle, String>,
    retained: BTreeMap<InstanceHandle, VecDeque<ShapeType>>,
    last_write: HashMap<InstanceHandle, Instant>,
}

struct ReaderEntry {
    participant: u64,
    subscriber: u64,
    topic: u64,
    qos: ReaderQos,
    matched: BTreeSet<u64>,
    matched_total: u32,
    incompatible_total: u32,
    deadline_total: u32,
    cache: ReaderCache,
    loans: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ChangeKind {
    Write,
    Unregister,
    Dispose,
}

struct Change {
    writer: u64,
    kind: ChangeKind,
    sample: ShapeType,
    handle: InstanceHandle,
}

fn unknown(what: &str, id: u64) -> ProviderError {
    ProviderError::BadParameter(format!("unknown {} {}", what, id))
}

#[derive(Default)]
pub(super) struct BusState {
    next_id: u64,
    participants: HashMap<u64, ParticipantEntry>,
    topics: HashMap<u64, TopicEntry>,
    publishers: HashMap<u64, PublisherEntry>,
    subscribers: HashMap<u64, SubscriberEntry>,
    writers: BTreeMap<u64, WriterEntry>,
    readers: BTreeMap<u64, ReaderEntry>,
}

impl BusState {
    fn alloc(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn domain_of(&self, participant: u64) -> Option<u32> {
        self.participants.get(&participant).map(|p| p.domain_id)
    }

    /// Queue a callback on `participant`'s listener about `topic`.
    fn notify<F>(&self, events: &mut Vec<Event>, participant: u64, topic: u64, callback: F)
    where
        F: FnOnce(&dyn EntityListener, TopicInfo<'_>) + Send + 'static,
    {
        let Some(listener) = self
            .participants
            .get(&participant)
            .and_then(|p| p.listener.clone())
        else {
            return;
        };
        let Some(topic) = self.topics.get(&topic) else {
            return;
        };
        let name = topic.topic_name.clone();
        let type_name = topic.type_name.clone();
        events.push(Box::new(move || {
            callback(
                listener.as_ref(),
                TopicInfo {
                    topic_name: &name,
                    type_name: &type_name,
                },
            )
        }));
    }

    // ========================================================================
    // Entity creation
    // ========================================================================

    pub(super) fn create_participant(
        &mut self,
        domain_id: u32,
        listener: Option<Arc<dyn EntityListener>>,
    ) -> u64 {
        let id = self.alloc();
        self.participants.insert(
            id,
            ParticipantEntry {
                domain_id,
                listener,
                types: HashSet::new(),
            },
        );
        log::debug!("[loopback] participant {} on domain {}", id, domain_id);
        id
    }

    pub(super) fn register_type(
        &mut self,
        participant: u64,
        type_name: &str,
    ) -> ProviderResult<()> {
        let entry = self
            .participants
            .get_mut(&participant)
            .ok_or_else(|| unknown("participant", participant))?;
        entry.types.insert(type_name.to_string());
        Ok(())
    }

    pub(super) fn create_topic(
        &mut self,
        participant: u64,
        name: &str,
        type_name: &str,
        events: &mut Vec<Event>,
    ) -> ProviderResult<u64> {
        let domain = {
            let entry = self
                .participants
                .get(&participant)
                .ok_or_else(|| unknown("participant", participant))?;
            if !entry.types.contains(type_name) {
                return Err(ProviderError::PreconditionNotMet(format!(
                    "type '{}' is not registered",
                    type_name
                )));
            }
            entry.domain_id
        };
        self.ensure_unique_name(participant, name)?;

        let conflicting: Vec<(u64, u64)> = self
            .topics
            .iter()
            .filter(|(_, t)| {
                t.topic_name == name
                    && t.type_name != type_name
                    && self.domain_of(t.participant) == Some(domain)
            })
            .map(|(id, t)| (*id, t.participant))
            .collect();

        let id = self.alloc();
        self.topics.insert(
            id,
            TopicEntry {
                participant,
                name: name.to_string(),
                topic_name: name.to_string(),
                type_name: type_name.to_string(),
                filter: None,
            },
        );

        for (other, other_participant) in conflicting {
            log::warn!("[loopback] inconsistent topic '{}'", name);
            let status = InconsistentTopicStatus {
                total_count: 1,
                total_count_change: 1,
            };
            let theirs = status.clone();
            self.notify(events, participant, id, move |l, t| l.on_inconsistent_topic(t, &status));
            self.notify(events, other_participant, other, move |l, t| {
                l.on_inconsistent_topic(t, &theirs)
            });
        }
        Ok(id)
    }

    pub(super) fn create_content_filtered_topic(
        &mut self,
        participant: u64,
        name: &str,
        related: u64,
        filter: &FilterSpec,
    ) -> ProviderResult<u64> {
        let base = self
            .topics
            .get(&related)
            .ok_or_else(|| unknown("topic", related))?;
        if base.participant != participant || base.filter.is_some() {
            return Err(ProviderError::BadParameter(format!(
                "'{}' cannot be filtered by this participant",
                base.name
            )));
        }
        let (topic_name, type_name) = (base.topic_name.clone(), base.type_name.clone());
        self.ensure_unique_name(participant, name)?;

        let (expression, parameters) = match filter {
            FilterSpec::ColorEquals(color) => ("color = %0", vec![color.clone()]),
            FilterSpec::Expression {
                expression,
                parameters,
            } => (expression.as_str(), parameters.clone()),
        };
        let filter = ContentFilter::new(expression, parameters)
            .map_err(|e| ProviderError::BadParameter(format!("filter '{}': {}", expression, e)))?;

        let id = self.alloc();
        self.topics.insert(
            id,
            TopicEntry {
                participant,
                name: name.to_string(),
                topic_name,
                type_name,
                filter: Some(filter),
            },
        );
        Ok(id)
    }

    fn ensure_unique_name(&self, participant: u64, name: &str) -> ProviderResult<()> {
        if self
            .topics
            .values()
            .any(|t| t.participant == participant && t.name == name)
        {
            return Err(ProviderError::PreconditionNotMet(format!(
                "topic '{}' already exists",
                name
            )));
        }
        Ok(())
    }

    pub(super) fn create_publisher(
        &mut self,
        participant: u64,
        qos: &PublisherQos,
    ) -> ProviderResult<u64> {
        if !self.participants.contains_key(&participant) {
            return Err(unknown("participant", participant));
        }
        let id = self.alloc();
        self.publishers.insert(
            id,
            PublisherEntry {
                participant,
                qos: qos.clone(),
                coherent: None,
            },
        );
        Ok(id)
    }

    pub(super) fn create_subscriber(
        &mut self,
        participant: u64,
        qos: &SubscriberQos,
    ) -> ProviderResult<u64> {
        if !self.participants.contains_key(&participant) {
            return Err(unknown("participant", participant));
        }
        let id = self.alloc();
        self.subscribers.insert(
            id,
            SubscriberEntry {
                participant,
                qos: qos.clone(),
                access_depth: 0,
            },
        );
        Ok(id)
    }

    pub(super) fn create_writer(
        &mut self,
        publisher: u64,
        topic: u64,
        qos: &WriterQos,
        events: &mut Vec<Event>,
    ) -> ProviderResult<u64> {
        let participant = self
            .publishers
            .get(&publisher)
            .ok_or_else(|| unknown("publisher", publisher))?
            .participant;
        let entry = self.topics.get(&topic).ok_or_else(|| unknown("topic", topic))?;
        if entry.filter.is_some() {
            return Err(ProviderError::IllegalOperation(
                "writers cannot use a content-filtered topic".into(),
            ));
        }
        if qos.history == History::KeepLast(0) {
            return Err(ProviderError::BadParameter("history depth must be > 0".into()));
        }

        let id = self.alloc();
        self.writers.insert(
            id,
            WriterEntry {
                participant,
                publisher,
                topic,
                qos: qos.clone(),
                matched: BTreeSet::new(),
                matched_total: 0,
                incompatible_total: 0,
                deadline_total: 0,
                registered: BTreeMap::new(),
                retained: BTreeMap::new(),
                last_write: HashMap::new(),
            },
        );
        let readers: Vec<u64> = self.readers.keys().copied().collect();
        for reader in readers {
            self.try_match(id, reader, events);
        }
        Ok(id)
    }

    pub(super) fn create_reader(
        &mut self,
        subscriber: u64,
        topic: u64,
        qos: &ReaderQos,
        events: &mut Vec<Event>,
    ) -> ProviderResult<u64> {
        let participant = self
            .subscribers
            .get(&subscriber)
            .ok_or_else(|| unknown("subscriber", subscriber))?
            .participant;
        if !self.topics.contains_key(&topic) {
            return Err(unknown("topic", topic));
        }
        if qos.history == History::KeepLast(0) {
            return Err(ProviderError::BadParameter("history depth must be > 0".into()));
        }

        let id = self.alloc();
        self.readers.insert(
            id,
            ReaderEntry {
                participant,
                subscriber,
                topic,
                qos: qos.clone(),
                matched: BTreeSet::new(),
                matched_total: 0,
                incompatible_total: 0,
                deadline_total: 0,
                cache: ReaderCache::new(qos),
                loans: 0,
            },
        );
        let writers: Vec<u64> = self.writers.keys().copied().collect();
        for writer in writers {
            self.try_match(writer, id, events);
        }
        Ok(id)
    }

    // ========================================================================
    // Matching
    // ========================================================================

    fn try_match(&mut self, writer_id: u64, reader_id: u64, events: &mut Vec<Event>) {
        let (Some(writer), Some(reader)) =
            (self.writers.get(&writer_id), self.readers.get(&reader_id))
        else {
            return;
        };
        let (Some(wt), Some(rt)) = (self.topics.get(&writer.topic), self.topics.get(&reader.topic))
        else {
            return;
        };
        if wt.topic_name != rt.topic_name || wt.type_name != rt.type_name {
            return;
        }
        if self.domain_of(writer.participant) != self.domain_of(reader.participant) {
            return;
        }
        let (Some(publisher), Some(subscriber)) = (
            self.publishers.get(&writer.publisher),
            self.subscribers.get(&reader.subscriber),
        ) else {
            return;
        };
        if !publisher.qos.partition.matches(&subscriber.qos.partition) {
            return;
        }

        let compat = check_compatibility(&publisher.qos, &writer.qos, &subscriber.qos, &reader.qos);
        let (wp, wtopic) = (writer.participant, writer.topic);
        let (rp, rtopic) = (reader.participant, reader.topic);
        let durable =
            writer.qos.durability.retains_history() && reader.qos.durability.retains_history();

        if let Err(policy) = compat {
            log::debug!(
                "[loopback] writer {} / reader {} incompatible: {}",
                writer_id,
                reader_id,
                policy
            );
            let offered = self.writers.get_mut(&writer_id).map(|w| {
                w.incompatible_total += 1;
                w.incompatible_total
            });
            let requested = self.readers.get_mut(&reader_id).map(|r| {
                r.incompatible_total += 1;
                r.incompatible_total
            });
            if let Some(total_count) = offered {
                let status = IncompatibleQosStatus {
                    total_count,
                    total_count_change: 1,
                    last_policy: policy,
                };
                self.notify(events, wp, wtopic, move |l, t| {
                    l.on_offered_incompatible_qos(t, &status)
                });
            }
            if let Some(total_count) = requested {
                let status = IncompatibleQosStatus {
                    total_count,
                    total_count_change: 1,
                    last_policy: policy,
                };
                self.notify(events, rp, rtopic, move |l, t| {
                    l.on_requested_incompatible_qos(t, &status)
                });
            }
            return;
        }

        log::debug!("[loopback] matched writer {} with reader {}", writer_id, reader_id);
        let publication = self.writers.get_mut(&writer_id).map(|w| {
            w.matched.insert(reader_id);
            w.matched_total += 1;
            PublicationMatchedStatus {
                total_count: w.matched_total,
                total_count_change: 1,
                current_count: w.matched.len() as u32,
                current_count_change: 1,
            }
        });
        let subscription = self.readers.get_mut(&reader_id).map(|r| {
            r.matched.insert(writer_id);
            r.matched_total += 1;
            SubscriptionMatchedStatus {
                total_count: r.matched_total,
                total_count_change: 1,
                current_count: r.matched.len() as u32,
                current_count_change: 1,
            }
        });
        if let Some(status) = publication {
            self.notify(events, wp, wtopic, move |l, t| l.on_publication_matched(t, &status));
        }
        if let Some(status) = subscription {
            let liveliness = LivelinessChangedStatus {
                alive_count: status.current_count,
                alive_count_change: 1,
                not_alive_count: 0,
                not_alive_count_change: 0,
            };
            self.notify(events, rp, rtopic, move |l, t| l.on_subscription_matched(t, &status));
            self.notify(events, rp, rtopic, move |l, t| l.on_liveliness_changed(t, &liveliness));
        }

        if durable {
            self.replay_history(writer_id, reader_id, events);
        }
    }

    /// Hand a late-joining reader what a durable writer retained.
    fn replay_history(&mut self, writer_id: u64, reader_id: u64, events: &mut Vec<Event>) {
        let Some(writer) = self.writers.get(&writer_id) else {
            return;
        };
        let retained: Vec<(InstanceHandle, ShapeType)> = writer
            .retained
            .iter()
            .flat_map(|(handle, samples)| samples.iter().map(move |s| (*handle, s.clone())))
            .collect();
        log::debug!(
            "[loopback] replaying {} retained samples to reader {}",
            retained.len(),
            reader_id
        );
        let now = Instant::now();
        for (handle, sample) in retained {
            self.deliver(
                writer_id,
                reader_id,
                &Change {
                    writer: writer_id,
                    kind: ChangeKind::Write,
                    sample,
                    handle,
                },
                events,
                now,
            );
        }
    }

    // ========================================================================
    // Data path
    // ========================================================================

    pub(super) fn write_change(
        &mut self,
        writer_id: u64,
        kind: ChangeKind,
        sample: &ShapeType,
        handle: InstanceHandle,
        events: &mut Vec<Event>,
    ) -> ProviderResult<()> {
        let now = Instant::now();
        let expected = key_hash(&sample.color);
        if !handle.is_nil() && handle != expected {
            return Err(ProviderError::PreconditionNotMet(
                "instance handle does not match the sample key".into(),
            ));
        }
        let handle = expected;

        let writer = self
            .writers
            .get_mut(&writer_id)
            .ok_or_else(|| unknown("writer", writer_id))?;
        let mut missed = None;
        match kind {
            ChangeKind::Write => {
                let last = writer.last_write.get(&handle);
                if let (Some(period), Some(last)) = (writer.qos.deadline, last) {
                    if now.saturating_duration_since(*last) > period {
                        writer.deadline_total += 1;
                        missed = Some(writer.deadline_total);
                    }
                }
                writer.last_write.insert(handle, now);
                writer.registered.insert(handle, sample.color.clone());
                if writer.qos.durability.retains_history() {
                    let samples = writer.retained.entry(handle).or_default();
                    samples.push_back(sample.clone());
                    if let Some(depth) = writer.qos.history.depth() {
                        while samples.len() > depth {
                            samples.pop_front();
                        }
                    }
                }
            }
            ChangeKind::Unregister => {
                if writer.registered.remove(&handle).is_none() {
                    return Err(ProviderError::PreconditionNotMet(format!(
                        "instance '{}' is not registered",
                        sample.color
                    )));
                }
                writer.last_write.remove(&handle);
                writer.retained.remove(&handle);
            }
            ChangeKind::Dispose => {
                writer.retained.remove(&handle);
            }
        }
        let (publisher, participant, topic) = (writer.publisher, writer.participant, writer.topic);

        if let Some(total_count) = missed {
            let status = DeadlineMissedStatus {
                total_count,
                total_count_change: 1,
                last_instance_handle: handle,
            };
            self.notify(events, participant, topic, move |l, t| {
                l.on_offered_deadline_missed(t, &status)
            });
        }

        let change = Change {
            writer: writer_id,
            kind,
            sample: if kind == ChangeKind::Write {
                sample.clone()
            } else {
                ShapeType::key_only(sample.color.clone())
            },
            handle,
        };
        match self.publishers.get_mut(&publisher).and_then(|p| p.coherent.as_mut()) {
            Some(pending) => pending.push(change),
            None => self.apply(&change, events, now),
        }
        Ok(())
    }

    fn apply(&mut self, change: &Change, events: &mut Vec<Event>, now: Instant) {
        let Some(writer) = self.writers.get(&change.writer) else {
            return;
        };
        let readers: Vec<u64> = writer.matched.iter().copied().collect();
        for reader in readers {
            self.deliver(change.writer, reader, change, events, now);
        }
    }

    fn deliver(
        &mut self,
        writer_id: u64,
        reader_id: u64,
        change: &Change,
        events: &mut Vec<Event>,
        now: Instant,
    ) {
        let Some(writer) = self.writers.get(&writer_id) else {
            return;
        };
        let strength = writer.qos.ownership.strength;
        let lifespan = writer.qos.lifespan;
        let autodispose = writer.qos.writer_data_lifecycle.autodispose_unregistered_instances;

        let Some(reader) = self.readers.get_mut(&reader_id) else {
            return;
        };
        let filter = self.topics.get(&reader.topic).and_then(|t| t.filter.as_ref());
        let delivered = match change.kind {
            ChangeKind::Write => {
                let passes = filter.map_or(true, |f| {
                    f.matches(&change.sample).unwrap_or_else(|e| {
                        log::debug!("[loopback] filter '{}' failed: {}", f.expression(), e);
                        false
                    })
                });
                passes
                    && reader
                        .cache
                        .write(writer_id, strength, change.handle, &change.sample, lifespan, now)
            }
            ChangeKind::Unregister => {
                reader
                    .cache
                    .unregister(writer_id, change.handle, autodispose, now)
            }
            ChangeKind::Dispose => reader.cache.dispose(writer_id, change.handle, now),
        };
        let (participant, topic) = (reader.participant, reader.topic);
        if delivered {
            self.notify(events, participant, topic, |l, t| l.on_data_available(t));
        }
    }

    pub(super) fn begin_coherent_changes(&mut self, publisher: u64) -> ProviderResult<()> {
        let entry = self
            .publishers
            .get_mut(&publisher)
            .ok_or_else(|| unknown("publisher", publisher))?;
        if entry.coherent.is_some() {
            return Err(ProviderError::PreconditionNotMet(
                "already in a coherent change set".into(),
            ));
        }
        entry.coherent = Some(Vec::new());
        log::debug!("[loopback] publisher {} begin coherent changes", publisher);
        Ok(())
    }

    pub(super) fn end_coherent_changes(
        &mut self,
        publisher: u64,
        events: &mut Vec<Event>,
    ) -> ProviderResult<()> {
        let pending = self
            .publishers
            .get_mut(&publisher)
            .ok_or_else(|| unknown("publisher", publisher))?
            .coherent
            .take()
            .ok_or_else(|| {
                ProviderError::PreconditionNotMet("not in a coherent change set".into())
            })?;
        log::debug!(
            "[loopback] publisher {} end coherent changes ({} changes)",
            publisher,
            pending.len()
        );
        let now = Instant::now();
        for change in &pending {
            self.apply(change, events, now);
        }
        Ok(())
    }

    pub(super) fn begin_access(&mut self, subscriber: u64) -> ProviderResult<()> {
        let entry = self
            .subscribers
            .get_mut(&subscriber)
            .ok_or_else(|| unknown("subscriber", subscriber))?;
        entry.access_depth += 1;
        Ok(())
    }

    pub(super) fn end_access(&mut self, subscriber: u64) -> ProviderResult<()> {
        let entry = self
            .subscribers
            .get_mut(&subscriber)
            .ok_or_else(|| unknown("subscriber", subscriber))?;
        if entry.access_depth == 0 {
            return Err(ProviderError::PreconditionNotMet("end_access without begin_access".into()));
        }
        entry.access_depth -= 1;
        Ok(())
    }

    pub(super) fn read(
        &mut self,
        reader_id: u64,
        after: Option<InstanceHandle>,
        max_samples: usize,
        masks: ReadMasks,
        take: bool,
        events: &mut Vec<Event>,
    ) -> ProviderResult<Loan> {
        if max_samples == 0 {
            return Err(ProviderError::BadParameter("max_samples must be > 0".into()));
        }
        let now = Instant::now();
        let reader = self
            .readers
            .get_mut(&reader_id)
            .ok_or_else(|| unknown("reader", reader_id))?;

        let mut missed = Vec::new();
        if let Some(period) = reader.qos.deadline {
            for handle in reader.cache.missed_deadlines(period, now) {
                reader.deadline_total += 1;
                missed.push(DeadlineMissedStatus {
                    total_count: reader.deadline_total,
                    total_count_change: 1,
                    last_instance_handle: handle,
                });
            }
        }

        let entries = reader.cache.collect(after, max_samples, masks, take, now);
        let (participant, topic) = (reader.participant, reader.topic);
        let result = if entries.is_empty() {
            Err(ProviderError::NoData)
        } else {
            reader.loans += 1;
            Ok(Loan::new(ReaderHandle(reader_id), entries))
        };

        for status in missed {
            self.notify(events, participant, topic, move |l, t| {
                l.on_requested_deadline_missed(t, &status)
            });
        }
        result
    }

    pub(super) fn return_loan(&mut self, reader_id: u64, loan: Loan) -> ProviderResult<()> {
        let reader = self
            .readers
            .get_mut(&reader_id)
            .ok_or_else(|| unknown("reader", reader_id))?;
        if loan.reader().0 != reader_id {
            return Err(ProviderError::PreconditionNotMet("loan belongs to another reader".into()));
        }
        if reader.loans == 0 {
            return Err(ProviderError::PreconditionNotMet("no outstanding loan".into()));
        }
        reader.loans -= 1;
        Ok(())
    }

    pub(super) fn key_value(
        &self,
        reader_id: u64,
        handle: InstanceHandle,
    ) -> ProviderResult<ShapeType> {
        let reader = self
            .readers
            .get(&reader_id)
            .ok_or_else(|| unknown("reader", reader_id))?;
        reader
            .cache
            .key_of(handle)
            .map(ShapeType::key_only)
            .ok_or_else(|| ProviderError::BadParameter(format!("unknown instance {:?}", handle)))
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    pub(super) fn delete_contained_entities(
        &mut self,
        participant: u64,
        events: &mut Vec<Event>,
    ) -> ProviderResult<()> {
        if !self.participants.contains_key(&participant) {
            return Err(ProviderError::AlreadyDeleted(format!("participant {}", participant)));
        }
        let now = Instant::now();

        let writers: Vec<u64> = self
            .writers
            .iter()
            .filter(|(_, w)| w.participant == participant)
            .map(|(id, _)| *id)
            .collect();
        for writer_id in writers {
            let Some(writer) = self.writers.remove(&writer_id) else {
                continue;
            };
            let autodispose = writer.qos.writer_data_lifecycle.autodispose_unregistered_instances;
            for reader_id in writer.matched {
                let Some(reader) = self.readers.get_mut(&reader_id) else {
                    continue;
                };
                reader.cache.remove_writer(writer_id, autodispose, now);
                reader.matched.remove(&writer_id);
                let status = SubscriptionMatchedStatus {
                    total_count: reader.matched_total,
                    total_count_change: 0,
                    current_count: reader.matched.len() as u32,
                    current_count_change: -1,
                };
                let liveliness = LivelinessChangedStatus {
                    alive_count: status.current_count,
                    alive_count_change: -1,
                    not_alive_count: 0,
                    not_alive_count_change: 0,
                };
                let (rp, rtopic) = (reader.participant, reader.topic);
                self.notify(events, rp, rtopic, move |l, t| l.on_subscription_matched(t, &status));
                self.notify(events, rp, rtopic, move |l, t| {
                    l.on_liveliness_changed(t, &liveliness)
                });
            }
        }

        let readers: Vec<u64> = self
            .readers
            .iter()
            .filter(|(_, r)| r.participant == participant)
            .map(|(id, _)| *id)
            .collect();
        for reader_id in readers {
            let Some(reader) = self.readers.remove(&reader_id) else {
                continue;
            };
            for writer_id in reader.matched {
                let Some(writer) = self.writers.get_mut(&writer_id) else {
                    continue;
                };
                writer.matched.remove(&reader_id);
                let status = PublicationMatchedStatus {
                    total_count: writer.matched_total,
                    total_count_change: 0,
                    current_count: writer.matched.len() as u32,
                    current_count_change: -1,
                };
                let (wp, wtopic) = (writer.participant, writer.topic);
                self.notify(events, wp, wtopic, move |l, t| l.on_publication_matched(t, &status));
            }
        }

        self.topics.retain(|_, t| t.participant != participant);
        self.publishers.retain(|_, p| p.participant != participant);
        self.subscribers.retain(|_, s| s.participant != participant);
        self.participants.remove(&participant);
        log::debug!("[loopback] deleted participant {}", participant);
        Ok(())
    }
}
