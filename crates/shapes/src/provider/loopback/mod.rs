// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process loopback provider.
//!
//! Every [`LoopbackProvider`] built from the same [`LoopbackBus`] sees the
//! same domains, so a publisher and a subscriber application can run side by
//! side inside one process (tests, demos, or a single `shape_main` run that
//! only exercises one role).
//!
//! The bus models endpoint matching, RxO QoS compatibility, partitions,
//! content filters, instance lifecycle, TRANSIENT_LOCAL replay and coherent
//! sets. There is no transport, serialization or discovery traffic.
//!
//! ```
//! use shapes::provider::loopback::{LoopbackBus, LoopbackProvider};
//! use shapes::provider::Provider;
//!
//! let bus = LoopbackBus::new();
//! let mut publisher_side = LoopbackProvider::new(bus.clone());
//! let mut subscriber_side = LoopbackProvider::new(bus);
//! let p1 = publisher_side.create_participant(0, None).unwrap();
//! let p2 = subscriber_side.create_participant(0, None).unwrap();
//! assert_ne!(p1, p2);
//! ```

mod bus;
mod cache;
mod filter;

pub use filter::{ContentFilter, FilterError};

use bus::{BusState, ChangeKind, Event};
use crate::error::ProviderResult;
use crate::provider::{
    EntityListener, FilterSpec, InstanceHandle, Loan, ParticipantHandle, Provider,
    PublisherHandle, ReadMasks, ReaderHandle, SubscriberHandle, TopicHandle, WriterHandle,
};
use crate::qos::{PublisherQos, ReaderQos, SubscriberQos, WriterQos};
use crate::shape::ShapeType;
use parking_lot::Mutex;
use std::sync::Arc;

/// Instance handle of a key: MD5 of the key string.
pub fn key_hash(key: &str) -> InstanceHandle {
    use md5::{Digest, Md5};
    let mut hasher = Md5::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    InstanceHandle(bytes)
}

/// Shared in-memory "network".
#[derive(Clone, Default)]
pub struct LoopbackBus {
    state: Arc<Mutex<BusState>>,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }
}

/// [`Provider`] backed by a [`LoopbackBus`].
pub struct LoopbackProvider {
    bus: LoopbackBus,
    key_lookup: bool,
}

impl LoopbackProvider {
    pub fn new(bus: LoopbackBus) -> Self {
        Self {
            bus,
            key_lookup: true,
        }
    }

    /// Disable `get_key_value`, forcing callers onto their own key cache.
    pub fn without_key_lookup(mut self) -> Self {
        self.key_lookup = false;
        self
    }

    /// Run `op` under the bus lock, then fire the listener events it queued.
    fn with_bus<T>(
        &self,
        op: impl FnOnce(&mut BusState, &mut Vec<Event>) -> ProviderResult<T>,
    ) -> ProviderResult<T> {
        let mut events = Vec::new();
        let result = {
            let mut state = self.bus.state.lock();
            op(&mut state, &mut events)
        };
        for event in events {
            event();
        }
        result
    }
}

impl Provider for LoopbackProvider {
    fn name(&self) -> &str {
        "loopback"
    }

    fn create_participant(
        &mut self,
        domain_id: u32,
        listener: Option<Arc<dyn EntityListener>>,
    ) -> ProviderResult<ParticipantHandle> {
        self.with_bus(|bus, _| Ok(ParticipantHandle(bus.create_participant(domain_id, listener))))
    }

    fn register_type(
        &mut self,
        participant: ParticipantHandle,
        type_name: &str,
    ) -> ProviderResult<()> {
        self.with_bus(|bus, _| bus.register_type(participant.0, type_name))
    }

    fn create_topic(
        &mut self,
        participant: ParticipantHandle,
        name: &str,
        type_name: &str,
    ) -> ProviderResult<TopicHandle> {
        self.with_bus(|bus, events| bus.create_topic(participant.0, name, type_name, events))
            .map(TopicHandle)
    }

    fn create_content_filtered_topic(
        &mut self,
        participant: ParticipantHandle,
        name: &str,
        related: TopicHandle,
        filter: &FilterSpec,
    ) -> ProviderResult<TopicHandle> {
        self.with_bus(|bus, _| {
            bus.create_content_filtered_topic(participant.0, name, related.0, filter)
        })
        .map(TopicHandle)
    }

    fn create_publisher(
        &mut self,
        participant: ParticipantHandle,
        qos: &PublisherQos,
    ) -> ProviderResult<PublisherHandle> {
        self.with_bus(|bus, _| bus.create_publisher(participant.0, qos))
            .map(PublisherHandle)
    }

    fn create_subscriber(
        &mut self,
        participant: ParticipantHandle,
        qos: &SubscriberQos,
    ) -> ProviderResult<SubscriberHandle> {
        self.with_bus(|bus, _| bus.create_subscriber(participant.0, qos))
            .map(SubscriberHandle)
    }

    fn create_writer(
        &mut self,
        publisher: PublisherHandle,
        topic: TopicHandle,
        qos: &WriterQos,
    ) -> ProviderResult<WriterHandle> {
        self.with_bus(|bus, events| bus.create_writer(publisher.0, topic.0, qos, events))
            .map(WriterHandle)
    }

    fn create_reader(
        &mut self,
        subscriber: SubscriberHandle,
        topic: TopicHandle,
        qos: &ReaderQos,
    ) -> ProviderResult<ReaderHandle> {
        self.with_bus(|bus, events| bus.create_reader(subscriber.0, topic.0, qos, events))
            .map(ReaderHandle)
    }

    fn write(
        &mut self,
        writer: WriterHandle,
        sample: &ShapeType,
        handle: InstanceHandle,
    ) -> ProviderResult<()> {
        self.with_bus(|bus, events| {
            bus.write_change(writer.0, ChangeKind::Write, sample, handle, events)
        })
    }

    fn unregister_instance(
        &mut self,
        writer: WriterHandle,
        sample: &ShapeType,
        handle: InstanceHandle,
    ) -> ProviderResult<()> {
        self.with_bus(|bus, events| {
            bus.write_change(writer.0, ChangeKind::Unregister, sample, handle, events)
        })
    }

    fn dispose(
        &mut self,
        writer: WriterHandle,
        sample: &ShapeType,
        handle: InstanceHandle,
    ) -> ProviderResult<()> {
        self.with_bus(|bus, events| {
            bus.write_change(writer.0, ChangeKind::Dispose, sample, handle, events)
        })
    }

    fn begin_coherent_changes(&mut self, publisher: PublisherHandle) -> ProviderResult<()> {
        self.with_bus(|bus, _| bus.begin_coherent_changes(publisher.0))
    }

    fn end_coherent_changes(&mut self, publisher: PublisherHandle) -> ProviderResult<()> {
        self.with_bus(|bus, events| bus.end_coherent_changes(publisher.0, events))
    }

    fn begin_access(&mut self, subscriber: SubscriberHandle) -> ProviderResult<()> {
        self.with_bus(|bus, _| bus.begin_access(subscriber.0))
    }

    fn end_access(&mut self, subscriber: SubscriberHandle) -> ProviderResult<()> {
        self.with_bus(|bus, _| bus.end_access(subscriber.0))
    }

    fn take(
        &mut self,
        reader: ReaderHandle,
        max_samples: usize,
        masks: ReadMasks,
    ) -> ProviderResult<Loan> {
        self.with_bus(|bus, events| bus.read(reader.0, None, max_samples, masks, true, events))
    }

    fn read(
        &mut self,
        reader: ReaderHandle,
        max_samples: usize,
        masks: ReadMasks,
    ) -> ProviderResult<Loan> {
        self.with_bus(|bus, events| bus.read(reader.0, None, max_samples, masks, false, events))
    }

    fn take_next_instance(
        &mut self,
        reader: ReaderHandle,
        previous: InstanceHandle,
        max_samples: usize,
        masks: ReadMasks,
    ) -> ProviderResult<Loan> {
        self.with_bus(|bus, events| {
            bus.read(reader.0, Some(previous), max_samples, masks, true, events)
        })
    }

    fn read_next_instance(
        &mut self,
        reader: ReaderHandle,
        previous: InstanceHandle,
        max_samples: usize,
        masks: ReadMasks,
    ) -> ProviderResult<Loan> {
        self.with_bus(|bus, events| {
            bus.read(reader.0, Some(previous), max_samples, masks, false, events)
        })
    }

    fn return_loan(&mut self, reader: ReaderHandle, loan: Loan) -> ProviderResult<()> {
        self.with_bus(|bus, _| bus.return_loan(reader.0, loan))
    }

    fn supports_key_lookup(&self) -> bool {
        self.key_lookup
    }

    fn get_key_value(
        &mut self,
        reader: ReaderHandle,
        handle: InstanceHandle,
    ) -> ProviderResult<ShapeType> {
        if !self.key_lookup {
            return Err(crate::error::ProviderError::Unsupported("get_key_value"));
        }
        self.with_bus(|bus, _| bus.key_value(reader.0, handle))
    }

    fn delete_contained_entities(&mut self, participant: ParticipantHandle) -> ProviderResult<()> {
        self.with_bus(|bus, events| bus.delete_contained_entities(participant.0, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::listener::{
        IncompatibleQosStatus, PublicationMatchedStatus, SubscriptionMatchedStatus,
    };
    use crate::provider::{InstanceState, TopicInfo, LENGTH_UNLIMITED};
    use crate::qos::{DurabilityKind, Partition, QosPolicyId};
    use crate::shape::SHAPE_TYPE_NAME;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Counters {
        publication_matched: AtomicU32,
        subscription_matched: AtomicU32,
        requested_incompatible: Mutex<Vec<QosPolicyId>>,
        offered_incompatible: AtomicU32,
    }

    impl EntityListener for Counters {
        fn on_publication_matched(&self, _: TopicInfo<'_>, _: &PublicationMatchedStatus) {
            self.publication_matched.fetch_add(1, Ordering::SeqCst);
        }

        fn on_subscription_matched(&self, _: TopicInfo<'_>, _: &SubscriptionMatchedStatus) {
            self.subscription_matched.fetch_add(1, Ordering::SeqCst);
        }

        fn on_requested_incompatible_qos(&self, _: TopicInfo<'_>, status: &IncompatibleQosStatus) {
            self.requested_incompatible.lock().push(status.last_policy);
        }

        fn on_offered_incompatible_qos(&self, _: TopicInfo<'_>, _: &IncompatibleQosStatus) {
            self.offered_incompatible.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Pair {
        provider: LoopbackProvider,
        writer: WriterHandle,
        publisher: PublisherHandle,
        reader: ReaderHandle,
        listener: Arc<Counters>,
    }

    fn pair_with(
        pub_qos: PublisherQos,
        writer_qos: WriterQos,
        sub_qos: SubscriberQos,
        reader_qos: ReaderQos,
        filter: Option<FilterSpec>,
    ) -> Pair {
        let mut provider = LoopbackProvider::new(LoopbackBus::new());
        let listener = Arc::new(Counters::default());
        let participant = provider
            .create_participant(0, Some(listener.clone() as Arc<dyn EntityListener>))
            .unwrap();
        provider.register_type(participant, SHAPE_TYPE_NAME).unwrap();
        let topic = provider
            .create_topic(participant, "Square", SHAPE_TYPE_NAME)
            .unwrap();
        let read_topic = match filter {
            Some(spec) => provider
                .create_content_filtered_topic(participant, "Square_filtered", topic, &spec)
                .unwrap(),
            None => topic,
        };
        let publisher = provider.create_publisher(participant, &pub_qos).unwrap();
        let subscriber = provider.create_subscriber(participant, &sub_qos).unwrap();
        let writer = provider.create_writer(publisher, topic, &writer_qos).unwrap();
        let reader = provider
            .create_reader(subscriber, read_topic, &reader_qos)
            .unwrap();
        Pair {
            provider,
            writer,
            publisher,
            reader,
            listener,
        }
    }

    fn pair() -> Pair {
        pair_with(
            PublisherQos::default(),
            WriterQos::default(),
            SubscriberQos::default(),
            ReaderQos::default(),
            None,
        )
    }

    fn write(pair: &mut Pair, color: &str, x: i32) {
        pair.provider
            .write(pair.writer, &ShapeType::new(color, x, 0, 20), InstanceHandle::nil())
            .unwrap();
    }

    fn take_colors(pair: &mut Pair) -> Vec<String> {
        match pair.provider.take(pair.reader, LENGTH_UNLIMITED, ReadMasks::ANY) {
            Ok(loan) => {
                let colors = loan.iter().map(|(s, _)| s.color.clone()).collect();
                pair.provider.return_loan(pair.reader, loan).unwrap();
                colors
            }
            Err(ProviderError::NoData) => Vec::new(),
            Err(e) => panic!("take failed: {}", e),
        }
    }

    #[test]
    fn test_key_hash_is_stable() {
        assert_eq!(key_hash("RED"), key_hash("RED"));
        assert_ne!(key_hash("RED"), key_hash("BLUE"));
        assert!(!key_hash("").is_nil());
    }

    #[test]
    fn test_match_and_deliver() {
        let mut pair = pair();
        assert_eq!(pair.listener.publication_matched.load(Ordering::SeqCst), 1);
        assert_eq!(pair.listener.subscription_matched.load(Ordering::SeqCst), 1);
        write(&mut pair, "RED", 1);
        assert_eq!(take_colors(&mut pair), vec!["RED"]);
        assert!(take_colors(&mut pair).is_empty());
    }

    #[test]
    fn test_incompatible_reliability_reports_both_sides() {
        let mut pair = pair_with(
            PublisherQos::default(),
            WriterQos::default().best_effort(),
            SubscriberQos::default(),
            ReaderQos::default().reliable(),
            None,
        );
        assert_eq!(
            *pair.listener.requested_incompatible.lock(),
            vec![QosPolicyId::Reliability]
        );
        assert_eq!(pair.listener.offered_incompatible.load(Ordering::SeqCst), 1);
        write(&mut pair, "RED", 1);
        assert!(take_colors(&mut pair).is_empty());
    }

    #[test]
    fn test_partition_mismatch_is_silent() {
        let mut pair = pair_with(
            PublisherQos {
                partition: Partition::single("p1"),
                ..Default::default()
            },
            WriterQos::default(),
            SubscriberQos {
                partition: Partition::single("q*"),
                ..Default::default()
            },
            ReaderQos::default(),
            None,
        );
        assert_eq!(pair.listener.publication_matched.load(Ordering::SeqCst), 0);
        assert!(pair.listener.requested_incompatible.lock().is_empty());
        write(&mut pair, "RED", 1);
        assert!(take_colors(&mut pair).is_empty());
    }

    #[test]
    fn test_filtered_topic() {
        let mut pair = pair_with(
            PublisherQos::default(),
            WriterQos::default(),
            SubscriberQos::default(),
            ReaderQos::default().keep_all(),
            Some(FilterSpec::ColorEquals("BLUE".into())),
        );
        write(&mut pair, "RED", 1);
        write(&mut pair, "BLUE", 2);
        assert_eq!(take_colors(&mut pair), vec!["BLUE"]);
    }

    #[test]
    fn test_bad_filter_expression() {
        let mut provider = LoopbackProvider::new(LoopbackBus::new());
        let participant = provider.create_participant(0, None).unwrap();
        provider.register_type(participant, SHAPE_TYPE_NAME).unwrap();
        let topic = provider
            .create_topic(participant, "Square", SHAPE_TYPE_NAME)
            .unwrap();
        let spec = FilterSpec::Expression {
            expression: "colour = 'RED'".into(),
            parameters: vec![],
        };
        let result = provider.create_content_filtered_topic(participant, "f", topic, &spec);
        assert!(matches!(result, Err(ProviderError::BadParameter(_))));
    }

    #[test]
    fn test_topic_requires_registered_type() {
        let mut provider = LoopbackProvider::new(LoopbackBus::new());
        let participant = provider.create_participant(0, None).unwrap();
        let result = provider.create_topic(participant, "Square", SHAPE_TYPE_NAME);
        assert!(matches!(result, Err(ProviderError::PreconditionNotMet(_))));
    }

    #[test]
    fn test_coherent_set_is_delivered_at_end() {
        let mut pair = pair_with(
            PublisherQos::default(),
            WriterQos::default(),
            SubscriberQos::default(),
            ReaderQos::default().keep_all(),
            None,
        );
        pair.provider.begin_coherent_changes(pair.publisher).unwrap();
        assert!(pair.provider.begin_coherent_changes(pair.publisher).is_err());
        write(&mut pair, "RED", 1);
        write(&mut pair, "BLUE", 2);
        assert!(take_colors(&mut pair).is_empty());
        pair.provider.end_coherent_changes(pair.publisher).unwrap();
        assert_eq!(take_colors(&mut pair).len(), 2);
        assert!(pair.provider.end_coherent_changes(pair.publisher).is_err());
    }

    #[test]
    fn test_transient_local_late_joiner() {
        let bus = LoopbackBus::new();
        let mut pub_side = LoopbackProvider::new(bus.clone());
        let mut sub_side = LoopbackProvider::new(bus);

        let p = pub_side.create_participant(0, None).unwrap();
        pub_side.register_type(p, SHAPE_TYPE_NAME).unwrap();
        let topic = pub_side.create_topic(p, "Circle", SHAPE_TYPE_NAME).unwrap();
        let publisher = pub_side.create_publisher(p, &PublisherQos::default()).unwrap();
        let qos = WriterQos::default()
            .durability(DurabilityKind::TransientLocal)
            .keep_all();
        let writer = pub_side.create_writer(publisher, topic, &qos).unwrap();
        for size in 1..=3 {
            let sample = ShapeType::new("RED", 10, 10, size);
            pub_side.write(writer, &sample, InstanceHandle::nil()).unwrap();
        }

        let s = sub_side.create_participant(0, None).unwrap();
        sub_side.register_type(s, SHAPE_TYPE_NAME).unwrap();
        let topic = sub_side.create_topic(s, "Circle", SHAPE_TYPE_NAME).unwrap();
        let subscriber = sub_side.create_subscriber(s, &SubscriberQos::default()).unwrap();
        let reader_qos = ReaderQos::default()
            .durability(DurabilityKind::TransientLocal)
            .keep_all();
        let reader = sub_side.create_reader(subscriber, topic, &reader_qos).unwrap();

        let loan = sub_side.take(reader, LENGTH_UNLIMITED, ReadMasks::ANY).unwrap();
        let sizes: Vec<i32> = loan.iter().map(|(s, _)| s.shapesize).collect();
        assert_eq!(sizes, vec![1, 2, 3]);
        sub_side.return_loan(reader, loan).unwrap();
    }

    #[test]
    fn test_other_domain_does_not_match() {
        let bus = LoopbackBus::new();
        let mut a = LoopbackProvider::new(bus.clone());
        let mut b = LoopbackProvider::new(bus);
        let pa = a.create_participant(0, None).unwrap();
        let pb = b.create_participant(1, None).unwrap();
        for (provider, participant) in [(&mut a, pa), (&mut b, pb)] {
            provider.register_type(participant, SHAPE_TYPE_NAME).unwrap();
        }
        let ta = a.create_topic(pa, "Square", SHAPE_TYPE_NAME).unwrap();
        let tb = b.create_topic(pb, "Square", SHAPE_TYPE_NAME).unwrap();
        let publisher = a.create_publisher(pa, &PublisherQos::default()).unwrap();
        let writer = a.create_writer(publisher, ta, &WriterQos::default()).unwrap();
        let subscriber = b.create_subscriber(pb, &SubscriberQos::default()).unwrap();
        let reader = b.create_reader(subscriber, tb, &ReaderQos::default()).unwrap();
        a.write(writer, &ShapeType::new("RED", 1, 1, 1), InstanceHandle::nil())
            .unwrap();
        assert!(matches!(
            b.take(reader, LENGTH_UNLIMITED, ReadMasks::ANY),
            Err(ProviderError::NoData)
        ));
    }

    #[test]
    fn test_participant_teardown_unregisters() {
        let bus = LoopbackBus::new();
        let mut pub_side = LoopbackProvider::new(bus.clone());
        let mut sub_side = LoopbackProvider::new(bus);

        let p = pub_side.create_participant(0, None).unwrap();
        pub_side.register_type(p, SHAPE_TYPE_NAME).unwrap();
        let topic = pub_side.create_topic(p, "Square", SHAPE_TYPE_NAME).unwrap();
        let publisher = pub_side.create_publisher(p, &PublisherQos::default()).unwrap();
        let mut qos = WriterQos::default();
        qos.writer_data_lifecycle.autodispose_unregistered_instances = false;
        let writer = pub_side.create_writer(publisher, topic, &qos).unwrap();

        let s = sub_side.create_participant(0, None).unwrap();
        sub_side.register_type(s, SHAPE_TYPE_NAME).unwrap();
        let topic = sub_side.create_topic(s, "Square", SHAPE_TYPE_NAME).unwrap();
        let subscriber = sub_side.create_subscriber(s, &SubscriberQos::default()).unwrap();
        let reader = sub_side
            .create_reader(subscriber, topic, &ReaderQos::default())
            .unwrap();

        pub_side
            .write(writer, &ShapeType::new("RED", 1, 1, 1), InstanceHandle::nil())
            .unwrap();
        pub_side.delete_contained_entities(p).unwrap();
        assert!(matches!(
            pub_side.delete_contained_entities(p),
            Err(ProviderError::AlreadyDeleted(_))
        ));

        let loan = sub_side.take(reader, LENGTH_UNLIMITED, ReadMasks::ANY).unwrap();
        let info = *loan.infos().last().unwrap();
        assert!(!info.valid_data);
        assert_eq!(info.instance_state, InstanceState::NotAliveNoWriters);
        sub_side.return_loan(reader, loan).unwrap();
        let key = sub_side.get_key_value(reader, info.instance_handle).unwrap();
        assert_eq!(key.color, "RED");
    }

    #[test]
    fn test_key_lookup_can_be_disabled() {
        let mut provider = LoopbackProvider::new(LoopbackBus::new()).without_key_lookup();
        assert!(!provider.supports_key_lookup());
        let result = provider.get_key_value(ReaderHandle(1), key_hash("RED"));
        assert!(matches!(result, Err(ProviderError::Unsupported(_))));
    }

    #[test]
    fn test_return_loan_checks() {
        let mut pair = pair();
        write(&mut pair, "RED", 1);
        let loan = pair
            .provider
            .take(pair.reader, LENGTH_UNLIMITED, ReadMasks::ANY)
            .unwrap();
        pair.provider.return_loan(pair.reader, loan).unwrap();
        let empty = Loan::new(pair.reader, Vec::new());
        assert!(matches!(
            pair.provider.return_loan(pair.reader, empty),
            Err(ProviderError::PreconditionNotMet(_))
        ));
    }

    #[test]
    fn test_unregister_requires_registration() {
        let mut pair = pair();
        let result = pair.provider.unregister_instance(
            pair.writer,
            &ShapeType::key_only("RED"),
            InstanceHandle::nil(),
        );
        assert!(matches!(result, Err(ProviderError::PreconditionNotMet(_))));
    }
}
