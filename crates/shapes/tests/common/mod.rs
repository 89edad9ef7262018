// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Helpers shared by the integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use shapes::config::ShapeOptions;
use shapes::error::{ProviderError, ProviderResult};
use shapes::provider::loopback::{LoopbackBus, LoopbackProvider};
use shapes::provider::{
    EntityListener, FilterSpec, InstanceHandle, Loan, ParticipantHandle, Provider,
    PublisherHandle, ReadMasks, ReaderHandle, SubscriberHandle, TopicHandle, WriterHandle,
};
use shapes::qos::{PublisherQos, ReaderQos, SubscriberQos, WriterQos};
use shapes::subscription::Subscription;
use shapes::{ShapeEntities, ShapeType};
use std::sync::Arc;

pub fn options(args: &[&str]) -> ShapeOptions {
    ShapeOptions::parse_from(std::iter::once("shape_main").chain(args.iter().copied()))
        .expect("valid options")
}

pub fn entities<P: Provider>(provider: P, options: &ShapeOptions) -> ShapeEntities<P> {
    ShapeEntities::initialize(provider, options, None, &mut std::io::sink())
        .expect("entities created")
}

pub fn loopback_entities(
    bus: &LoopbackBus,
    options: &ShapeOptions,
) -> ShapeEntities<LoopbackProvider> {
    entities(LoopbackProvider::new(bus.clone()), options)
}

/// Run one subscription cycle and return the printed lines.
pub fn read_cycle<P: Provider>(
    subscription: &mut Subscription<'_>,
    entities: &mut ShapeEntities<P>,
) -> Vec<String> {
    let mut out = Vec::new();
    subscription.cycle(entities, &mut out).expect("read cycle");
    String::from_utf8(out)
        .expect("utf-8 output")
        .lines()
        .map(str::to_string)
        .collect()
}

/// Call observed by a [`RecordingProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Write { color: String, x: i32, y: i32 },
    Unregister(String),
    Dispose(String),
    BeginCoherent,
    EndCoherent,
}

/// Provider operation a [`Fault`] can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Write,
    Read,
    ReturnLoan,
    BeginCoherent,
    EndCoherent,
    BeginAccess,
    EndAccess,
}

/// Failure injected into matching provider calls.
#[derive(Debug, Clone)]
pub struct Fault {
    op: Op,
    reader: Option<ReaderHandle>,
    color: Option<String>,
    skip: u32,
    times: u32,
}

impl Fault {
    /// Fail every `op` call.
    pub fn on(op: Op) -> Self {
        Self {
            op,
            reader: None,
            color: None,
            skip: 0,
            times: u32::MAX,
        }
    }

    /// Only calls on `reader`.
    pub fn reader(mut self, reader: ReaderHandle) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Only writes of the instance with key `color`.
    pub fn color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    /// Let the first `calls` matching calls through.
    pub fn after(mut self, calls: u32) -> Self {
        self.skip = calls;
        self
    }

    /// Fail at most `calls` times.
    pub fn times(mut self, calls: u32) -> Self {
        self.times = calls;
        self
    }
}

/// Shared set of injected faults, kept by the test after the provider moves.
#[derive(Clone, Default)]
pub struct Faults(Arc<Mutex<Vec<Fault>>>);

impl Faults {
    pub fn inject(&self, fault: Fault) {
        self.0.lock().push(fault);
    }

    fn check(
        &self,
        op: Op,
        reader: Option<ReaderHandle>,
        color: Option<&str>,
    ) -> ProviderResult<()> {
        for fault in self.0.lock().iter_mut() {
            if fault.op != op
                || fault.reader.is_some_and(|r| Some(r) != reader)
                || fault.color.as_deref().is_some_and(|c| Some(c) != color)
            {
                continue;
            }
            if fault.skip > 0 {
                fault.skip -= 1;
                continue;
            }
            if fault.times > 0 {
                fault.times -= 1;
                return Err(ProviderError::Error(format!("injected {:?} failure", op)));
            }
        }
        Ok(())
    }
}

/// Provider wrapper that records the data-path calls it forwards and fails
/// the ones its [`Faults`] select.
pub struct RecordingProvider<P> {
    inner: P,
    calls: Arc<Mutex<Vec<Call>>>,
    faults: Faults,
}

impl<P: Provider> RecordingProvider<P> {
    pub fn new(inner: P) -> (Self, Arc<Mutex<Vec<Call>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inner,
                calls: calls.clone(),
                faults: Faults::default(),
            },
            calls,
        )
    }

    pub fn faults(&self) -> Faults {
        self.faults.clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

impl<P: Provider> Provider for RecordingProvider<P> {
    fn name(&self) -> &str {
        "recording"
    }

    fn create_participant(
        &mut self,
        domain_id: u32,
        listener: Option<Arc<dyn EntityListener>>,
    ) -> ProviderResult<ParticipantHandle> {
        self.inner.create_participant(domain_id, listener)
    }

    fn register_type(
        &mut self,
        participant: ParticipantHandle,
        type_name: &str,
    ) -> ProviderResult<()> {
        self.inner.register_type(participant, type_name)
    }

    fn create_topic(
        &mut self,
        participant: ParticipantHandle,
        name: &str,
        type_name: &str,
    ) -> ProviderResult<TopicHandle> {
        self.inner.create_topic(participant, name, type_name)
    }

    fn create_content_filtered_topic(
        &mut self,
        participant: ParticipantHandle,
        name: &str,
        related: TopicHandle,
        filter: &FilterSpec,
    ) -> ProviderResult<TopicHandle> {
        self.inner
            .create_content_filtered_topic(participant, name, related, filter)
    }

    fn create_publisher(
        &mut self,
        participant: ParticipantHandle,
        qos: &PublisherQos,
    ) -> ProviderResult<PublisherHandle> {
        self.inner.create_publisher(participant, qos)
    }

    fn create_subscriber(
        &mut self,
        participant: ParticipantHandle,
        qos: &SubscriberQos,
    ) -> ProviderResult<SubscriberHandle> {
        self.inner.create_subscriber(participant, qos)
    }

    fn create_writer(
        &mut self,
        publisher: PublisherHandle,
        topic: TopicHandle,
        qos: &WriterQos,
    ) -> ProviderResult<WriterHandle> {
        self.inner.create_writer(publisher, topic, qos)
    }

    fn create_reader(
        &mut self,
        subscriber: SubscriberHandle,
        topic: TopicHandle,
        qos: &ReaderQos,
    ) -> ProviderResult<ReaderHandle> {
        self.inner.create_reader(subscriber, topic, qos)
    }

    fn write(
        &mut self,
        writer: WriterHandle,
        sample: &ShapeType,
        handle: InstanceHandle,
    ) -> ProviderResult<()> {
        self.record(Call::Write {
            color: sample.color.clone(),
            x: sample.x,
            y: sample.y,
        });
        self.faults.check(Op::Write, None, Some(&sample.color))?;
        self.inner.write(writer, sample, handle)
    }

    fn unregister_instance(
        &mut self,
        writer: WriterHandle,
        sample: &ShapeType,
        handle: InstanceHandle,
    ) -> ProviderResult<()> {
        self.record(Call::Unregister(sample.color.clone()));
        self.inner.unregister_instance(writer, sample, handle)
    }

    fn dispose(
        &mut self,
        writer: WriterHandle,
        sample: &ShapeType,
        handle: InstanceHandle,
    ) -> ProviderResult<()> {
        self.record(Call::Dispose(sample.color.clone()));
        self.inner.dispose(writer, sample, handle)
    }

    fn begin_coherent_changes(&mut self, publisher: PublisherHandle) -> ProviderResult<()> {
        self.record(Call::BeginCoherent);
        self.faults.check(Op::BeginCoherent, None, None)?;
        self.inner.begin_coherent_changes(publisher)
    }

    fn end_coherent_changes(&mut self, publisher: PublisherHandle) -> ProviderResult<()> {
        self.record(Call::EndCoherent);
        self.faults.check(Op::EndCoherent, None, None)?;
        self.inner.end_coherent_changes(publisher)
    }

    fn begin_access(&mut self, subscriber: SubscriberHandle) -> ProviderResult<()> {
        self.faults.check(Op::BeginAccess, None, None)?;
        self.inner.begin_access(subscriber)
    }

    fn end_access(&mut self, subscriber: SubscriberHandle) -> ProviderResult<()> {
        self.faults.check(Op::EndAccess, None, None)?;
        self.inner.end_access(subscriber)
    }

    fn take(
        &mut self,
        reader: ReaderHandle,
        max_samples: usize,
        masks: ReadMasks,
    ) -> ProviderResult<Loan> {
        self.faults.check(Op::Read, Some(reader), None)?;
        self.inner.take(reader, max_samples, masks)
    }

    fn read(
        &mut self,
        reader: ReaderHandle,
        max_samples: usize,
        masks: ReadMasks,
    ) -> ProviderResult<Loan> {
        self.faults.check(Op::Read, Some(reader), None)?;
        self.inner.read(reader, max_samples, masks)
    }

    fn take_next_instance(
        &mut self,
        reader: ReaderHandle,
        previous: InstanceHandle,
        max_samples: usize,
        masks: ReadMasks,
    ) -> ProviderResult<Loan> {
        self.faults.check(Op::Read, Some(reader), None)?;
        self.inner
            .take_next_instance(reader, previous, max_samples, masks)
    }

    fn read_next_instance(
        &mut self,
        reader: ReaderHandle,
        previous: InstanceHandle,
        max_samples: usize,
        masks: ReadMasks,
    ) -> ProviderResult<Loan> {
        self.faults.check(Op::Read, Some(reader), None)?;
        self.inner
            .read_next_instance(reader, previous, max_samples, masks)
    }

    fn return_loan(&mut self, reader: ReaderHandle, loan: Loan) -> ProviderResult<()> {
        self.faults.check(Op::ReturnLoan, Some(reader), None)?;
        self.inner.return_loan(reader, loan)
    }

    fn supports_key_lookup(&self) -> bool {
        self.inner.supports_key_lookup()
    }

    fn get_key_value(
        &mut self,
        reader: ReaderHandle,
        handle: InstanceHandle,
    ) -> ProviderResult<ShapeType> {
        self.inner.get_key_value(reader, handle)
    }

    fn delete_contained_entities(&mut self, participant: ParticipantHandle) -> ProviderResult<()> {
        self.inner.delete_contained_entities(participant)
    }
}
