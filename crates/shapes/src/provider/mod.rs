// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Middleware provider boundary.
//!
//! The exercise engine only talks to a middleware through [`Provider`]. Every
//! backend-specific detail (filter syntax, key lookup support, how instances are
//! hashed) stays behind this trait, so the publication and subscription loops
//! never branch on which middleware they drive.
//!
//! Read operations follow the DDS conventions:
//!
//! - `take`/`read` return every matching sample of every instance;
//! - `take_next_instance`/`read_next_instance` return the samples of the first
//!   instance whose handle sorts after `previous` (use [`InstanceHandle::nil`]
//!   to start);
//! - when nothing matches, the call fails with [`ProviderError::NoData`].
//!
//! [`ProviderError::NoData`]: crate::error::ProviderError::NoData

pub mod listener;
pub mod loopback;
mod types;

pub use listener::{ConsoleListener, EntityListener, TopicInfo};
pub use types::{
    FilterSpec, InstanceHandle, InstanceState, InstanceStateMask, Loan, ParticipantHandle,
    PublisherHandle, ReadMasks, ReaderHandle, SampleInfo, SampleState, SampleStateMask,
    SubscriberHandle, TopicHandle, WriterHandle, LENGTH_UNLIMITED,
};

use crate::error::{ProviderError, ProviderResult};
use crate::qos::{PublisherQos, ReaderQos, SubscriberQos, WriterQos};
use crate::shape::ShapeType;
use std::sync::Arc;

/// Operations the engine needs from a pub/sub middleware.
pub trait Provider {
    /// Short backend name for log messages.
    fn name(&self) -> &str;

    fn create_participant(
        &mut self,
        domain_id: u32,
        listener: Option<Arc<dyn EntityListener>>,
    ) -> ProviderResult<ParticipantHandle>;

    fn register_type(&mut self, participant: ParticipantHandle, type_name: &str)
        -> ProviderResult<()>;

    fn create_topic(
        &mut self,
        participant: ParticipantHandle,
        name: &str,
        type_name: &str,
    ) -> ProviderResult<TopicHandle>;

    fn create_content_filtered_topic(
        &mut self,
        participant: ParticipantHandle,
        name: &str,
        related: TopicHandle,
        filter: &FilterSpec,
    ) -> ProviderResult<TopicHandle>;

    fn create_publisher(
        &mut self,
        participant: ParticipantHandle,
        qos: &PublisherQos,
    ) -> ProviderResult<PublisherHandle>;

    fn create_subscriber(
        &mut self,
        participant: ParticipantHandle,
        qos: &SubscriberQos,
    ) -> ProviderResult<SubscriberHandle>;

    fn create_writer(
        &mut self,
        publisher: PublisherHandle,
        topic: TopicHandle,
        qos: &WriterQos,
    ) -> ProviderResult<WriterHandle>;

    fn create_reader(
        &mut self,
        subscriber: SubscriberHandle,
        topic: TopicHandle,
        qos: &ReaderQos,
    ) -> ProviderResult<ReaderHandle>;

    /// Write a sample. A nil `handle` lets the provider derive it from the key.
    fn write(
        &mut self,
        writer: WriterHandle,
        sample: &ShapeType,
        handle: InstanceHandle,
    ) -> ProviderResult<()>;

    fn unregister_instance(
        &mut self,
        writer: WriterHandle,
        sample: &ShapeType,
        handle: InstanceHandle,
    ) -> ProviderResult<()>;

    fn dispose(
        &mut self,
        writer: WriterHandle,
        sample: &ShapeType,
        handle: InstanceHandle,
    ) -> ProviderResult<()>;

    fn begin_coherent_changes(&mut self, publisher: PublisherHandle) -> ProviderResult<()>;

    fn end_coherent_changes(&mut self, publisher: PublisherHandle) -> ProviderResult<()>;

    fn begin_access(&mut self, subscriber: SubscriberHandle) -> ProviderResult<()>;

    fn end_access(&mut self, subscriber: SubscriberHandle) -> ProviderResult<()>;

    fn take(&mut self, reader: ReaderHandle, max_samples: usize, masks: ReadMasks)
        -> ProviderResult<Loan>;

    fn read(&mut self, reader: ReaderHandle, max_samples: usize, masks: ReadMasks)
        -> ProviderResult<Loan>;

    fn take_next_instance(
        &mut self,
        reader: ReaderHandle,
        previous: InstanceHandle,
        max_samples: usize,
        masks: ReadMasks,
    ) -> ProviderResult<Loan>;

    fn read_next_instance(
        &mut self,
        reader: ReaderHandle,
        previous: InstanceHandle,
        max_samples: usize,
        masks: ReadMasks,
    ) -> ProviderResult<Loan>;

    fn return_loan(&mut self, reader: ReaderHandle, loan: Loan) -> ProviderResult<()>;

    /// Whether [`Provider::get_key_value`] is implemented.
    fn supports_key_lookup(&self) -> bool {
        false
    }

    /// Key fields of the instance behind `handle`.
    fn get_key_value(
        &mut self,
        reader: ReaderHandle,
        handle: InstanceHandle,
    ) -> ProviderResult<ShapeType> {
        let _ = (reader, handle);
        Err(ProviderError::Unsupported("get_key_value"))
    }

    /// Delete every entity created from `participant`, then the participant.
    fn delete_contained_entities(&mut self, participant: ParticipantHandle) -> ProviderResult<()>;
}
