// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Entity fan-out: one participant, N topics, one publisher or subscriber and
//! one writer or reader per topic.
//!
//! Handles are kept in index-aligned vectors: `topics[i]`, `writers[i]` /
//! `readers[i]` and `filtered_topics[i]` all belong to topic `i`.
//!
//! Nothing is rolled back entity by entity. Whatever was created, including
//! after a failed [`ShapeEntities::initialize`], is released with a single
//! `delete_contained_entities` on the participant.

use crate::config::{Role, ShapeOptions};
use crate::error::{Error, Result};
use crate::provider::{
    EntityListener, ParticipantHandle, Provider, PublisherHandle, ReaderHandle, SubscriberHandle,
    TopicHandle, WriterHandle,
};
use crate::shape::SHAPE_TYPE_NAME;
use std::io::Write;
use std::sync::Arc;

/// Name of topic `index` for base name `base`: `base`, `base1`, `base2`, ...
pub fn topic_name(base: &str, index: u32) -> String {
    if index == 0 {
        base.to_string()
    } else {
        format!("{}{}", base, index)
    }
}

/// Name of the content-filtered topic built over `topic`.
pub fn filtered_topic_name(topic: &str) -> String {
    format!("{}_filtered", topic)
}

/// Entities of one run, owned for the whole process lifetime.
pub struct ShapeEntities<P: Provider> {
    provider: P,
    participant: ParticipantHandle,
    topic_names: Vec<String>,
    topics: Vec<TopicHandle>,
    filtered_topics: Vec<Option<TopicHandle>>,
    publisher: Option<PublisherHandle>,
    subscriber: Option<SubscriberHandle>,
    writers: Vec<WriterHandle>,
    readers: Vec<ReaderHandle>,
    deleted: bool,
}

impl<P: Provider> ShapeEntities<P> {
    /// Create every entity `options` asks for, printing one line per topic and
    /// endpoint to `out`.
    pub fn initialize(
        mut provider: P,
        options: &ShapeOptions,
        listener: Option<Arc<dyn EntityListener>>,
        out: &mut dyn Write,
    ) -> Result<Self> {
        let participant = provider
            .create_participant(options.domain_id, listener)
            .map_err(|e| Error::init("participant", e))?;
        log::debug!(
            "[entities] participant {:?} on domain {}",
            participant,
            options.domain_id
        );

        let mut entities = Self {
            provider,
            participant,
            topic_names: Vec::new(),
            topics: Vec::new(),
            filtered_topics: Vec::new(),
            publisher: None,
            subscriber: None,
            writers: Vec::new(),
            readers: Vec::new(),
            deleted: false,
        };
        entities.create_topics(options, out)?;
        match options.role {
            Role::Publish => entities.create_writers(options, out)?,
            Role::Subscribe => entities.create_readers(options, out)?,
        }
        Ok(entities)
    }

    fn create_topics(&mut self, options: &ShapeOptions, out: &mut dyn Write) -> Result<()> {
        self.provider
            .register_type(self.participant, SHAPE_TYPE_NAME)
            .map_err(|e| Error::init("type registration", e))?;

        for index in 0..options.num_topics {
            let name = topic_name(&options.topic_name, index);
            emit(out, format_args!("Create topic: {}", name));
            let topic = self
                .provider
                .create_topic(self.participant, &name, SHAPE_TYPE_NAME)
                .map_err(|e| Error::init("topic", e))?;
            self.topics.push(topic);
            self.topic_names.push(name);
        }
        Ok(())
    }

    fn create_writers(&mut self, options: &ShapeOptions, out: &mut dyn Write) -> Result<()> {
        let publisher = self
            .provider
            .create_publisher(self.participant, &options.publisher_qos())
            .map_err(|e| Error::init("publisher", e))?;
        self.publisher = Some(publisher);

        let qos = options.writer_qos();
        let color = options.color.as_deref().unwrap_or_default();
        for (name, topic) in self.topic_names.iter().zip(&self.topics) {
            emit(
                out,
                format_args!("Create writer for topic: {} color: {}", name, color),
            );
            let writer = self
                .provider
                .create_writer(publisher, *topic, &qos)
                .map_err(|e| Error::init("writer", e))?;
            self.writers.push(writer);
        }
        Ok(())
    }

    fn create_readers(&mut self, options: &ShapeOptions, out: &mut dyn Write) -> Result<()> {
        let subscriber = self
            .provider
            .create_subscriber(self.participant, &options.subscriber_qos())
            .map_err(|e| Error::init("subscriber", e))?;
        self.subscriber = Some(subscriber);

        let qos = options.reader_qos();
        let filter = options.subscriber_filter();
        for (name, topic) in self.topic_names.iter().zip(&self.topics) {
            let target = match &filter {
                Some(spec) => {
                    let filtered = self
                        .provider
                        .create_content_filtered_topic(
                            self.participant,
                            &filtered_topic_name(name),
                            *topic,
                            spec,
                        )
                        .map_err(|e| Error::init("content filtered topic", e))?;
                    self.filtered_topics.push(Some(filtered));
                    filtered
                }
                None => {
                    self.filtered_topics.push(None);
                    *topic
                }
            };

            match &options.color {
                Some(color) if filter.is_some() => emit(
                    out,
                    format_args!("Create reader for topic: {} color: {}", name, color),
                ),
                _ => emit(out, format_args!("Create reader for topic: {}", name)),
            }
            let reader = self
                .provider
                .create_reader(subscriber, target, &qos)
                .map_err(|e| Error::init("reader", e))?;
            self.readers.push(reader);
        }
        Ok(())
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn participant(&self) -> ParticipantHandle {
        self.participant
    }

    pub fn topic_names(&self) -> &[String] {
        &self.topic_names
    }

    /// Filtered topic per topic index, `None` where the reader is unfiltered.
    pub fn filtered_topics(&self) -> &[Option<TopicHandle>] {
        &self.filtered_topics
    }

    pub fn publisher(&self) -> Option<PublisherHandle> {
        self.publisher
    }

    pub fn subscriber(&self) -> Option<SubscriberHandle> {
        self.subscriber
    }

    /// Provider and name of topic `index`, borrowed together.
    pub fn provider_and_topic(&mut self, index: usize) -> (&mut P, &str) {
        (&mut self.provider, &self.topic_names[index])
    }

    pub fn writers(&self) -> &[WriterHandle] {
        &self.writers
    }

    pub fn readers(&self) -> &[ReaderHandle] {
        &self.readers
    }

    /// Delete everything through the participant. Runs at most once.
    pub fn teardown(&mut self) {
        if self.deleted {
            return;
        }
        self.deleted = true;
        match self.provider.delete_contained_entities(self.participant) {
            Ok(()) => log::debug!("[entities] participant {:?} deleted", self.participant),
            Err(e) => log::error!("[entities] delete_contained_entities failed: {}", e),
        }
    }
}

impl<P: Provider> Drop for ShapeEntities<P> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Write one protocol line to `out`.
pub(crate) fn emit(out: &mut dyn Write, line: std::fmt::Arguments<'_>) {
    if let Err(e) = writeln!(out, "{}", line) {
        log::warn!("[shapes] failed to write output: {}", e);
    }
}
