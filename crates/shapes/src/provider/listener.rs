// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Entity status callbacks.
//!
//! A single [`EntityListener`] is attached to the participant and receives
//! the statuses of every contained entity. All methods default to no-ops, so
//! implementors only override what they care about.
//!
//! [`ConsoleListener`] prints the diagnostic subset that interoperability
//! harnesses look for on stdout, e.g.
//!
//! ```text
//! on_publication_matched() topic: 'Square'  type: 'ShapeType' : matched readers 1 (change = 1)
//! ```

use super::InstanceHandle;
use crate::qos::QosPolicyId;

/// Topic an event relates to.
#[derive(Debug, Clone, Copy)]
pub struct TopicInfo<'a> {
    pub topic_name: &'a str,
    pub type_name: &'a str,
}

/// A topic with the same name but a different type was discovered.
#[derive(Debug, Clone, Default)]
pub struct InconsistentTopicStatus {
    pub total_count: u32,
    pub total_count_change: i32,
}

/// A writer/reader pair failed RxO matching.
#[derive(Debug, Clone)]
pub struct IncompatibleQosStatus {
    pub total_count: u32,
    pub total_count_change: i32,
    pub last_policy: QosPolicyId,
}

/// Matching counters, from the writer side.
#[derive(Debug, Clone, Default)]
pub struct PublicationMatchedStatus {
    pub total_count: u32,
    pub total_count_change: i32,
    pub current_count: u32,
    pub current_count_change: i32,
}

/// Matching counters, from the reader side.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionMatchedStatus {
    pub total_count: u32,
    pub total_count_change: i32,
    pub current_count: u32,
    pub current_count_change: i32,
}

/// A deadline period elapsed without an update of an instance.
#[derive(Debug, Clone, Default)]
pub struct DeadlineMissedStatus {
    pub total_count: u32,
    pub total_count_change: i32,
    pub last_instance_handle: InstanceHandle,
}

/// Liveliness of matched writers changed, from the reader side.
#[derive(Debug, Clone, Default)]
pub struct LivelinessChangedStatus {
    pub alive_count: u32,
    pub alive_count_change: i32,
    pub not_alive_count: u32,
    pub not_alive_count_change: i32,
}

/// Status observer for a participant and everything it contains.
///
/// Callbacks run on the thread that made the provider call which produced the
/// event, after the provider released its internal locks.
pub trait EntityListener: Send + Sync {
    fn on_inconsistent_topic(&self, topic: TopicInfo<'_>, status: &InconsistentTopicStatus) {
        let _ = (topic, status);
    }

    fn on_offered_incompatible_qos(&self, topic: TopicInfo<'_>, status: &IncompatibleQosStatus) {
        let _ = (topic, status);
    }

    fn on_requested_incompatible_qos(&self, topic: TopicInfo<'_>, status: &IncompatibleQosStatus) {
        let _ = (topic, status);
    }

    fn on_publication_matched(&self, topic: TopicInfo<'_>, status: &PublicationMatchedStatus) {
        let _ = (topic, status);
    }

    fn on_subscription_matched(&self, topic: TopicInfo<'_>, status: &SubscriptionMatchedStatus) {
        let _ = (topic, status);
    }

    fn on_offered_deadline_missed(&self, topic: TopicInfo<'_>, status: &DeadlineMissedStatus) {
        let _ = (topic, status);
    }

    fn on_requested_deadline_missed(&self, topic: TopicInfo<'_>, status: &DeadlineMissedStatus) {
        let _ = (topic, status);
    }

    fn on_liveliness_changed(&self, topic: TopicInfo<'_>, status: &LivelinessChangedStatus) {
        let _ = (topic, status);
    }

    fn on_data_available(&self, topic: TopicInfo<'_>) {
        let _ = topic;
    }
}

/// Prints diagnostic callbacks to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleListener;

impl EntityListener for ConsoleListener {
    fn on_inconsistent_topic(&self, topic: TopicInfo<'_>, status: &InconsistentTopicStatus) {
        println!(
            "{} : {} {}",
            prefix("on_inconsistent_topic", topic),
            status.total_count,
            status.total_count_change
        );
    }

    fn on_offered_incompatible_qos(&self, topic: TopicInfo<'_>, status: &IncompatibleQosStatus) {
        println!("{}", incompatible_qos_line("on_offered_incompatible_qos", topic, status));
    }

    fn on_requested_incompatible_qos(&self, topic: TopicInfo<'_>, status: &IncompatibleQosStatus) {
        println!("{}", incompatible_qos_line("on_requested_incompatible_qos", topic, status));
    }

    fn on_publication_matched(&self, topic: TopicInfo<'_>, status: &PublicationMatchedStatus) {
        println!(
            "{} : matched readers {} (change = {})",
            prefix("on_publication_matched", topic),
            status.current_count,
            status.current_count_change
        );
    }

    fn on_subscription_matched(&self, topic: TopicInfo<'_>, status: &SubscriptionMatchedStatus) {
        println!(
            "{} : matched writers {} (change = {})",
            prefix("on_subscription_matched", topic),
            status.current_count,
            status.current_count_change
        );
    }

    fn on_offered_deadline_missed(&self, topic: TopicInfo<'_>, status: &DeadlineMissedStatus) {
        println!("{}", deadline_line("on_offered_deadline_missed", topic, status));
    }

    fn on_requested_deadline_missed(&self, topic: TopicInfo<'_>, status: &DeadlineMissedStatus) {
        println!("{}", deadline_line("on_requested_deadline_missed", topic, status));
    }

    fn on_liveliness_changed(&self, topic: TopicInfo<'_>, status: &LivelinessChangedStatus) {
        println!(
            "{} : (alive = {}, not_alive = {})",
            prefix("on_liveliness_changed", topic),
            status.alive_count,
            status.not_alive_count
        );
    }
}

fn prefix(callback: &str, topic: TopicInfo<'_>) -> String {
    format!(
        "{}() topic: '{}'  type: '{}'",
        callback, topic.topic_name, topic.type_name
    )
}

fn incompatible_qos_line(
    callback: &str,
    topic: TopicInfo<'_>,
    status: &IncompatibleQosStatus,
) -> String {
    format!(
        "{} : {} ({})",
        prefix(callback, topic),
        status.total_count,
        status.last_policy
    )
}

fn deadline_line(callback: &str, topic: TopicInfo<'_>, status: &DeadlineMissedStatus) -> String {
    format!(
        "{} : (total = {}, change = {})",
        prefix(callback, topic),
        status.total_count,
        status.total_count_change
    )
}
