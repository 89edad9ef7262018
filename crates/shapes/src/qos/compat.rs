// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Requested-vs-offered (RxO) compatibility between a writer and a reader.

use super::{PublisherQos, ReaderQos, SubscriberQos, WriterQos};
use std::fmt;

/// Policy reported in incompatible-QoS notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QosPolicyId {
    Reliability,
    Durability,
    Presentation,
    Deadline,
    Ownership,
    DataRepresentation,
}

impl QosPolicyId {
    pub fn name(self) -> &'static str {
        match self {
            QosPolicyId::Reliability => "RELIABILITY",
            QosPolicyId::Durability => "DURABILITY",
            QosPolicyId::Presentation => "PRESENTATION",
            QosPolicyId::Deadline => "DEADLINE",
            QosPolicyId::Ownership => "OWNERSHIP",
            QosPolicyId::DataRepresentation => "DATA_REPRESENTATION",
        }
    }
}

impl fmt::Display for QosPolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Check a writer/reader pair. Returns the first violated policy.
///
/// Rules (offered vs requested):
/// - reliability and durability: offered kind >= requested kind
/// - presentation: offered scope >= requested, coherent/ordered offered if requested
/// - deadline: offered period <= requested period (infinite requested accepts anything)
/// - ownership: kinds equal
/// - data representation: equal
pub fn check_compatibility(
    publisher: &PublisherQos,
    writer: &WriterQos,
    subscriber: &SubscriberQos,
    reader: &ReaderQos,
) -> Result<(), QosPolicyId> {
    if writer.reliability < reader.reliability {
        return Err(QosPolicyId::Reliability);
    }
    if writer.durability < reader.durability {
        return Err(QosPolicyId::Durability);
    }
    if !publisher
        .presentation
        .is_compatible_with(&subscriber.presentation)
    {
        return Err(QosPolicyId::Presentation);
    }
    match (writer.deadline, reader.deadline) {
        (_, None) => {}
        (None, Some(_)) => return Err(QosPolicyId::Deadline),
        (Some(offered), Some(requested)) if offered > requested => {
            return Err(QosPolicyId::Deadline)
        }
        _ => {}
    }
    if writer.ownership.kind != reader.ownership {
        return Err(QosPolicyId::Ownership);
    }
    if writer.representation != reader.representation {
        return Err(QosPolicyId::DataRepresentation);
    }
    Ok(())
}
