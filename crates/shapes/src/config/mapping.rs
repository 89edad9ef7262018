// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Options -> entity QoS.

use super::ShapeOptions;
use crate::qos::{
    Partition, Presentation, PublisherQos, ReaderQos, SubscriberQos, WriterDataLifecycle,
    WriterQos,
};

impl ShapeOptions {
    fn partition(&self) -> Partition {
        match &self.partition {
            Some(name) => Partition::single(name),
            None => Partition::default(),
        }
    }

    fn presentation(&self) -> Presentation {
        Presentation {
            access_scope: self.access_scope,
            coherent_access: self.coherent,
            ordered_access: self.ordered,
        }
    }

    pub fn publisher_qos(&self) -> PublisherQos {
        PublisherQos {
            partition: self.partition(),
            presentation: self.presentation(),
        }
    }

    pub fn subscriber_qos(&self) -> SubscriberQos {
        SubscriberQos {
            partition: self.partition(),
            presentation: self.presentation(),
        }
    }

    /// Writer QoS. Instances are not auto-disposed on unregister so readers
    /// observe NOT_ALIVE_NO_WRITERS.
    pub fn writer_qos(&self) -> WriterQos {
        let mut qos = WriterQos {
            reliability: self.reliability,
            durability: self.durability,
            ownership: self.ownership,
            deadline: self.deadline,
            lifespan: self.lifespan,
            representation: self.representation,
            writer_data_lifecycle: WriterDataLifecycle {
                autodispose_unregistered_instances: false,
            },
            ..WriterQos::default()
        };
        if let Some(history) = self.history {
            qos.history = history;
        }
        qos
    }

    pub fn reader_qos(&self) -> ReaderQos {
        let mut qos = ReaderQos {
            reliability: self.reliability,
            durability: self.durability,
            ownership: self.ownership.kind,
            deadline: self.deadline,
            time_based_filter: self.time_based_filter,
            representation: self.representation,
            ..ReaderQos::default()
        };
        if let Some(history) = self.history {
            qos.history = history;
        }
        qos
    }
}
