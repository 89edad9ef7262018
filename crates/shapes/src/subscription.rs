// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscription loop.
//!
//! Every cycle drains each reader until the provider reports no data, either
//! one instance at a time (next-instance cursor) or everything at once (bulk).
//! Samples with valid data are printed as shape records; samples without data
//! are instance lifecycle notifications and are printed with their state:
//!
//! ```text
//! Square     BLUE       082 111 [20]
//! Square BLUE NOT_ALIVE_DISPOSED
//! ```
//!
//! Lifecycle samples carry no key, so the color is looked up through the
//! provider when it can, or from the colors already seen for that handle.

use crate::config::ShapeOptions;
use crate::entities::{emit, ShapeEntities};
use crate::error::{Error, Result};
use crate::provider::{
    InstanceHandle, Loan, Provider, ReadMasks, ReaderHandle, LENGTH_UNLIMITED,
};
use crate::shape::ShapeRecord;
use crate::stop::StopFlag;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;

/// Color printed when a lifecycle sample's key cannot be recovered.
pub const UNKNOWN_COLOR: &str = "UNKNOWN";

/// Counters of a finished subscription run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionReport {
    pub cycles: u64,
    pub samples: u64,
    pub lifecycle_events: u64,
    pub read_failures: u64,
}

impl fmt::Display for SubscriptionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cycles, {} samples, {} lifecycle events, {} failed reads",
            self.cycles, self.samples, self.lifecycle_events, self.read_failures
        )
    }
}

/// Subscriber state carried across cycles.
pub struct Subscription<'a> {
    options: &'a ShapeOptions,
    /// Last color seen per instance handle.
    colors: HashMap<InstanceHandle, String>,
    /// Next-instance cursor per topic index.
    cursors: Vec<InstanceHandle>,
    report: SubscriptionReport,
}

impl<'a> Subscription<'a> {
    pub fn new(options: &'a ShapeOptions) -> Self {
        Self {
            options,
            colors: HashMap::new(),
            cursors: Vec::new(),
            report: SubscriptionReport::default(),
        }
    }

    pub fn report(&self) -> &SubscriptionReport {
        &self.report
    }

    fn masks(&self) -> ReadMasks {
        if self.options.use_read {
            ReadMasks::NOT_READ
        } else {
            ReadMasks::ANY
        }
    }

    /// One read cycle over every topic, without the sleep.
    pub fn cycle<P: Provider>(
        &mut self,
        entities: &mut ShapeEntities<P>,
        out: &mut dyn Write,
    ) -> Result<()> {
        let grouped = self.options.is_grouped();
        let subscriber = entities.subscriber();
        if let (true, Some(subscriber)) = (grouped, subscriber) {
            entities
                .provider_mut()
                .begin_access(subscriber)
                .map_err(|e| Error::runtime("begin_access", e))?;
        }

        let topics = entities.readers().len();
        self.cursors.resize(topics, InstanceHandle::nil());
        for index in 0..topics {
            self.cursors[index] = InstanceHandle::nil();
            self.drain(entities, index, out)?;
        }

        if let (true, Some(subscriber)) = (grouped, subscriber) {
            entities
                .provider_mut()
                .end_access(subscriber)
                .map_err(|e| Error::runtime("end_access", e))?;
        }
        self.report.cycles += 1;
        Ok(())
    }

    fn drain<P: Provider>(
        &mut self,
        entities: &mut ShapeEntities<P>,
        index: usize,
        out: &mut dyn Write,
    ) -> Result<()> {
        let reader = entities.readers()[index];
        let masks = self.masks();
        let next_instance = self.options.use_next_instance;
        loop {
            let provider = entities.provider_mut();
            let previous = self.cursors[index];
            let max = LENGTH_UNLIMITED;
            let result = match (next_instance, self.options.use_read) {
                (true, false) => provider.take_next_instance(reader, previous, max, masks),
                (true, true) => provider.read_next_instance(reader, previous, max, masks),
                (false, false) => provider.take(reader, max, masks),
                (false, true) => provider.read(reader, max, masks),
            };
            let loan = match result {
                Ok(loan) => loan,
                Err(e) if e.is_no_data() => return Ok(()),
                Err(e) => {
                    self.report.read_failures += 1;
                    let topic = &entities.topic_names()[index];
                    if next_instance {
                        log::error!(
                            "[subscription] read on {} failed, topic skipped: {}",
                            topic,
                            e
                        );
                    } else {
                        log::error!("[subscription] read on {} failed: {}", topic, e);
                    }
                    return Ok(());
                }
            };

            self.print_loan(entities, index, &loan, out);
            if let Some(last) = loan.last_instance_handle() {
                self.cursors[index] = last;
            }
            entities
                .provider_mut()
                .return_loan(reader, loan)
                .map_err(|e| Error::runtime("return_loan", e))?;
        }
    }

    fn print_loan<P: Provider>(
        &mut self,
        entities: &mut ShapeEntities<P>,
        index: usize,
        loan: &Loan,
        out: &mut dyn Write,
    ) {
        let reader = entities.readers()[index];
        // Next-instance mode shows only the most recent valid sample of the instance.
        let shown = if self.options.use_next_instance {
            loan.infos().iter().rposition(|info| info.valid_data)
        } else {
            None
        };

        for (position, (sample, info)) in loan.iter().enumerate() {
            if info.valid_data {
                self.colors.insert(info.instance_handle, sample.color.clone());
                if !self.options.use_next_instance || shown == Some(position) {
                    self.report.samples += 1;
                    let topic = entities.topic_names()[index].as_str();
                    emit(out, format_args!("{}", ShapeRecord { topic, shape: sample }));
                }
            } else {
                let color = self.resolve_color(entities, reader, info.instance_handle);
                self.report.lifecycle_events += 1;
                let topic = &entities.topic_names()[index];
                emit(out, format_args!("{} {} {}", topic, color, info.instance_state));
            }
        }
    }

    fn resolve_color<P: Provider>(
        &self,
        entities: &mut ShapeEntities<P>,
        reader: ReaderHandle,
        handle: InstanceHandle,
    ) -> String {
        let provider = entities.provider_mut();
        if provider.supports_key_lookup() {
            match provider.get_key_value(reader, handle) {
                Ok(key) => return key.color,
                Err(e) => log::debug!("[subscription] get_key_value({:?}) failed: {}", handle, e),
            }
        }
        self.colors
            .get(&handle)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_COLOR.to_string())
    }
}

/// Run the subscription loop until stopped or the iteration limit is reached.
pub fn run<P: Provider>(
    entities: &mut ShapeEntities<P>,
    options: &ShapeOptions,
    stop: &StopFlag,
    out: &mut dyn Write,
) -> Result<SubscriptionReport> {
    let mut subscription = Subscription::new(options);
    loop {
        if stop.is_stopped() {
            break;
        }
        if let Some(limit) = options.num_iterations {
            if subscription.report.cycles >= limit {
                break;
            }
        }
        subscription.cycle(entities, out)?;
        if !options.read_period.is_zero() {
            spin_sleep::sleep(options.read_period);
        }
    }
    log::debug!("[subscription] stopped after {} cycles", subscription.report.cycles);
    Ok(subscription.report)
}
