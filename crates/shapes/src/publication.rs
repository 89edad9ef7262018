// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publication loop.
//!
//! ```text
//!   RUNNING --(stop flag | iteration limit)--> STOPPING --> STOPPED
//!      |                                          |
//!      +-- move, [begin], write N x M, [end]      +-- close open set
//!          sleep write period                         unregister | dispose
//! ```
//!
//! State changes only happen between cycles: a coherent set or a fan-out of
//! writes is never cut in half by a stop request.

use crate::config::{FinalInstanceState, ShapeOptions};
use crate::entities::{emit, ShapeEntities};
use crate::error::{Error, Result};
use crate::motion::Motion;
use crate::provider::{InstanceHandle, Provider};
use crate::shape::{ShapeRecord, ShapeType};
use crate::stop::StopFlag;
use std::fmt;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopping,
    Stopped,
}

/// Counters of a finished publication run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicationReport {
    pub cycles: u64,
    pub writes: u64,
    pub write_failures: u64,
    pub unregistered: u64,
    pub disposed: u64,
}

impl fmt::Display for PublicationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cycles, {} writes ({} failed), {} unregistered, {} disposed",
            self.cycles, self.writes, self.write_failures, self.unregistered, self.disposed
        )
    }
}

/// Color of instance `index` for base color `base`: `base`, `base1`, `base2`, ...
pub fn instance_color(base: &str, index: u32) -> String {
    if index == 0 {
        base.to_string()
    } else {
        format!("{}{}", base, index)
    }
}

/// Whether iteration `iteration` opens and/or closes a coherent set of `count` samples.
pub fn coherent_boundaries(iteration: u64, count: u32) -> (bool, bool) {
    let count = u64::from(count.max(1));
    let position = iteration % count;
    (position == 0, position == count - 1)
}

/// Publisher state carried across cycles.
pub struct Publication<'a> {
    options: &'a ShapeOptions,
    base_color: String,
    motion: Motion,
    sample: ShapeType,
    iteration: u64,
    coherent_open: bool,
    state: LoopState,
    report: PublicationReport,
}

impl<'a> Publication<'a> {
    pub fn new(options: &'a ShapeOptions) -> Self {
        let mut rng = match options.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let mut motion = Motion::random(&mut rng, options.width, options.height, options.bounce);
        if let Some(vx) = options.xvel {
            motion.vx = vx;
        }
        if let Some(vy) = options.yvel {
            motion.vy = vy;
        }
        let base_color = options.color.clone().unwrap_or_default();
        let sample = ShapeType::new(base_color.clone(), motion.x, motion.y, options.shapesize)
            .with_payload_size(options.additional_payload_size);
        log::debug!(
            "[publication] start at ({}, {}) velocity ({}, {})",
            motion.x,
            motion.y,
            motion.vx,
            motion.vy
        );
        Self {
            options,
            base_color,
            motion,
            sample,
            iteration: 0,
            coherent_open: false,
            state: LoopState::Running,
            report: PublicationReport::default(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn report(&self) -> &PublicationReport {
        &self.report
    }

    /// Move RUNNING to STOPPING when asked to or when the iteration limit is reached.
    pub fn check_stop(&mut self, stop: &StopFlag) {
        if self.state != LoopState::Running {
            return;
        }
        let limit_reached = self
            .options
            .num_iterations
            .is_some_and(|limit| self.iteration >= limit);
        if stop.is_stopped() || limit_reached {
            log::debug!("[publication] stopping after {} cycles", self.iteration);
            self.state = LoopState::Stopping;
        }
    }

    /// One RUNNING cycle, without the sleep.
    pub fn cycle<P: Provider>(
        &mut self,
        entities: &mut ShapeEntities<P>,
        out: &mut dyn Write,
    ) -> Result<()> {
        self.motion.step(self.sample.shapesize);
        self.sample.x = self.motion.x;
        self.sample.y = self.motion.y;
        if self.options.shapesize == 0 {
            self.grow();
        }

        let grouped = self.options.is_grouped();
        let per_set = self.options.samples_per_coherent_set();
        let (begin, end) = coherent_boundaries(self.iteration, per_set);
        if grouped && begin {
            self.begin_coherent(entities)?;
        }

        for topic_index in 0..entities.writers().len() {
            let writer = entities.writers()[topic_index];
            let (provider, topic) = entities.provider_and_topic(topic_index);
            for index in 0..self.options.num_instances {
                self.sample.color = instance_color(&self.base_color, index);
                self.report.writes += 1;
                match provider.write(writer, &self.sample, InstanceHandle::nil()) {
                    Ok(()) => {
                        if self.options.print_writer_samples {
                            let record = ShapeRecord {
                                topic,
                                shape: &self.sample,
                            };
                            emit(out, format_args!("{}", record));
                        }
                    }
                    Err(e) => {
                        self.report.write_failures += 1;
                        log::error!(
                            "[publication] write of {} on {} failed: {}",
                            self.sample.color,
                            topic,
                            e
                        );
                    }
                }
            }
        }

        if grouped && end {
            self.end_coherent(entities)?;
        }
        self.iteration += 1;
        self.report.cycles = self.iteration;
        Ok(())
    }

    fn grow(&mut self) {
        let mut size = self.sample.shapesize.saturating_add(1);
        if let Some(modulo) = self.options.size_modulo {
            if i64::from(size) > i64::from(modulo) {
                size = 1;
            }
        }
        self.sample.shapesize = size;
    }

    fn begin_coherent<P: Provider>(&mut self, entities: &mut ShapeEntities<P>) -> Result<()> {
        let Some(publisher) = entities.publisher() else {
            return Ok(());
        };
        entities
            .provider_mut()
            .begin_coherent_changes(publisher)
            .map_err(|e| Error::runtime("begin_coherent_changes", e))?;
        self.coherent_open = true;
        Ok(())
    }

    fn end_coherent<P: Provider>(&mut self, entities: &mut ShapeEntities<P>) -> Result<()> {
        let Some(publisher) = entities.publisher() else {
            return Ok(());
        };
        self.coherent_open = false;
        entities
            .provider_mut()
            .end_coherent_changes(publisher)
            .map_err(|e| Error::runtime("end_coherent_changes", e))
    }

    /// STOPPING: close an unfinished coherent set, then apply the final instance state.
    pub fn shutdown<P: Provider>(&mut self, entities: &mut ShapeEntities<P>) -> Result<()> {
        if self.state == LoopState::Stopped {
            return Ok(());
        }
        self.state = LoopState::Stopping;
        if self.coherent_open {
            self.end_coherent(entities)?;
        }

        let dispose = match self.options.final_instance_state {
            FinalInstanceState::None => None,
            FinalInstanceState::Unregister => Some(false),
            FinalInstanceState::Dispose => Some(true),
        };
        if let Some(dispose) = dispose {
            for topic_index in 0..entities.writers().len() {
                let writer = entities.writers()[topic_index];
                for index in 0..self.options.num_instances {
                    let key = ShapeType::key_only(instance_color(&self.base_color, index));
                    let provider = entities.provider_mut();
                    let (op, result) = if dispose {
                        ("dispose", provider.dispose(writer, &key, InstanceHandle::nil()))
                    } else {
                        let result =
                            provider.unregister_instance(writer, &key, InstanceHandle::nil());
                        ("unregister", result)
                    };
                    match result {
                        Ok(()) if dispose => self.report.disposed += 1,
                        Ok(()) => self.report.unregistered += 1,
                        Err(e) => log::error!("[publication] {} of {} failed: {}", op, key.color, e),
                    }
                }
            }
        }
        self.state = LoopState::Stopped;
        Ok(())
    }
}

/// Run the publication loop to completion.
pub fn run<P: Provider>(
    entities: &mut ShapeEntities<P>,
    options: &ShapeOptions,
    stop: &StopFlag,
    out: &mut dyn Write,
) -> Result<PublicationReport> {
    let mut publication = Publication::new(options);
    loop {
        publication.check_stop(stop);
        if publication.state() != LoopState::Running {
            break;
        }
        if let Err(e) = publication.cycle(entities, out) {
            publication.state = LoopState::Stopped;
            return Err(e);
        }
        if !options.write_period.is_zero() {
            spin_sleep::sleep(options.write_period);
        }
    }
    publication.shutdown(entities)?;
    Ok(publication.report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(args: &[&str]) -> ShapeOptions {
        ShapeOptions::parse_from(std::iter::once("shape_main").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_instance_colors() {
        let colors: Vec<String> = (0..3).map(|i| instance_color("GREEN", i)).collect();
        assert_eq!(colors, ["GREEN", "GREEN1", "GREEN2"]);
    }

    #[test]
    fn test_coherent_boundaries_of_four() {
        let begins: Vec<u64> = (0..12).filter(|i| coherent_boundaries(*i, 4).0).collect();
        let ends: Vec<u64> = (0..12).filter(|i| coherent_boundaries(*i, 4).1).collect();
        assert_eq!(begins, [0, 4, 8]);
        assert_eq!(ends, [3, 7, 11]);
    }

    #[test]
    fn test_coherent_set_of_one_opens_and_closes() {
        assert_eq!(coherent_boundaries(0, 1), (true, true));
        assert_eq!(coherent_boundaries(7, 1), (true, true));
    }

    #[test]
    fn test_iteration_limit_stops() {
        let options = options(&["-P", "-t", "T", "--num-iterations", "2"]);
        let stop = StopFlag::new();
        let mut publication = Publication::new(&options);
        publication.check_stop(&stop);
        assert_eq!(publication.state(), LoopState::Running);
        publication.iteration = 2;
        publication.check_stop(&stop);
        assert_eq!(publication.state(), LoopState::Stopping);
    }

    #[test]
    fn test_stop_flag_stops() {
        let options = options(&["-P", "-t", "T"]);
        let stop = StopFlag::new();
        let mut publication = Publication::new(&options);
        stop.stop();
        publication.check_stop(&stop);
        assert_eq!(publication.state(), LoopState::Stopping);
    }

    #[test]
    fn test_auto_grow_wraps() {
        let options = options(&["-P", "-t", "T", "-z", "0", "--size-modulo", "3"]);
        let mut publication = Publication::new(&options);
        let sizes: Vec<i32> = (0..5)
            .map(|_| {
                publication.grow();
                publication.sample.shapesize
            })
            .collect();
        assert_eq!(sizes, [1, 2, 3, 1, 2]);
    }

    #[test]
    fn test_seeded_start_and_velocity_override() {
        let options = options(&["-P", "-t", "T", "--seed", "7", "--xvel", "4", "--yvel", "-2"]);
        let a = Publication::new(&options);
        let b = Publication::new(&options);
        assert_eq!((a.motion.x, a.motion.y), (b.motion.x, b.motion.y));
        assert_eq!((a.motion.vx, a.motion.vy), (4, -2));
        assert_eq!(a.sample.shapesize, 20);
        assert_eq!(a.sample.color, "BLUE");
    }

    #[test]
    fn test_payload_is_attached() {
        let options = options(&["-P", "-t", "T", "--additional-payload-size", "8"]);
        let publication = Publication::new(&options);
        assert_eq!(publication.sample.additional_payload.len(), 8);
        assert_eq!(publication.sample.payload_marker(), Some(255));
    }
}
