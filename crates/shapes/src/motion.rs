// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded shape motion.
//!
//! Each axis moves independently: the velocity is added to the position and,
//! when the result leaves `[half_extent, bound - half_extent]`, the position is
//! clamped to the violated edge and the velocity on that axis is negated.

/// How far from the drawing-area edge a shape bounces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BounceMode {
    /// Keep the whole shape inside the area: `half_extent = 1 + size / 2`.
    #[default]
    Margin,
    /// Bounce on the area edge itself: `half_extent = 0`.
    Edge,
}

impl BounceMode {
    pub fn half_extent(self, shapesize: i32) -> i32 {
        match self {
            BounceMode::Margin => 1 + shapesize / 2,
            BounceMode::Edge => 0,
        }
    }
}

/// Advance one axis by one step. Returns the new `(position, velocity)`.
pub fn advance(position: i32, velocity: i32, half_extent: i32, bound: i32) -> (i32, i32) {
    let next = position.saturating_add(velocity);
    if next < half_extent {
        (half_extent, velocity.saturating_neg())
    } else if next > bound - half_extent {
        (bound - half_extent, velocity.saturating_neg())
    } else {
        (next, velocity)
    }
}

/// Position and velocity of the shape driven by a publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Motion {
    pub x: i32,
    pub y: i32,
    pub vx: i32,
    pub vy: i32,
    width: i32,
    height: i32,
    mode: BounceMode,
}

impl Motion {
    pub fn new(
        x: i32,
        y: i32,
        vx: i32,
        vy: i32,
        width: i32,
        height: i32,
        mode: BounceMode,
    ) -> Self {
        Self {
            x,
            y,
            vx,
            vy,
            width,
            height,
            mode,
        }
    }

    /// Random start inside `width` x `height` with each velocity component in `±(1..=5)`.
    pub fn random(rng: &mut fastrand::Rng, width: i32, height: i32, mode: BounceMode) -> Self {
        let x = rng.i32(0..width.max(1));
        let y = rng.i32(0..height.max(1));
        let vx = random_velocity(rng);
        let vy = random_velocity(rng);
        Self::new(x, y, vx, vy, width, height, mode)
    }

    /// Move one step for a shape of `shapesize`.
    pub fn step(&mut self, shapesize: i32) {
        let half = self.mode.half_extent(shapesize);
        (self.x, self.vx) = advance(self.x, self.vx, half, self.width);
        (self.y, self.vy) = advance(self.y, self.vy, half, self.height);
    }
}

fn random_velocity(rng: &mut fastrand::Rng) -> i32 {
    let speed = rng.i32(1..=5);
    if rng.bool() {
        speed
    } else {
        -speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_inside_bounds() {
        assert_eq!(advance(100, 3, 11, 240), (103, 3));
        assert_eq!(advance(100, -3, 11, 240), (97, -3));
    }

    #[test]
    fn test_advance_bounces_low_edge() {
        assert_eq!(advance(12, -4, 11, 240), (11, 4));
    }

    #[test]
    fn test_advance_bounces_high_edge() {
        assert_eq!(advance(227, 5, 11, 240), (229, -5));
    }

    #[test]
    fn test_extreme_velocity_still_bounces() {
        assert_eq!(advance(5, i32::MIN, 11, 240), (11, i32::MAX));
        assert_eq!(advance(200, i32::MAX, 11, 240), (229, -i32::MAX));
    }

    #[test]
    fn test_edge_mode_clamps_to_area() {
        let half = BounceMode::Edge.half_extent(30);
        assert_eq!(advance(2, -5, half, 240), (0, 5));
        assert_eq!(advance(238, 5, half, 240), (240, -5));
    }

    #[test]
    fn test_margin_half_extent() {
        assert_eq!(BounceMode::Margin.half_extent(20), 11);
        assert_eq!(BounceMode::Margin.half_extent(0), 1);
        assert_eq!(BounceMode::Margin.half_extent(31), 16);
    }

    #[test]
    fn test_position_stays_in_range() {
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..200 {
            let size = rng.i32(0..60);
            let half = BounceMode::Margin.half_extent(size);
            let mut pos = rng.i32(half..=240 - half);
            let mut vel = rng.i32(-9..=9);
            for _ in 0..500 {
                (pos, vel) = advance(pos, vel, half, 240);
                assert!(pos >= half && pos <= 240 - half, "pos {} half {}", pos, half);
            }
        }
    }

    #[test]
    fn test_bounce_flips_only_crossing_axis() {
        let mut motion = Motion::new(230, 100, 5, 2, 240, 270, BounceMode::Margin);
        motion.step(20);
        assert_eq!((motion.x, motion.vx), (229, -5));
        assert_eq!((motion.y, motion.vy), (102, 2));
    }

    #[test]
    fn test_random_start_is_seeded() {
        let a = Motion::random(&mut fastrand::Rng::with_seed(42), 240, 270, BounceMode::Margin);
        let b = Motion::random(&mut fastrand::Rng::with_seed(42), 240, 270, BounceMode::Margin);
        assert_eq!(a, b);
        assert!((0..240).contains(&a.x));
        assert!((0..270).contains(&a.y));
        assert!((1..=5).contains(&a.vx.abs()));
        assert!((1..=5).contains(&a.vy.abs()));
    }
}
