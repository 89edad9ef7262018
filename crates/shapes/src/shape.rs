// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The `ShapeType` sample exchanged on every topic.

use std::fmt;

/// Registered type name shared by every participant.
pub const SHAPE_TYPE_NAME: &str = "ShapeType";

/// Marker stored in the last byte of the additional payload.
pub const PAYLOAD_MARKER: u8 = 255;

/// One shape sample. `color` is the instance key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShapeType {
    pub color: String,
    pub x: i32,
    pub y: i32,
    pub shapesize: i32,
    pub additional_payload: Vec<u8>,
}

impl ShapeType {
    pub fn new(color: impl Into<String>, x: i32, y: i32, shapesize: i32) -> Self {
        Self {
            color: color.into(),
            x,
            y,
            shapesize,
            additional_payload: Vec::new(),
        }
    }

    /// Sample carrying only the key, used for unregister/dispose and key lookups.
    pub fn key_only(color: impl Into<String>) -> Self {
        Self {
            color: color.into(),
            ..Self::default()
        }
    }

    /// Attach `size` payload bytes; the last one is [`PAYLOAD_MARKER`].
    pub fn with_payload_size(mut self, size: usize) -> Self {
        self.additional_payload = vec![0; size];
        if let Some(last) = self.additional_payload.last_mut() {
            *last = PAYLOAD_MARKER;
        }
        self
    }

    pub fn payload_marker(&self) -> Option<u8> {
        self.additional_payload.last().copied()
    }
}

/// Normalized record line for a shape on `topic`.
///
/// `Square     BLUE       005 113 [30]`, optionally followed by ` {255}`.
pub struct ShapeRecord<'a> {
    pub topic: &'a str,
    pub shape: &'a ShapeType,
}

impl fmt::Display for ShapeRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<10} {:<10} {:03} {:03} [{}]",
            self.topic, self.shape.color, self.shape.x, self.shape.y, self.shape.shapesize
        )?;
        if let Some(marker) = self.shape.payload_marker() {
            write!(f, " {{{}}}", marker)?;
        }
        Ok(())
    }
}
