//! Viewport and card regions in presentation units.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::SimError;

/// Size of the presentation surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in units.
    pub width: f64,
    /// Height in units.
    pub height: f64,
}

impl Viewport {
    /// Build a viewport with positive, finite dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidViewport`] otherwise.
    pub fn new(width: f64, height: f64) -> Result<Self, SimError> {
        let viewport = Self { width, height };
        viewport.validate()?;
        Ok(viewport)
    }

    /// Reject zero, negative, or non-finite dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidViewport`].
    pub fn validate(&self) -> Result<(), SimError> {
        let ok = |v: f64| v.is_finite() && v > 0.0;
        if ok(self.width) && ok(self.height) {
            Ok(())
        } else {
            Err(SimError::InvalidViewport {
                width: self.width,
                height: self.height,
            })
        }
    }

    /// Center point.
    pub fn center(&self) -> DVec2 {
        DVec2::new(self.width, self.height) * 0.5
    }

    /// Size as a vector.
    pub const fn size(&self) -> DVec2 {
        DVec2::new(self.width, self.height)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// An axis-aligned rectangle, typically an option card.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Region {
    /// Construct from top-left corner and size.
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center point.
    pub fn center(&self) -> DVec2 {
        DVec2::new(self.x, self.y) + DVec2::new(self.width, self.height) * 0.5
    }

    /// Whether every coordinate is finite and the size is non-negative.
    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width >= 0.0
            && self.height >= 0.0
    }

    /// Whether `point` lies inside (edges inclusive).
    pub fn contains(&self, point: DVec2) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && point.x <= self.x + self.width
            && point.y <= self.y + self.height
    }
}
