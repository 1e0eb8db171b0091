//! One visual token per admitted vote event.

use glam::DVec2;
use pulse_types::StreamEventId;

use crate::color::Color;

/// A particle in the presenter view.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Stream event that spawned this particle.
    pub id: StreamEventId,
    /// Option the vote was for.
    pub option_index: usize,
    /// Fill color.
    pub color: Color,
    /// Position in viewport units.
    pub position: DVec2,
    /// Velocity in units per step.
    pub velocity: DVec2,
    /// Visual radius.
    pub radius: f64,
}

impl Particle {
    /// Radius used for collision, inflated relative to the visual radius.
    pub fn collide_radius(&self, factor: f64, padding: f64) -> f64 {
        self.radius.mul_add(factor, padding)
    }

    /// Whether position and velocity are both finite.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }

    /// Position after applying the current velocity.
    pub fn predicted(&self) -> DVec2 {
        self.position + self.velocity
    }
}
