//! Simulation parameters.
//!
//! Defaults reproduce the presenter view's force layout: a long, gentle
//! cool-down, heavy damping so tokens stay inside their option cards, and a
//! collision radius inflated so that a cluster of about fifty tokens fills
//! one card.

use serde::{Deserialize, Serialize};

use crate::SimError;
use crate::color::{Color, DEFAULT_PALETTE};

/// Tunable constants of the particle simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    /// Fraction of the gap to `alpha_target` closed each step.
    pub alpha_decay: f64,
    /// Below this temperature integration sleeps.
    pub alpha_min: f64,
    /// Temperature the simulation cools towards.
    pub alpha_target: f64,
    /// Temperature set by every spawn.
    pub spawn_alpha: f64,
    /// Minimum temperature after an anchor moved.
    pub reheat_alpha: f64,
    /// Anchor displacement (units) that triggers a reheat.
    pub reheat_distance: f64,
    /// Fraction of velocity removed each step.
    pub velocity_decay: f64,
    /// Collision radius is `radius * collide_radius_factor + collide_radius_padding`.
    pub collide_radius_factor: f64,
    /// See `collide_radius_factor`.
    pub collide_radius_padding: f64,
    /// Collision relaxation passes per step.
    pub collide_iterations: u32,
    /// Share of the overlap corrected per pass.
    pub collide_strength: f64,
    /// Pull towards the anchor, per axis, scaled by temperature.
    pub target_strength: f64,
    /// Distance outside the viewport edge at which particles spawn.
    pub spawn_margin: f64,
    /// Spawn velocity is uniform in `±spawn_speed / 2` per axis.
    pub spawn_speed: f64,
    /// Smallest particle radius (inclusive).
    pub radius_min: f64,
    /// Largest particle radius (exclusive).
    pub radius_max: f64,
    /// Glow (shadow blur) painted around each particle.
    pub glow_blur: f64,
    /// Colors by option index, wrapping around.
    pub palette: Vec<Color>,
    /// Seed for spawn randomness. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Cap on live particles; the oldest are evicted first. `None` is
    /// unbounded.
    pub max_particles: Option<usize>,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            alpha_decay: 0.005,
            alpha_min: 0.001,
            alpha_target: 0.0,
            spawn_alpha: 0.8,
            reheat_alpha: 0.3,
            reheat_distance: 0.5,
            velocity_decay: 0.18,
            collide_radius_factor: 1.8,
            collide_radius_padding: 2.0,
            collide_iterations: 4,
            collide_strength: 1.0,
            target_strength: 0.1,
            spawn_margin: 100.0,
            spawn_speed: 50.0,
            radius_min: 8.0,
            radius_max: 12.0,
            glow_blur: 15.0,
            palette: DEFAULT_PALETTE.to_vec(),
            seed: None,
            max_particles: None,
        }
    }
}

impl SimulationParams {
    /// Check that every parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::EmptyPalette`] or [`SimError::InvalidParameter`]
    /// naming the first offending field.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.palette.is_empty() {
            return Err(SimError::EmptyPalette);
        }
        let unit_interval = [
            ("alpha_decay", self.alpha_decay),
            ("alpha_target", self.alpha_target),
            ("spawn_alpha", self.spawn_alpha),
            ("reheat_alpha", self.reheat_alpha),
            ("velocity_decay", self.velocity_decay),
            ("collide_strength", self.collide_strength),
        ];
        for (name, value) in unit_interval {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimError::InvalidParameter(name));
            }
        }
        let non_negative = [
            ("alpha_min", self.alpha_min),
            ("reheat_distance", self.reheat_distance),
            ("collide_radius_factor", self.collide_radius_factor),
            ("collide_radius_padding", self.collide_radius_padding),
            ("target_strength", self.target_strength),
            ("spawn_margin", self.spawn_margin),
            ("spawn_speed", self.spawn_speed),
            ("glow_blur", self.glow_blur),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::InvalidParameter(name));
            }
        }
        if !self.radius_min.is_finite()
            || !self.radius_max.is_finite()
            || self.radius_min <= 0.0
            || self.radius_max <= self.radius_min
        {
            return Err(SimError::InvalidParameter("radius_min"));
        }
        if self.collide_iterations == 0 {
            return Err(SimError::InvalidParameter("collide_iterations"));
        }
        if self.max_particles == Some(0) {
            return Err(SimError::InvalidParameter("max_particles"));
        }
        Ok(())
    }

    /// Color for `option_index`.
    pub fn color_for(&self, option_index: usize) -> Color {
        option_index
            .checked_rem(self.palette.len())
            .and_then(|i| self.palette.get(i))
            .copied()
            .unwrap_or(Color::WHITE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SimulationParams::default().validate().is_ok());
    }

    #[test]
    fn colors_wrap_around_palette() {
        let params = SimulationParams::default();
        assert_eq!(params.color_for(0), DEFAULT_PALETTE[0]);
        assert_eq!(params.color_for(7), DEFAULT_PALETTE[1]);
        let empty = SimulationParams {
            palette: Vec::new(),
            ..SimulationParams::default()
        };
        assert_eq!(empty.color_for(3), Color::WHITE);
    }

    #[test]
    fn invalid_values_are_named() {
        let bad = SimulationParams {
            velocity_decay: 1.5,
            ..SimulationParams::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(SimError::InvalidParameter("velocity_decay"))
        ));
        let bad = SimulationParams {
            radius_max: 4.0,
            ..SimulationParams::default()
        };
        assert!(bad.validate().is_err());
    }
}
