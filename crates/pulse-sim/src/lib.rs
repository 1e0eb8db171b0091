//! Particle visualization for Pulse.
//!
//! Every counted vote becomes a glowing token that flies in from the edge
//! of the presenter view and settles into a cluster over its option's card.
//! The crate is host-agnostic: anchors come in through [`AnchorResolver`],
//! frames go out through [`Surface`], and the host drives [`Simulation::tick`]
//! from its own frame clock.
// Vector arithmetic on glam types throughout.
#![allow(clippy::arithmetic_side_effects)]

pub mod anchor;
pub mod color;
pub mod forces;
pub mod geometry;
pub mod params;
pub mod particle;
pub mod render;
pub mod simulation;

pub use anchor::{ANCHOR_LIFT, AnchorResolver, GridLayout, RegionAnchors};
pub use color::{Color, DEFAULT_PALETTE};
pub use forces::max_overlap;
pub use geometry::{Region, Viewport};
pub use glam::DVec2;
pub use params::SimulationParams;
pub use particle::Particle;
pub use render::{DrawCall, RecordingSurface, Surface};
pub use simulation::{SimStats, Simulation, TickOutcome};

/// Errors from building or reconfiguring a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Viewport dimensions must be positive and finite.
    #[error("invalid viewport {width}x{height}")]
    InvalidViewport {
        /// Requested width.
        width: f64,
        /// Requested height.
        height: f64,
    },

    /// The palette needs at least one color.
    #[error("palette is empty")]
    EmptyPalette,

    /// A color string was not `#rrggbb`.
    #[error("invalid color {0:?}, expected #rrggbb")]
    InvalidColor(String),

    /// A numeric parameter is out of range.
    #[error("simulation parameter {0} is out of range")]
    InvalidParameter(&'static str),
}
