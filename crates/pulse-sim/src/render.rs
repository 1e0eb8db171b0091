//! Drawing particles onto a host surface.

use glam::DVec2;

use crate::color::Color;
use crate::geometry::Viewport;
use crate::particle::Particle;

/// A 2D drawing target: a canvas, a frame buffer, or a recorder in tests.
pub trait Surface {
    /// Wipe the whole viewport.
    fn clear(&mut self, viewport: Viewport);

    /// Paint a filled disc with a soft glow of `glow` units in the same color.
    fn fill_disc(&mut self, center: DVec2, radius: f64, color: Color, glow: f64);
}

/// Paint one frame. Particles without a finite position are skipped.
///
/// Returns how many discs were drawn.
pub fn paint<S: Surface + ?Sized>(
    surface: &mut S,
    viewport: Viewport,
    particles: &[Particle],
    glow: f64,
) -> usize {
    surface.clear(viewport);
    let mut drawn = 0_usize;
    for particle in particles {
        if !particle.position.is_finite() || !particle.radius.is_finite() {
            continue;
        }
        surface.fill_disc(particle.position, particle.radius, particle.color, glow);
        drawn = drawn.saturating_add(1);
    }
    drawn
}

/// One call made against a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    /// `clear(viewport)`.
    Clear(Viewport),
    /// `fill_disc(center, radius, color, glow)`.
    Disc {
        /// Disc center.
        center: DVec2,
        /// Disc radius.
        radius: f64,
        /// Fill color.
        color: Color,
        /// Glow blur.
        glow: f64,
    },
}

/// Surface that records calls instead of drawing. Used by headless hosts
/// and tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    calls: Vec<DrawCall>,
    frames: usize,
}

impl RecordingSurface {
    /// Empty recorder.
    pub const fn new() -> Self {
        Self {
            calls: Vec::new(),
            frames: 0,
        }
    }

    /// Calls since the last [`take`](Self::take).
    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    /// Drain recorded calls.
    pub fn take(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.calls)
    }

    /// Number of `clear` calls ever received.
    pub const fn frames(&self) -> usize {
        self.frames
    }

    /// Discs in the recorded calls.
    pub fn discs(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, DrawCall::Disc { .. }))
            .count()
    }
}

impl Surface for RecordingSurface {
    fn clear(&mut self, viewport: Viewport) {
        self.frames = self.frames.saturating_add(1);
        self.calls.push(DrawCall::Clear(viewport));
    }

    fn fill_disc(&mut self, center: DVec2, radius: f64, color: Color, glow: f64) {
        self.calls.push(DrawCall::Disc {
            center,
            radius,
            color,
            glow,
        });
    }
}
