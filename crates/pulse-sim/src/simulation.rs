//! The particle simulation driven by the presentation loop.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use glam::DVec2;
use pulse_types::{StreamEvent, StreamEventId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::SimError;
use crate::anchor::AnchorResolver;
use crate::forces::{CollideForce, SpatialGrid, apply_targeting, max_overlap};
use crate::geometry::Viewport;
use crate::params::SimulationParams;
use crate::particle::Particle;
use crate::render::{Surface, paint};

/// What a call to [`Simulation::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No particles; nothing to do.
    Idle,
    /// Temperature below `alpha_min`; positions unchanged.
    Asleep,
    /// Forces applied and positions integrated.
    Stepped,
}

/// Point-in-time numbers for logs and the status page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimStats {
    /// Live particles.
    pub particles: usize,
    /// Current temperature.
    pub alpha: f64,
    /// Deepest visual overlap between two particles.
    pub max_overlap: f64,
    /// Particles evicted by the cap since creation.
    pub evicted: u64,
}

/// Force-directed particle layout: one particle per admitted vote event,
/// pulled towards its option's anchor and kept apart by collision.
#[derive(Debug)]
pub struct Simulation {
    params: SimulationParams,
    viewport: Viewport,
    particles: Vec<Particle>,
    /// Events spawned since the last clear, evicted ones included.
    spawned: HashSet<StreamEventId>,
    alpha: f64,
    rng: StdRng,
    grid: SpatialGrid,
    targets: Vec<DVec2>,
    anchors_seen: BTreeMap<usize, DVec2>,
    unresolved: BTreeSet<usize>,
    evicted: u64,
    needs_clear: bool,
}

impl Simulation {
    /// Create an empty, cold simulation.
    ///
    /// # Errors
    ///
    /// Returns [`SimError`] when the parameters or the viewport are invalid.
    pub fn new(params: SimulationParams, viewport: Viewport) -> Result<Self, SimError> {
        params.validate()?;
        viewport.validate()?;
        let rng = params
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Ok(Self {
            params,
            viewport,
            particles: Vec::new(),
            spawned: HashSet::new(),
            alpha: 0.0,
            rng,
            grid: SpatialGrid::default(),
            targets: Vec::new(),
            anchors_seen: BTreeMap::new(),
            unresolved: BTreeSet::new(),
            evicted: 0,
            needs_clear: false,
        })
    }

    /// Parameters in use.
    pub const fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Current viewport.
    pub const fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Live particles, oldest first.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Number of live particles.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether there are no particles.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Current temperature.
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Whether integration is currently paused.
    pub fn is_asleep(&self) -> bool {
        self.alpha < self.params.alpha_min
    }

    /// Snapshot of counters.
    pub fn stats(&self) -> SimStats {
        SimStats {
            particles: self.particles.len(),
            alpha: self.alpha,
            max_overlap: max_overlap(&self.particles),
            evicted: self.evicted,
        }
    }

    /// Add a particle for an admitted stream event.
    ///
    /// The particle enters 100 units (by default) outside a random viewport
    /// edge with a random velocity. Spawning an event already seen since the
    /// last [`clear`](Self::clear), even one the cap has evicted, is a no-op
    /// and returns `false`.
    pub fn spawn(&mut self, event: &StreamEvent) -> bool {
        if !self.spawned.insert(event.id) {
            return false;
        }
        let position = self.edge_point();
        let speed = self.params.spawn_speed;
        let velocity = DVec2::new(
            (self.rng.random::<f64>() - 0.5) * speed,
            (self.rng.random::<f64>() - 0.5) * speed,
        );
        let radius = self
            .rng
            .random_range(self.params.radius_min..self.params.radius_max);
        self.particles.push(Particle {
            id: event.id,
            option_index: event.option_index,
            color: self.params.color_for(event.option_index),
            position,
            velocity,
            radius,
        });
        self.alpha = self.params.spawn_alpha;
        self.enforce_cap();
        tracing::debug!(
            event_id = %event.id,
            option_index = event.option_index,
            particles = self.particles.len(),
            "particle spawned"
        );
        true
    }

    fn edge_point(&mut self) -> DVec2 {
        let Viewport { width, height } = self.viewport;
        let margin = self.params.spawn_margin;
        let along_x = self.rng.random::<f64>() * width;
        let along_y = self.rng.random::<f64>() * height;
        match self.rng.random_range(0..4_u8) {
            0 => DVec2::new(along_x, -margin),
            1 => DVec2::new(width + margin, along_y),
            2 => DVec2::new(along_x, height + margin),
            _ => DVec2::new(-margin, along_y),
        }
    }

    fn enforce_cap(&mut self) {
        let Some(cap) = self.params.max_particles else {
            return;
        };
        let excess = self.particles.len().saturating_sub(cap);
        if excess > 0 {
            self.particles.drain(..excess);
            self.evicted = self
                .evicted
                .saturating_add(u64::try_from(excess).unwrap_or(u64::MAX));
        }
    }

    /// Remove every particle and cool down. The next [`render`](Self::render)
    /// clears the surface once.
    pub fn clear(&mut self) {
        if !self.particles.is_empty() {
            self.needs_clear = true;
        }
        self.particles.clear();
        self.spawned.clear();
        self.targets.clear();
        self.alpha = 0.0;
        tracing::debug!("simulation cleared");
    }

    /// Adopt a new viewport size. Anchors that depend on it are picked up on
    /// the next step.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidViewport`] and keeps the old size.
    pub fn resize(&mut self, viewport: Viewport) -> Result<(), SimError> {
        viewport.validate()?;
        self.viewport = viewport;
        self.needs_clear = true;
        Ok(())
    }

    /// Advance one step.
    ///
    /// Anchors are resolved fresh from `anchors` for every option on screen.
    /// Options without an anchor target the viewport center.
    pub fn tick<A: AnchorResolver + ?Sized>(&mut self, anchors: &A) -> TickOutcome {
        if self.particles.is_empty() {
            return TickOutcome::Idle;
        }
        if self.resolve_targets(anchors) {
            self.alpha = self.alpha.max(self.params.reheat_alpha);
        }
        self.replace_lost();
        if self.is_asleep() {
            return TickOutcome::Asleep;
        }

        let p = &self.params;
        self.alpha += (p.alpha_target - self.alpha) * p.alpha_decay;

        let collide = CollideForce {
            radius_factor: p.collide_radius_factor,
            radius_padding: p.collide_radius_padding,
            iterations: p.collide_iterations,
            strength: p.collide_strength,
        };
        collide.apply(&mut self.particles, &mut self.grid, &mut self.rng);
        apply_targeting(&mut self.particles, &self.targets, p.target_strength, self.alpha);

        let keep = 1.0 - p.velocity_decay;
        for particle in &mut self.particles {
            particle.velocity *= keep;
            particle.position += particle.velocity;
        }
        TickOutcome::Stepped
    }

    /// Resolve one target per particle. Returns whether any anchor moved by
    /// more than `reheat_distance` since the previous step.
    fn resolve_targets<A: AnchorResolver + ?Sized>(&mut self, anchors: &A) -> bool {
        let center = self.viewport.center();
        let mut current: BTreeMap<usize, DVec2> = BTreeMap::new();
        for particle in &self.particles {
            if current.contains_key(&particle.option_index) {
                continue;
            }
            let index = particle.option_index;
            let anchor = match anchors.resolve(index).filter(|a| a.is_finite()) {
                Some(anchor) => {
                    self.unresolved.remove(&index);
                    anchor
                }
                None => {
                    if self.unresolved.insert(index) {
                        tracing::debug!(
                            option_index = index,
                            "no anchor for option, using viewport center"
                        );
                    }
                    center
                }
            };
            current.insert(index, anchor);
        }

        let threshold = self.params.reheat_distance;
        let moved = current.iter().any(|(index, anchor)| {
            self.anchors_seen
                .get(index)
                .is_some_and(|seen| seen.distance(*anchor) > threshold)
        });

        self.targets.clear();
        self.targets.extend(
            self.particles
                .iter()
                .map(|p| current.get(&p.option_index).copied().unwrap_or(center)),
        );
        self.anchors_seen = current;
        moved
    }

    /// Put particles whose state became non-finite back on their target,
    /// at rest.
    fn replace_lost(&mut self) {
        for (particle, target) in self.particles.iter_mut().zip(&self.targets) {
            if !particle.is_finite() {
                tracing::debug!(particle_id = %particle.id, "re-placing particle with non-finite state");
                particle.position = *target;
                particle.velocity = DVec2::ZERO;
            }
        }
    }

    /// Paint the current frame.
    ///
    /// With no particles nothing is drawn, except a single clear right after
    /// the simulation was emptied or resized. Returns the number of discs.
    pub fn render<S: Surface + ?Sized>(&mut self, surface: &mut S) -> usize {
        if self.particles.is_empty() {
            if std::mem::take(&mut self.needs_clear) {
                surface.clear(self.viewport);
            }
            return 0;
        }
        self.needs_clear = false;
        paint(surface, self.viewport, &self.particles, self.params.glow_blur)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use pulse_types::{Epoch, PollId, StreamEventId};

    use super::*;
    use crate::render::RecordingSurface;

    fn event(option_index: usize) -> StreamEvent {
        StreamEvent {
            id: StreamEventId::new(),
            poll_id: PollId::new(),
            option_index,
            timestamp: Utc::now(),
            epoch: Epoch(1),
        }
    }

    fn seeded() -> Simulation {
        let params = SimulationParams {
            seed: Some(42),
            ..SimulationParams::default()
        };
        Simulation::new(params, Viewport::new(800.0, 600.0).unwrap()).unwrap()
    }

    #[test]
    fn spawn_enters_from_outside_the_viewport() {
        let mut sim = seeded();
        for _ in 0..40 {
            sim.spawn(&event(0));
        }
        for particle in sim.particles() {
            let p = particle.position;
            let outside = p.x <= -100.0 + 1e-9
                || p.y <= -100.0 + 1e-9
                || p.x >= 900.0 - 1e-9
                || p.y >= 700.0 - 1e-9;
            assert!(outside, "spawned inside at {p:?}");
            assert!(particle.velocity.x.abs() <= 25.0);
            assert!(particle.velocity.y.abs() <= 25.0);
            assert!((8.0..12.0).contains(&particle.radius));
        }
        assert!((sim.alpha() - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn duplicate_event_spawns_once() {
        let mut sim = seeded();
        let e = event(1);
        assert!(sim.spawn(&e));
        assert!(!sim.spawn(&e));
        assert_eq!(sim.len(), 1);
    }

    #[test]
    fn cap_evicts_oldest_first() {
        let params = SimulationParams {
            seed: Some(3),
            max_particles: Some(2),
            ..SimulationParams::default()
        };
        let mut sim = Simulation::new(params, Viewport::default()).unwrap();
        let events: Vec<_> = (0..3).map(event).collect();
        for e in &events {
            sim.spawn(e);
        }
        let ids: Vec<_> = sim.particles().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![events[1].id, events[2].id]);
        assert_eq!(sim.stats().evicted, 1);

        // A redelivered evicted event does not come back.
        assert!(!sim.spawn(&events[0]));
        assert_eq!(sim.len(), 2);
    }

    #[test]
    fn clear_forgets_spawned_events() {
        let mut sim = seeded();
        let e = event(0);
        assert!(sim.spawn(&e));
        sim.clear();
        assert!(sim.spawn(&e));
        assert!(!sim.spawn(&e));
        assert_eq!(sim.len(), 1);
    }

    #[test]
    fn empty_simulation_draws_nothing() {
        let mut sim = seeded();
        let mut surface = RecordingSurface::new();
        let anchors = |_: usize| -> Option<DVec2> { None };
        assert_eq!(sim.tick(&anchors), TickOutcome::Idle);
        assert_eq!(sim.render(&mut surface), 0);
        assert!(surface.calls().is_empty());
    }

    #[test]
    fn clear_wipes_surface_once() {
        let mut sim = seeded();
        let mut surface = RecordingSurface::new();
        sim.spawn(&event(0));
        assert_eq!(sim.render(&mut surface), 1);
        sim.clear();
        surface.take();
        sim.render(&mut surface);
        sim.render(&mut surface);
        assert_eq!(surface.calls().len(), 1);
        assert_eq!(surface.discs(), 0);
        assert!(sim.alpha().abs() < f64::EPSILON);
    }

    #[test]
    fn sleeps_once_cold_and_reheats_when_anchor_moves() {
        let mut sim = seeded();
        sim.spawn(&event(0));
        let here = |_: usize| Some(DVec2::new(400.0, 300.0));
        let mut steps = 0;
        while sim.tick(&here) == TickOutcome::Stepped {
            steps += 1;
            assert!(steps < 5000, "never cooled down");
        }
        assert!(sim.is_asleep());
        let frozen = sim.particles()[0].position;
        assert_eq!(sim.tick(&here), TickOutcome::Asleep);
        assert_eq!(sim.particles()[0].position, frozen);

        let there = |_: usize| Some(DVec2::new(200.0, 300.0));
        assert_eq!(sim.tick(&there), TickOutcome::Stepped);
        assert!(sim.alpha() >= 0.29);
    }

    #[test]
    fn lost_particle_is_skipped_then_replaced_at_anchor() {
        let mut sim = seeded();
        sim.spawn(&event(0));
        sim.spawn(&event(0));
        sim.particles[0].position = DVec2::new(f64::NAN, 0.0);

        let mut surface = RecordingSurface::new();
        assert_eq!(sim.render(&mut surface), 1);

        let anchor = DVec2::new(123.0, 456.0);
        let at = move |_: usize| Some(anchor);
        sim.tick(&at);
        assert!(sim.particles().iter().all(Particle::is_finite));
    }

    #[test]
    fn rejects_bad_viewport() {
        let mut sim = seeded();
        assert!(sim.resize(Viewport { width: 0.0, height: 10.0 }).is_err());
        assert!((sim.viewport().width - 800.0).abs() < f64::EPSILON);
        assert!(sim.resize(Viewport::new(1024.0, 768.0).unwrap()).is_ok());
    }
}
