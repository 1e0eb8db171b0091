//! Forces applied each step: collision relaxation and anchor targeting.
//!
//! Both act on velocities only; integration happens in
//! [`Simulation::tick`](crate::Simulation::tick).

use std::collections::HashMap;

use glam::DVec2;
use rand::Rng;

use crate::particle::Particle;

/// Uniform bucket grid for neighbor queries.
#[derive(Debug, Default)]
pub struct SpatialGrid {
    cell_size: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl SpatialGrid {
    /// Empty grid with square cells of `cell_size` units.
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: cell_size.max(f64::EPSILON),
            cells: HashMap::new(),
        }
    }

    /// Remove every entry, keeping allocations.
    pub fn clear(&mut self) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
    }

    /// Change the cell size and clear.
    pub fn reset(&mut self, cell_size: f64) {
        self.cell_size = cell_size.max(f64::EPSILON);
        self.cells.clear();
    }

    // Finite inputs only; callers skip non-finite points.
    #[allow(clippy::cast_possible_truncation)]
    fn cell_of(&self, point: DVec2) -> (i64, i64) {
        let scaled = (point / self.cell_size).floor();
        (scaled.x as i64, scaled.y as i64)
    }

    /// Add `index` at `point`.
    pub fn insert(&mut self, index: usize, point: DVec2) {
        if !point.is_finite() {
            return;
        }
        let key = self.cell_of(point);
        self.cells.entry(key).or_default().push(index);
    }

    /// Indices in the 3x3 block of cells around `point`. With a cell size at
    /// least the largest interaction distance this covers every neighbor.
    pub fn neighbors(&self, point: DVec2, out: &mut Vec<usize>) {
        out.clear();
        if !point.is_finite() {
            return;
        }
        let (cx, cy) = self.cell_of(point);
        for dx in -1..=1_i64 {
            for dy in -1..=1_i64 {
                let key = (cx.saturating_add(dx), cy.saturating_add(dy));
                if let Some(bucket) = self.cells.get(&key) {
                    out.extend_from_slice(bucket);
                }
            }
        }
    }
}

/// Collision settings in effect for one step.
#[derive(Debug, Clone, Copy)]
pub struct CollideForce {
    /// Multiplier on the visual radius.
    pub radius_factor: f64,
    /// Added after multiplying.
    pub radius_padding: f64,
    /// Relaxation passes.
    pub iterations: u32,
    /// Share of overlap corrected per pass.
    pub strength: f64,
}

impl CollideForce {
    /// Push overlapping particles apart.
    ///
    /// Works on predicted positions (`position + velocity`). Each overlapping
    /// pair is separated along the line between them, the push split by the
    /// square of the partner's radius so small particles yield to large ones.
    /// Exactly coincident pairs get a tiny random offset first.
    pub fn apply<R: Rng + ?Sized>(&self, particles: &mut [Particle], grid: &mut SpatialGrid, rng: &mut R) {
        if particles.len() < 2 {
            return;
        }
        let radii: Vec<f64> = particles
            .iter()
            .map(|p| p.collide_radius(self.radius_factor, self.radius_padding))
            .collect();
        let max_radius = radii.iter().copied().fold(0.0_f64, f64::max);
        let mut candidates = Vec::new();

        for _ in 0..self.iterations {
            grid.reset(max_radius * 2.0);
            for (index, particle) in particles.iter().enumerate() {
                grid.insert(index, particle.predicted());
            }

            for i in 0..particles.len() {
                let Some(ri) = radii.get(i).copied() else {
                    continue;
                };
                let Some(predicted_i) = particles.get(i).map(Particle::predicted) else {
                    continue;
                };
                grid.neighbors(predicted_i, &mut candidates);
                for &j in &candidates {
                    if j <= i {
                        continue;
                    }
                    let Some(rj) = radii.get(j).copied() else {
                        continue;
                    };
                    let Some(predicted_j) = particles.get(j).map(Particle::predicted) else {
                        continue;
                    };
                    let reach = ri + rj;
                    let mut delta = predicted_i - predicted_j;
                    let mut dist_sq = delta.length_squared();
                    if dist_sq >= reach * reach {
                        continue;
                    }
                    if delta.x.abs() < f64::EPSILON {
                        delta.x = jiggle(rng);
                        dist_sq += delta.x * delta.x;
                    }
                    if delta.y.abs() < f64::EPSILON {
                        delta.y = jiggle(rng);
                        dist_sq += delta.y * delta.y;
                    }
                    let dist = dist_sq.sqrt();
                    let push = delta * ((reach - dist) / dist * self.strength);
                    let (ri_sq, rj_sq) = (ri * ri, rj * rj);
                    let share = rj_sq / (ri_sq + rj_sq);
                    if let Some(pi) = particles.get_mut(i) {
                        pi.velocity += push * share;
                    }
                    if let Some(pj) = particles.get_mut(j) {
                        pj.velocity -= push * (1.0 - share);
                    }
                }
            }
        }
    }
}

fn jiggle<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    (rng.random::<f64>() - 0.5) * 1e-6
}

/// Accelerate every particle towards its target, per axis, proportionally
/// to the distance and the current temperature.
///
/// `targets` is indexed like `particles`; particles without a target are
/// left alone.
pub fn apply_targeting(particles: &mut [Particle], targets: &[DVec2], strength: f64, alpha: f64) {
    let gain = strength * alpha;
    for (particle, target) in particles.iter_mut().zip(targets) {
        particle.velocity += (*target - particle.position) * gain;
    }
}

/// Deepest visual overlap between any two particles, in units.
///
/// Uses the visual radius, not the inflated collision radius. Brute force;
/// meant for diagnostics and tests.
pub fn max_overlap(particles: &[Particle]) -> f64 {
    let mut worst = 0.0_f64;
    for (i, a) in particles.iter().enumerate() {
        for b in particles.iter().skip(i + 1) {
            let overlap = a.radius + b.radius - a.position.distance(b.position);
            worst = worst.max(overlap);
        }
    }
    worst
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::color::Color;

    fn particle(x: f64, y: f64) -> Particle {
        Particle {
            id: pulse_types::StreamEventId::new(),
            option_index: 0,
            color: Color::WHITE,
            position: DVec2::new(x, y),
            velocity: DVec2::ZERO,
            radius: 10.0,
        }
    }

    fn collide() -> CollideForce {
        CollideForce {
            radius_factor: 1.8,
            radius_padding: 2.0,
            iterations: 4,
            strength: 1.0,
        }
    }

    #[test]
    fn grid_returns_adjacent_cells_only() {
        let mut grid = SpatialGrid::new(10.0);
        grid.insert(0, DVec2::new(1.0, 1.0));
        grid.insert(1, DVec2::new(15.0, 1.0));
        grid.insert(2, DVec2::new(55.0, 55.0));
        let mut out = Vec::new();
        grid.neighbors(DVec2::new(2.0, 2.0), &mut out);
        out.sort_unstable();
        assert_eq!(out, vec![0, 1]);
    }

    #[test]
    fn overlapping_pair_is_pushed_apart() {
        let mut particles = vec![particle(0.0, 0.0), particle(5.0, 0.0)];
        let mut grid = SpatialGrid::default();
        let mut rng = StdRng::seed_from_u64(1);
        collide().apply(&mut particles, &mut grid, &mut rng);
        assert!(particles[0].velocity.x < 0.0);
        assert!(particles[1].velocity.x > 0.0);
        // Equal radii split the push evenly.
        let sum = particles[0].velocity.x + particles[1].velocity.x;
        assert!(sum.abs() < 1e-9);
    }

    #[test]
    fn coincident_pair_is_separated() {
        let mut particles = vec![particle(3.0, 3.0), particle(3.0, 3.0)];
        let mut grid = SpatialGrid::default();
        let mut rng = StdRng::seed_from_u64(7);
        collide().apply(&mut particles, &mut grid, &mut rng);
        assert!(particles.iter().all(Particle::is_finite));
        assert!(particles[0].velocity.distance(particles[1].velocity) > 1.0);
    }

    #[test]
    fn distant_pair_is_untouched() {
        let mut particles = vec![particle(0.0, 0.0), particle(500.0, 0.0)];
        let mut grid = SpatialGrid::default();
        let mut rng = StdRng::seed_from_u64(1);
        collide().apply(&mut particles, &mut grid, &mut rng);
        assert_eq!(particles[0].velocity, DVec2::ZERO);
        assert_eq!(particles[1].velocity, DVec2::ZERO);
    }

    #[test]
    fn targeting_scales_with_alpha() {
        let mut particles = vec![particle(0.0, 0.0)];
        apply_targeting(&mut particles, &[DVec2::new(100.0, -50.0)], 0.1, 0.5);
        assert!((particles[0].velocity.x - 5.0).abs() < 1e-9);
        assert!((particles[0].velocity.y + 2.5).abs() < 1e-9);
    }

    #[test]
    fn overlap_measures_visual_radius() {
        let particles = vec![particle(0.0, 0.0), particle(15.0, 0.0)];
        assert!((max_overlap(&particles) - 5.0).abs() < 1e-9);
        assert!(max_overlap(&particles[..1]).abs() < f64::EPSILON);
    }
}
