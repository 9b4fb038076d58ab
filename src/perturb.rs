//! General-position enforcement (§4.D): bounded-magnitude random
//! perturbation of the cut mesh, retried deterministically on a
//! `GeneralPositionViolation` kernel status.

use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Scale factor applied to the cut mesh's AABB diagonal to get the
/// per-attempt perturbation magnitude.
pub const PERTURBATION_EPSILON0: f64 = 1e-4;

/// Perturbation attempts before the dispatch aborts with a fatal error.
pub const MAX_PERTURBATION_ATTEMPTS: u32 = 8;

/// Fixed RNG seed so repeated dispatches of the same inputs are
/// byte-identical (§5, §8 "perturbation determinism").
pub const PERTURBATION_SEED: u64 = 1;

/// Drives the general-position retry loop for a single dispatch. Owns the
/// attempt counter and a deterministically-seeded RNG; never perturbs the
/// source mesh.
pub struct PerturbationDriver {
    rng: StdRng,
    attempts: u32,
}

impl Default for PerturbationDriver {
    fn default() -> Self {
        Self {
            rng: StdRng::seed_from_u64(PERTURBATION_SEED),
            attempts: 0,
        }
    }
}

impl PerturbationDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= MAX_PERTURBATION_ATTEMPTS
    }

    /// Produces the next translation vector and increments the attempt
    /// counter. `diagonal` is the cut mesh's current AABB diagonal length.
    /// Returns `None` once [`Self::exhausted`] would be true.
    pub fn next_translation(&mut self, diagonal: f64) -> Option<DVec3> {
        if self.exhausted() {
            return None;
        }

        let epsilon = PERTURBATION_EPSILON0 * diagonal;
        let delta = DVec3::new(
            self.rng.random_range(-1.0..=1.0) * epsilon,
            self.rng.random_range(-1.0..=1.0) * epsilon,
            self.rng.random_range(-1.0..=1.0) * epsilon,
        );

        self.attempts += 1;
        Some(delta)
    }
}

/// The AABB diagonal length of a point set, used to scale the perturbation
/// magnitude to the cut mesh's extent.
pub fn aabb_diagonal(points: impl IntoIterator<Item = DVec3>) -> f64 {
    let mut min = DVec3::splat(f64::INFINITY);
    let mut max = DVec3::splat(f64::NEG_INFINITY);
    let mut any = false;

    for p in points {
        any = true;
        min = min.min(p);
        max = max.max(p);
    }

    if !any {
        return 0.0;
    }

    (max - min).length()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_yields_identical_sequence() {
        let mut a = PerturbationDriver::new();
        let mut b = PerturbationDriver::new();

        for _ in 0..MAX_PERTURBATION_ATTEMPTS {
            assert_eq!(a.next_translation(2.0), b.next_translation(2.0));
        }
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let mut driver = PerturbationDriver::new();
        for _ in 0..MAX_PERTURBATION_ATTEMPTS {
            assert!(driver.next_translation(1.0).is_some());
        }
        assert!(driver.exhausted());
        assert!(driver.next_translation(1.0).is_none());
    }

    #[test]
    fn translation_is_bounded_by_epsilon() {
        let mut driver = PerturbationDriver::new();
        let diagonal = 10.0;
        let delta = driver.next_translation(diagonal).unwrap();
        let epsilon = PERTURBATION_EPSILON0 * diagonal;
        assert!(delta.x.abs() <= epsilon);
        assert!(delta.y.abs() <= epsilon);
        assert!(delta.z.abs() <= epsilon);
    }

    #[test]
    fn aabb_diagonal_of_unit_cube_corners() {
        let points = [DVec3::ZERO, DVec3::new(1.0, 1.0, 1.0)];
        assert!((aabb_diagonal(points) - 3f64.sqrt()).abs() < 1e-9);
    }
}
