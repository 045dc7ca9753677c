use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// A rigid body in the simulation.
///
/// Geometry (vertices, radii, ...) lives in the per-type shape parameters;
/// a particle only carries its pose, its velocity (consumed by the event
/// chain engine for momentum transfer), and per-particle scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// Center-of-mass position in Cartesian coordinates.
    pub position: Point3<f64>,
    /// Body orientation as a unit quaternion.
    pub orientation: UnitQuaternion<f64>,
    /// Velocity used to seed event-chain directions.
    pub velocity: Vector3<f64>,
    /// Index into the per-type shape parameter table.
    pub type_id: usize,
    /// Nominal diameter, informational only.
    pub diameter: f64,
    /// Charge, informational only.
    pub charge: f64,
}

impl Particle {
    /// Creates a particle of the given type at a position, with identity
    /// orientation and zero velocity.
    pub fn new(type_id: usize, position: Point3<f64>) -> Self {
        Self {
            position,
            orientation: UnitQuaternion::identity(),
            velocity: Vector3::zeros(),
            type_id,
            diameter: 0.0,
            charge: 0.0,
        }
    }

    pub fn with_orientation(mut self, orientation: UnitQuaternion<f64>) -> Self {
        self.orientation = orientation;
        self
    }
}

/// Dense, fixed-count storage for all particles in a simulation.
///
/// Particles are referenced by index everywhere in the engine; the count is
/// fixed for the lifetime of a move set. Engines mutate entries only on
/// accepted moves and must restore them on rejection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticleStore {
    particles: Vec<Particle>,
}

impl ParticleStore {
    pub fn new(particles: Vec<Particle>) -> Self {
        Self { particles }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn get(&self, index: usize) -> &Particle {
        &self.particles[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Particle {
        &mut self.particles[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Particle> {
        self.particles.iter_mut()
    }

    /// Number of particles of the given type.
    pub fn count_of_type(&self, type_id: usize) -> usize {
        self.particles.iter().filter(|p| p.type_id == type_id).count()
    }

    /// Snapshot of all positions, used for bit-identical rollback of
    /// whole-system moves.
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.particles.iter().map(|p| p.position).collect()
    }

    pub fn restore_positions(&mut self, positions: &[Point3<f64>]) {
        for (particle, &position) in self.particles.iter_mut().zip(positions) {
            particle.position = position;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_of_type_counts_only_matching_particles() {
        let store = ParticleStore::new(vec![
            Particle::new(0, Point3::origin()),
            Particle::new(1, Point3::new(1.0, 0.0, 0.0)),
            Particle::new(0, Point3::new(2.0, 0.0, 0.0)),
        ]);
        assert_eq!(store.count_of_type(0), 2);
        assert_eq!(store.count_of_type(1), 1);
        assert_eq!(store.count_of_type(2), 0);
    }

    #[test]
    fn restore_positions_round_trips_exactly() {
        let mut store = ParticleStore::new(vec![
            Particle::new(0, Point3::new(0.1, 0.2, 0.3)),
            Particle::new(0, Point3::new(-1.5, 2.5, 0.0)),
        ]);
        let saved = store.positions();
        store.get_mut(0).position = Point3::new(9.0, 9.0, 9.0);
        store.restore_positions(&saved);
        assert_eq!(store.get(0).position, Point3::new(0.1, 0.2, 0.3));
        assert_eq!(store.get(1).position, Point3::new(-1.5, 2.5, 0.0));
    }
}
