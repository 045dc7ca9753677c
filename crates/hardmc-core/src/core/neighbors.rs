//! Periodic cell list: the neighbor enumerator behind every overlap query.
//!
//! Particles are binned by fractional coordinate; range queries walk the
//! bins within the requested radius (in perpendicular-width units) and
//! filter candidates by minimum-image distance.

use crate::core::models::particle::ParticleStore;
use crate::core::models::simbox::SimBox;
use nalgebra::Point3;

#[derive(Debug, Clone)]
pub struct CellList {
    cell: SimBox,
    dims: [usize; 3],
    widths: [f64; 3],
    bins: Vec<Vec<usize>>,
}

impl CellList {
    /// Builds a cell list with bins at least `min_bin_width` across.
    pub fn build(cell: &SimBox, particles: &ParticleStore, min_bin_width: f64) -> Self {
        let widths = perpendicular_widths(cell);
        let mut dims = [1usize; 3];
        for axis in 0..3 {
            dims[axis] = ((widths[axis] / min_bin_width).floor() as usize).max(1);
        }

        let mut bins = vec![Vec::new(); dims[0] * dims[1] * dims[2]];
        for (index, particle) in particles.iter().enumerate() {
            let bin = bin_of(cell, &dims, &particle.position);
            bins[bin].push(index);
        }

        Self { cell: *cell, dims, widths, bins }
    }

    /// Indices of all particles within `radius` of `position` (center to
    /// center, minimum image), excluding `exclude`.
    pub fn neighbors(
        &self,
        particles: &ParticleStore,
        position: &Point3<f64>,
        radius: f64,
        exclude: Option<usize>,
    ) -> Vec<usize> {
        let fraction = wrapped_fraction(&self.cell, position);
        let mut home = [0usize; 3];
        for axis in 0..3 {
            home[axis] = ((fraction[axis] * self.dims[axis] as f64) as usize)
                .min(self.dims[axis] - 1);
        }

        let mut found = Vec::new();
        let radius_sq = radius * radius;
        for_each_bin_in_range(&self.dims, &self.widths, &home, radius, |bin| {
            for &index in &self.bins[bin] {
                if Some(index) == exclude {
                    continue;
                }
                let delta = self
                    .cell
                    .min_image(&(particles.get(index).position - position));
                if delta.norm_squared() <= radius_sq {
                    found.push(index);
                }
            }
        });
        found.sort_unstable();
        found.dedup();
        found
    }
}

fn perpendicular_widths(cell: &SimBox) -> [f64; 3] {
    let h = cell.cell_matrix();
    let a1 = h.column(0).into_owned();
    let a2 = h.column(1).into_owned();
    let a3 = h.column(2).into_owned();
    let v = cell.volume();
    [
        v / a2.cross(&a3).norm(),
        v / a3.cross(&a1).norm(),
        v / a1.cross(&a2).norm(),
    ]
}

fn wrapped_fraction(cell: &SimBox, position: &Point3<f64>) -> [f64; 3] {
    let f = cell.fractional(position);
    let mut wrapped = [0.0; 3];
    for axis in 0..3 {
        wrapped[axis] = f[axis] - f[axis].floor();
    }
    wrapped
}

fn bin_of(cell: &SimBox, dims: &[usize; 3], position: &Point3<f64>) -> usize {
    let f = wrapped_fraction(cell, position);
    let mut index = [0usize; 3];
    for axis in 0..3 {
        index[axis] = ((f[axis] * dims[axis] as f64) as usize).min(dims[axis] - 1);
    }
    flatten(dims, &index)
}

fn flatten(dims: &[usize; 3], index: &[usize; 3]) -> usize {
    (index[2] * dims[1] + index[1]) * dims[0] + index[0]
}

fn for_each_bin_in_range(
    dims: &[usize; 3],
    widths: &[f64; 3],
    home: &[usize; 3],
    radius: f64,
    mut visit: impl FnMut(usize),
) {
    let mut reach = [0isize; 3];
    for axis in 0..3 {
        let bin_width = widths[axis] / dims[axis] as f64;
        reach[axis] = (radius / bin_width).ceil() as isize;
        // A reach spanning the whole axis collapses to one full pass.
        reach[axis] = reach[axis].min(dims[axis] as isize / 2 + 1);
    }

    let mut seen = vec![false; dims[0] * dims[1] * dims[2]];
    for dz in -reach[2]..=reach[2] {
        for dy in -reach[1]..=reach[1] {
            for dx in -reach[0]..=reach[0] {
                let index = [
                    (home[0] as isize + dx).rem_euclid(dims[0] as isize) as usize,
                    (home[1] as isize + dy).rem_euclid(dims[1] as isize) as usize,
                    (home[2] as isize + dz).rem_euclid(dims[2] as isize) as usize,
                ];
                let bin = flatten(dims, &index);
                if !seen[bin] {
                    seen[bin] = true;
                    visit(bin);
                }
            }
        }
    }
}
