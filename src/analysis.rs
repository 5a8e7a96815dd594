//! Radial distribution analysis
//!
//! Histograms the distances between every site and the sites in its grid
//! neighborhood, normalizes each bin by the area of its annulus and picks the
//! densest bin (ignoring bin 0) as the characteristic nearest-neighbor spacing.

use std::f64::consts::PI;

use glam::DVec2;
use rayon::prelude::*;

use crate::grid::SpatialGrid;

/// Pair-distance histogram up to a cutoff
#[derive(Debug, Clone, PartialEq)]
pub struct RadialDistribution {
    bin_width: f64,
    counts: Vec<u64>,
}

impl RadialDistribution {
    /// Histogram the pair distances of `positions` using the grid's current membership
    ///
    /// The cutoff is `cutoff_factor` times the grid cell width. Each unordered
    /// pair is counted from both ends.
    pub fn compute(
        grid: &SpatialGrid,
        positions: &[DVec2],
        bins: usize,
        cutoff_factor: f64,
    ) -> Self {
        let cutoff = cutoff_factor * grid.cell_size().x;
        let bin_width = cutoff / bins as f64;
        let domain = grid.domain();

        let counts = positions
            .par_iter()
            .enumerate()
            .fold(
                || vec![0u64; bins],
                |mut hist, (i, &p)| {
                    grid.for_each_candidate(grid.locate(p), |k| {
                        if k == i {
                            return;
                        }
                        let r = domain.distance_squared(p, positions[k]).sqrt();
                        if r > cutoff {
                            return;
                        }
                        let bin = (r / bin_width) as usize;
                        if bin < bins {
                            hist[bin] += 1;
                        }
                    });
                    hist
                },
            )
            .reduce(
                || vec![0u64; bins],
                |mut a, b| {
                    a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                    a
                },
            );

        Self { bin_width, counts }
    }

    /// Radial width of one bin
    #[inline]
    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    /// Largest pair distance counted
    #[inline]
    pub fn cutoff(&self) -> f64 {
        self.bin_width * self.counts.len() as f64
    }

    /// Raw pair counts per bin
    #[inline]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Count of bin `i` divided by the area of its annulus
    pub fn density(&self, i: usize) -> f64 {
        let r1 = i as f64 * self.bin_width;
        let r2 = r1 + self.bin_width;
        self.counts[i] as f64 / (PI * (r2 * r2 - r1 * r1))
    }

    /// `(bin centre radius, normalized density)` for every bin except bin 0
    pub fn profile(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        (1..self.counts.len()).map(|i| ((i as f64 + 0.5) * self.bin_width, self.density(i)))
    }

    /// Densest bin, ignoring bin 0; the first wins on ties
    ///
    /// `None` when no pair fell inside the cutoff.
    pub fn peak_bin(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for i in 1..self.counts.len() {
            let d = self.density(i);
            if d > best.map_or(0.0, |(_, v)| v) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Centre radius of the densest bin
    pub fn peak_spacing(&self) -> Option<f64> {
        self.peak_bin().map(|i| (i as f64 + 0.5) * self.bin_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;
    use approx::assert_abs_diff_eq;

    fn lattice(domain: &Domain, per_axis: usize) -> Vec<DVec2> {
        let step = domain.extent() / per_axis as f64;
        (0..per_axis)
            .flat_map(|i| {
                (0..per_axis).map(move |j| {
                    domain.min() + DVec2::new((i as f64 + 0.5) * step.x, (j as f64 + 0.5) * step.y)
                })
            })
            .collect()
    }

    #[test]
    fn test_lattice_peak_at_spacing() {
        let domain = Domain::new(0.0, 1.0, 0.0, 1.0, true, true).unwrap();
        let positions = lattice(&domain, 20);
        let mut grid = SpatialGrid::new(&domain, positions.len(), 4.01).unwrap();
        grid.rebuild(&positions);

        let rdf = RadialDistribution::compute(&grid, &positions, 300, 1.6);
        let spacing = rdf.peak_spacing().unwrap();
        assert!(
            (spacing - 0.05).abs() <= rdf.bin_width(),
            "peak at {} for lattice spacing 0.05",
            spacing
        );
    }

    #[test]
    fn test_lattice_peak_non_periodic() {
        let domain = Domain::new(-2.0, 2.0, 1.0, 5.0, false, false).unwrap();
        let positions = lattice(&domain, 16);
        let mut grid = SpatialGrid::new(&domain, positions.len(), 4.01).unwrap();
        grid.rebuild(&positions);

        let rdf = RadialDistribution::compute(&grid, &positions, 200, 1.6);
        let spacing = rdf.peak_spacing().unwrap();
        assert!((spacing - 0.25).abs() <= rdf.bin_width());
    }

    #[test]
    fn test_pairs_counted_from_both_ends() {
        let domain = Domain::new(0.0, 1.0, 0.0, 1.0, false, false).unwrap();
        let positions = vec![DVec2::new(0.4, 0.5), DVec2::new(0.605, 0.5)];
        let mut grid = SpatialGrid::new(&domain, 1, 1.0).unwrap();
        grid.rebuild(&positions);

        let rdf = RadialDistribution::compute(&grid, &positions, 100, 1.0);
        assert_abs_diff_eq!(rdf.cutoff(), 1.0, epsilon = 1e-12);
        assert_eq!(rdf.counts().iter().sum::<u64>(), 2);
        assert_eq!(rdf.peak_bin(), Some(20));
    }

    #[test]
    fn test_no_pairs_has_no_peak() {
        let domain = Domain::new(0.0, 1.0, 0.0, 1.0, false, false).unwrap();
        let positions = vec![DVec2::new(0.5, 0.5)];
        let mut grid = SpatialGrid::new(&domain, 1, 1.0).unwrap();
        grid.rebuild(&positions);

        let rdf = RadialDistribution::compute(&grid, &positions, 50, 1.6);
        assert_eq!(rdf.peak_bin(), None);
        assert_eq!(rdf.peak_spacing(), None);
        assert_eq!(rdf.profile().count(), 49);
    }

    #[test]
    fn test_density_normalization() {
        let rdf = RadialDistribution {
            bin_width: 1.0,
            counts: vec![9, 3, 4],
        };
        assert_abs_diff_eq!(rdf.density(0), 9.0 / PI);
        assert_abs_diff_eq!(rdf.density(1), 1.0 / PI);
        assert_abs_diff_eq!(rdf.density(2), 4.0 / (PI * 5.0));
        // Bin 0 is never the peak
        assert_eq!(rdf.peak_bin(), Some(1));
    }
}
