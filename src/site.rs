//! Site set: the movable points being relaxed
//!
//! Durable per-site state (position, exposure count) lives in [`SiteSet`].
//! The per-iteration sample sums live in [`Accumulators`], which is created
//! fresh for every iteration and dropped once the update pass has consumed it.

use glam::DVec2;
use rayon::prelude::*;

use crate::config::RelaxationWeights;
use crate::domain::Domain;

/// Positions and exposure counts of all sites
///
/// Site ids are stable indices `0..len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteSet {
    positions: Vec<DVec2>,
    exposures: Vec<u64>,
}

impl SiteSet {
    /// Create sites at the given positions, each with exposure count 1
    pub fn new(positions: Vec<DVec2>) -> Self {
        let exposures = vec![1; positions.len()];
        Self {
            positions,
            exposures,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[inline]
    pub fn positions(&self) -> &[DVec2] {
        &self.positions
    }

    /// Number of updates each site has received, starting at 1
    #[inline]
    pub fn exposures(&self) -> &[u64] {
        &self.exposures
    }

    #[inline]
    pub fn position(&self, id: usize) -> DVec2 {
        self.positions[id]
    }

    /// Move a site without touching its exposure count
    #[inline]
    pub fn set_position(&mut self, id: usize, position: DVec2) {
        self.positions[id] = position;
    }

    /// Translate sites that left the domain back in along periodic axes
    pub fn wrap_into(&mut self, domain: &Domain) {
        if !(domain.periodic_x() || domain.periodic_y()) {
            return;
        }
        self.positions
            .par_iter_mut()
            .for_each(|p| *p = domain.wrap(*p));
    }

    /// Blend every site that received samples toward the mean of its samples
    ///
    /// Sites with no samples keep both position and exposure count. Returns
    /// the number of sites that moved.
    pub fn apply(&mut self, accumulators: Accumulators, weights: &RelaxationWeights) -> usize {
        self.positions
            .par_iter_mut()
            .zip(self.exposures.par_iter_mut())
            .zip(accumulators.sums.into_par_iter().zip(accumulators.hits.into_par_iter()))
            .map(|((position, exposure), (sum, hits))| {
                if hits == 0 {
                    return 0;
                }
                let j = *exposure as f64;
                let centroid = sum / hits as f64;
                let (w_old, w_new) = weights.blend(j);
                *position = (*position * w_old + centroid * w_new) / (w_old + w_new);
                *exposure += 1;
                1
            })
            .sum()
    }
}

/// Per-iteration sample sums, one slot per site
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulators {
    sums: Vec<DVec2>,
    hits: Vec<u64>,
}

impl Accumulators {
    /// Empty accumulators for `site_count` sites
    pub fn new(site_count: usize) -> Self {
        Self {
            sums: vec![DVec2::ZERO; site_count],
            hits: vec![0; site_count],
        }
    }

    /// Add a sample, given in the site's local periodic frame
    #[inline]
    pub fn add(&mut self, site: usize, sample: DVec2) {
        self.sums[site] += sample;
        self.hits[site] += 1;
    }

    /// Number of samples assigned to a site so far
    #[inline]
    pub fn hits(&self, site: usize) -> u64 {
        self.hits[site]
    }

    /// Mean of the samples assigned to a site, if any
    pub fn centroid(&self, site: usize) -> Option<DVec2> {
        match self.hits[site] {
            0 => None,
            n => Some(self.sums[site] / n as f64),
        }
    }

    /// Samples assigned to any site
    pub fn total_hits(&self) -> u64 {
        self.hits.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_new_sites_start_at_one() {
        let sites = SiteSet::new(vec![DVec2::ZERO, DVec2::ONE]);
        assert_eq!(sites.len(), 2);
        assert_eq!(sites.exposures(), &[1, 1]);
    }

    #[test]
    fn test_apply_running_mean() {
        let mut sites = SiteSet::new(vec![DVec2::new(0.2, 0.2), DVec2::new(0.8, 0.8)]);
        let mut acc = Accumulators::new(2);
        acc.add(0, DVec2::new(0.4, 0.2));
        acc.add(0, DVec2::new(0.4, 0.4));

        let moved = sites.apply(acc, &RelaxationWeights::default());
        assert_eq!(moved, 1);

        // j = 1: (1 * x + 1 * u) / 2 with u = (0.4, 0.3)
        let p = sites.position(0);
        assert_abs_diff_eq!(p.x, 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, 0.25, epsilon = 1e-12);
        assert_eq!(sites.exposures(), &[2, 1]);

        // Untouched site keeps its position
        assert_eq!(sites.position(1), DVec2::new(0.8, 0.8));
    }

    #[test]
    fn test_apply_frozen_weights_keep_positions() {
        let frozen = RelaxationWeights {
            alpha1: 1.0,
            alpha2: 0.0,
            beta1: 0.0,
            beta2: 0.0,
        };
        let start = vec![DVec2::new(0.1, 0.7), DVec2::new(0.6, 0.3)];
        let mut sites = SiteSet::new(start.clone());
        let mut acc = Accumulators::new(2);
        acc.add(0, DVec2::new(0.9, 0.9));
        acc.add(1, DVec2::new(0.0, 0.0));
        sites.apply(acc, &frozen);
        assert_eq!(sites.positions(), start.as_slice());
        assert_eq!(sites.exposures(), &[2, 2]);
    }

    #[test]
    fn test_accumulator_centroid() {
        let mut acc = Accumulators::new(3);
        assert_eq!(acc.centroid(1), None);
        acc.add(1, DVec2::new(1.0, 0.0));
        acc.add(1, DVec2::new(0.0, 1.0));
        assert_eq!(acc.centroid(1), Some(DVec2::new(0.5, 0.5)));
        assert_eq!(acc.hits(1), 2);
        assert_eq!(acc.total_hits(), 2);
    }

    #[test]
    fn test_wrap_into() {
        let domain = Domain::new(0.0, 1.0, 0.0, 1.0, true, true).unwrap();
        let mut sites = SiteSet::new(vec![DVec2::new(-0.1, 1.2), DVec2::new(0.5, 0.5)]);
        sites.wrap_into(&domain);
        assert_abs_diff_eq!(sites.position(0).x, 0.9, epsilon = 1e-12);
        assert_abs_diff_eq!(sites.position(0).y, 0.2, epsilon = 1e-12);
        assert_eq!(sites.position(1), DVec2::new(0.5, 0.5));
    }
}
