//! Monte-Carlo Lloyd relaxation
//!
//! Instead of building exact Voronoi cells, each iteration throws `q` random
//! points at the unoccupied region, hands every point to its nearest site and
//! moves each site toward the mean of the points it received. The step is
//! damped by the site's exposure count, so sites settle as they accumulate
//! updates and the set approaches a centroidal Voronoi tessellation.
//!
//! # Iteration
//!
//! 1. Wrap sites that left the domain back in along periodic axes
//! 2. Rebuild the spatial grid
//! 3. (caller) optional diagnostic snapshot
//! 4. Redistribute random sites when due
//! 5. Sample, assign each sample to its nearest site, accumulate
//! 6. Blend every hit site toward its sample mean

use std::time::Instant;

use glam::DVec2;
use log::debug;
use rayon::prelude::*;

use crate::config::SeederConfig;
use crate::domain::Domain;
use crate::error::Result;
use crate::generation::sampling::{self, CHUNK_SIZE, SERIAL_LANE};
use crate::grid::SpatialGrid;
use crate::mask::DomainMask;
use crate::site::{Accumulators, SiteSet};

/// What one relaxation iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IterationStats {
    pub iteration: usize,
    /// Samples that found a nearest site
    pub assigned: u64,
    /// Samples whose grid neighborhood held no site
    pub unassigned: u64,
    /// Sites that received at least one sample and moved
    pub moved: usize,
    /// Sites moved by redistribution
    pub redistributed: usize,
}

/// Relaxation over a fixed configuration, domain and mask
pub struct RelaxationEngine<'a, M: ?Sized> {
    config: &'a SeederConfig,
    domain: &'a Domain,
    mask: &'a M,
}

impl<'a, M> RelaxationEngine<'a, M>
where
    M: DomainMask + ?Sized,
{
    pub fn new(config: &'a SeederConfig, domain: &'a Domain, mask: &'a M) -> Self {
        Self {
            config,
            domain,
            mask,
        }
    }

    /// Steps 1 and 2: wrap sites back in and rebuild grid membership
    pub fn prepare(&self, sites: &mut SiteSet, grid: &mut SpatialGrid) {
        sites.wrap_into(self.domain);
        grid.rebuild(sites.positions());
    }

    /// Steps 4 to 6 of iteration `iteration`
    ///
    /// Expects [`prepare`](Self::prepare) to have run since sites last moved.
    pub fn advance(
        &self,
        iteration: usize,
        sites: &mut SiteSet,
        grid: &mut SpatialGrid,
    ) -> Result<IterationStats> {
        let mut stats = IterationStats {
            iteration,
            ..Default::default()
        };
        let epoch = iteration as u64 + 1;

        if self.config.redistribution.is_due(iteration) {
            let mut rng = sampling::stream(self.config.seed, epoch, SERIAL_LANE);
            let picked = sampling::redistribute(
                &mut rng,
                sites,
                self.config.redistribution.count,
                self.domain,
                self.mask,
                self.config.max_sample_attempts,
            )?;
            stats.redistributed = picked.len();
            grid.rebuild(sites.positions());
        }

        let sample_start = Instant::now();
        let accumulators = self.assign_samples(epoch, sites.positions(), grid)?;
        let sample_time = sample_start.elapsed();

        stats.assigned = accumulators.total_hits();
        stats.unassigned = self.config.samples_per_iteration as u64 - stats.assigned;

        let update_start = Instant::now();
        stats.moved = sites.apply(accumulators, &self.config.weights);

        debug!(
            "iteration {}: sampling={:?}, update={:?}, moved={}, unassigned={}, redistributed={}",
            iteration,
            sample_time,
            update_start.elapsed(),
            stats.moved,
            stats.unassigned,
            stats.redistributed
        );

        Ok(stats)
    }

    /// Step 5: draw the samples in parallel, then accumulate them in draw order
    pub fn assign_samples(
        &self,
        epoch: u64,
        positions: &[DVec2],
        grid: &SpatialGrid,
    ) -> Result<Accumulators> {
        let total = self.config.samples_per_iteration;
        let chunks: Vec<Vec<(usize, DVec2)>> = (0..total.div_ceil(CHUNK_SIZE))
            .into_par_iter()
            .map(|chunk| {
                let mut rng = sampling::stream(self.config.seed, epoch, chunk as u64 + 1);
                let len = CHUNK_SIZE.min(total - chunk * CHUNK_SIZE);
                let mut hits = Vec::with_capacity(len);
                for _ in 0..len {
                    let sample = sampling::sample_unoccupied(
                        &mut rng,
                        self.domain,
                        self.mask,
                        self.config.max_sample_attempts,
                    )?;
                    if let Some(nearest) = grid.nearest_site(positions, sample) {
                        hits.push((nearest.site, nearest.image));
                    }
                }
                Ok(hits)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut accumulators = Accumulators::new(positions.len());
        for (site, image) in chunks.into_iter().flatten() {
            accumulators.add(site, image);
        }
        Ok(accumulators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RelaxationWeights, SeederConfigBuilder};
    use crate::mask::{EmptyMask, FnMask};

    fn config(sites: usize, samples: usize) -> SeederConfig {
        SeederConfigBuilder::new()
            .seed(42)
            .site_count(sites)
            .unwrap()
            .samples_per_iteration(samples)
            .unwrap()
            .build()
            .unwrap()
    }

    fn setup<M: DomainMask>(
        config: &SeederConfig,
        domain: &Domain,
        mask: &M,
    ) -> (SiteSet, SpatialGrid) {
        let sites = sampling::initial_placement(
            config.seed,
            config.site_count,
            domain,
            mask,
            config.max_sample_attempts,
        )
        .unwrap();
        let grid = SpatialGrid::new(domain, config.site_count, config.relaxation_spacing).unwrap();
        (sites, grid)
    }

    #[test]
    fn test_every_sample_is_accumulated_once() {
        let config = config(50, 5000);
        let domain = Domain::new(0.0, 1.0, 0.0, 1.0, true, true).unwrap();
        let engine = RelaxationEngine::new(&config, &domain, &EmptyMask);
        let (mut sites, mut grid) = setup(&config, &domain, &EmptyMask);
        engine.prepare(&mut sites, &mut grid);

        let acc = engine.assign_samples(1, sites.positions(), &grid).unwrap();
        assert_eq!(acc.total_hits(), 5000);
    }

    #[test]
    fn test_assignment_is_reproducible() {
        let config = config(200, 3000);
        let domain = Domain::new(0.0, 1.0, 0.0, 1.0, false, true).unwrap();
        let engine = RelaxationEngine::new(&config, &domain, &EmptyMask);

        let run = || {
            let (mut sites, mut grid) = setup(&config, &domain, &EmptyMask);
            for k in 0..5 {
                engine.prepare(&mut sites, &mut grid);
                engine.advance(k, &mut sites, &mut grid).unwrap();
            }
            sites
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_centroids_stay_in_site_frame() {
        // One site near the left edge of a periodic box: samples on the far
        // right are reported left of x = 0, so the centroid stays near the site
        let config = config(1, 4000);
        let domain = Domain::new(0.0, 1.0, 0.0, 1.0, true, true).unwrap();
        let engine = RelaxationEngine::new(&config, &domain, &EmptyMask);
        let mut sites = SiteSet::new(vec![DVec2::new(0.02, 0.5)]);
        let mut grid = SpatialGrid::new(&domain, 1, config.relaxation_spacing).unwrap();
        engine.prepare(&mut sites, &mut grid);

        let acc = engine.assign_samples(1, sites.positions(), &grid).unwrap();
        let centroid = acc.centroid(0).unwrap();
        assert!((centroid.x - 0.02).abs() < 0.05, "centroid {:?}", centroid);
        assert!((centroid.y - 0.5).abs() < 0.05, "centroid {:?}", centroid);
    }

    #[test]
    fn test_frozen_weights_leave_sites_in_place() {
        let mut config = config(30, 2000);
        config.weights = RelaxationWeights {
            alpha1: 1.0,
            alpha2: 0.0,
            beta1: 0.0,
            beta2: 0.0,
        };
        let domain = Domain::new(0.0, 1.0, 0.0, 1.0, true, true).unwrap();
        let engine = RelaxationEngine::new(&config, &domain, &EmptyMask);
        let (mut sites, mut grid) = setup(&config, &domain, &EmptyMask);
        let start = sites.positions().to_vec();

        for k in 0..20 {
            engine.prepare(&mut sites, &mut grid);
            engine.advance(k, &mut sites, &mut grid).unwrap();
        }
        for (before, after) in start.iter().zip(sites.positions()) {
            assert!(before.distance(*after) < 1e-12);
        }
        assert!(sites.exposures().iter().all(|&j| j > 1));
    }

    #[test]
    fn test_redistribution_runs_when_due() {
        let mut config = config(40, 1000);
        config.redistribution.every = 2;
        config.redistribution.count = 5;
        let domain = Domain::new(0.0, 1.0, 0.0, 1.0, false, false).unwrap();
        let mask = FnMask(|p: DVec2| p.x > 0.8);
        let engine = RelaxationEngine::new(&config, &domain, &mask);
        let (mut sites, mut grid) = setup(&config, &domain, &mask);

        engine.prepare(&mut sites, &mut grid);
        let stats = engine.advance(0, &mut sites, &mut grid).unwrap();
        assert_eq!(stats.redistributed, 5);

        engine.prepare(&mut sites, &mut grid);
        let stats = engine.advance(1, &mut sites, &mut grid).unwrap();
        assert_eq!(stats.redistributed, 0);
    }

    #[test]
    fn test_sites_stay_out_of_convex_mask_holes() {
        // Excluding the right strip: centroids of admissible samples are admissible
        let config = config(60, 6000);
        let domain = Domain::new(0.0, 1.0, 0.0, 1.0, false, false).unwrap();
        let mask = FnMask(|p: DVec2| p.x > 0.6);
        let engine = RelaxationEngine::new(&config, &domain, &mask);
        let (mut sites, mut grid) = setup(&config, &domain, &mask);

        for k in 0..10 {
            engine.prepare(&mut sites, &mut grid);
            engine.advance(k, &mut sites, &mut grid).unwrap();
        }
        assert!(sites.positions().iter().all(|p| p.x <= 0.6 + 1e-9));
    }

    #[test]
    fn test_exhausted_mask_aborts_iteration() {
        let config = config(10, 100);
        let domain = Domain::new(0.0, 1.0, 0.0, 1.0, false, false).unwrap();
        let mask = FnMask(|_: DVec2| true);
        let engine = RelaxationEngine::new(&config, &domain, &mask);
        let mut sites = SiteSet::new(vec![DVec2::splat(0.5); 10]);
        let mut grid = SpatialGrid::new(&domain, 10, 2.01).unwrap();
        engine.prepare(&mut sites, &mut grid);
        assert!(engine.advance(0, &mut sites, &mut grid).is_err());
    }
}
