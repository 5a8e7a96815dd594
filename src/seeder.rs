//! MeshSeeder main structure

use std::time::Instant;

use glam::DVec2;
use log::{info, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::analysis::RadialDistribution;
use crate::config::SeederConfig;
use crate::domain::Domain;
use crate::error::Result;
use crate::generation::lloyd::{IterationStats, RelaxationEngine};
use crate::generation::sampling;
use crate::grid::SpatialGrid;
use crate::mask::DomainMask;
use crate::raster::{ConfigurationSummary, LabelRaster, SiteRecord};
use crate::site::SiteSet;

#[cfg(feature = "spatial-index")]
use crate::spatial::SiteIndex;

/// A relaxation run over one masked domain
///
/// Owns the configuration, domain, mask, sites and spatial grid. Sites are
/// placed on construction; each [`step`](Self::step) runs one relaxation
/// iteration and [`finish`](Self::finish) produces the raster, the radial
/// distribution and the exported records.
///
/// # Examples
///
/// ```
/// use rust_voronoi_seeder::*;
///
/// let config = SeederConfigBuilder::new()
///     .seed(42)
///     .site_count(200).unwrap()
///     .samples_per_iteration(5_000).unwrap()
///     .iterations(10)
///     .image_resolution(100)
///     .build()
///     .unwrap();
/// let domain = Domain::new(0.0, 1.0, 0.0, 1.0, false, false).unwrap();
///
/// // Keep sites out of a disc in the middle
/// let mask = FnMask(|p: DVec2| p.distance(DVec2::splat(0.5)) < 0.2);
///
/// let mut seeder = MeshSeeder::new(config, domain, mask).unwrap();
/// seeder.relax().unwrap();
/// let result = seeder.finish().unwrap();
/// println!("suggested spacing: {}", result.spacing());
/// ```
pub struct MeshSeeder<M> {
    config: SeederConfig,
    domain: Domain,
    mask: M,
    sites: SiteSet,
    grid: SpatialGrid,
    /// Next iteration to run
    iteration: usize,
    /// Dedicated worker pool when `config.threads` is set
    pool: Option<ThreadPool>,
}

impl<M: DomainMask> MeshSeeder<M> {
    /// Validate the configuration and place every site
    ///
    /// # Errors
    ///
    /// Configuration errors, including a domain whose periodicity or bounds
    /// disagree with the configuration, and `MaskExhausted` when the mask
    /// leaves no room for initial placement, are reported here before any
    /// relaxation work.
    pub fn new(config: SeederConfig, domain: Domain, mask: M) -> Result<Self> {
        config.validate()?;
        config.check_domain(&domain)?;
        let grid = SpatialGrid::new(&domain, config.site_count, config.relaxation_spacing)?;
        let pool = config
            .threads
            .map(|n| ThreadPoolBuilder::new().num_threads(n).build())
            .transpose()?;

        let sites = run_in(pool.as_ref(), || {
            sampling::initial_placement(
                config.seed,
                config.site_count,
                &domain,
                &mask,
                config.max_sample_attempts,
            )
        })?;

        let (nx, ny) = grid.dimensions();
        info!(
            "placed {} sites in [{}, {}] x [{}, {}], grid {}x{}",
            sites.len(),
            domain.min().x,
            domain.max().x,
            domain.min().y,
            domain.max().y,
            nx,
            ny
        );

        Ok(Self {
            config,
            domain,
            mask,
            sites,
            grid,
            iteration: 0,
            pool,
        })
    }

    /// Configuration the run was created with
    #[inline]
    pub fn config(&self) -> &SeederConfig {
        &self.config
    }

    #[inline]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    #[inline]
    pub fn mask(&self) -> &M {
        &self.mask
    }

    /// Current site positions and exposure counts
    #[inline]
    pub fn sites(&self) -> &SiteSet {
        &self.sites
    }

    /// Relaxation grid; membership reflects the last rebuild
    #[inline]
    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// Number of iterations run so far
    #[inline]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Run one relaxation iteration
    pub fn step(&mut self) -> Result<IterationStats> {
        self.settle();
        self.advance()
    }

    /// Run the remaining configured iterations
    pub fn relax(&mut self) -> Result<()> {
        self.relax_with(|_, _| Ok(()))
    }

    /// Run the remaining iterations, handing a snapshot to `on_snapshot` when due
    ///
    /// Snapshots are taken after the grid rebuild and before sampling, so the
    /// snapshot for iteration `k` shows the sites as iteration `k` sees them.
    /// An error from the callback stops the run.
    pub fn relax_with<F>(&mut self, mut on_snapshot: F) -> Result<()>
    where
        F: FnMut(usize, &SeedingResult) -> Result<()>,
    {
        let start = Instant::now();
        let first = self.iteration;
        info!(
            "relaxing {} sites: iterations {}..{}, {} samples each",
            self.sites.len(),
            first,
            self.config.iterations,
            self.config.samples_per_iteration
        );

        let mut assigned = 0u64;
        while self.iteration < self.config.iterations {
            let k = self.iteration;
            self.settle();
            if self.config.snapshot_due(k) {
                let snapshot = self.collect()?;
                on_snapshot(k, &snapshot)?;
            }
            assigned += self.advance()?.assigned;
        }

        let run = self.iteration - first;
        let requested = (run * self.config.samples_per_iteration) as u64;
        if requested > assigned {
            warn!(
                "{} of {} samples found no site in their grid neighborhood",
                requested - assigned,
                requested
            );
        }
        info!("relaxation finished after {} iterations in {:?}", run, start.elapsed());
        Ok(())
    }

    /// Label raster of the current sites
    pub fn rasterize(&mut self) -> LabelRaster {
        self.settle();
        let (grid, positions, mask) = (&self.grid, self.sites.positions(), &self.mask);
        let resolution = self.config.image_resolution;
        run_in(self.pool.as_ref(), || {
            LabelRaster::render(grid, positions, mask, resolution)
        })
    }

    /// Radial distribution of the current sites
    ///
    /// The grid is coarsened to the analysis spacing for the pair search and
    /// restored to the relaxation spacing afterwards.
    pub fn analyze(&mut self) -> Result<RadialDistribution> {
        self.sites.wrap_into(&self.domain);
        let config = &self.config;
        let (grid, positions) = (&mut self.grid, self.sites.positions());
        run_in(self.pool.as_ref(), || -> Result<RadialDistribution> {
            grid.resize(config.site_count, config.analysis_spacing)?;
            grid.rebuild(positions);
            let rdf = RadialDistribution::compute(
                grid,
                positions,
                config.histogram_bins,
                config.cutoff_factor,
            );
            grid.resize(config.site_count, config.relaxation_spacing)?;
            grid.rebuild(positions);
            Ok(rdf)
        })
    }

    /// Rasterize, analyze and package the current sites
    pub fn finish(mut self) -> Result<SeedingResult> {
        self.settle();
        self.collect()
    }

    /// Relax to completion and finish
    pub fn run(mut self) -> Result<SeedingResult> {
        self.relax()?;
        self.finish()
    }

    /// Wrap sites back into the domain and rebuild grid membership
    fn settle(&mut self) {
        let engine = RelaxationEngine::new(&self.config, &self.domain, &self.mask);
        let (sites, grid) = (&mut self.sites, &mut self.grid);
        run_in(self.pool.as_ref(), || engine.prepare(sites, grid));
    }

    fn advance(&mut self) -> Result<IterationStats> {
        let engine = RelaxationEngine::new(&self.config, &self.domain, &self.mask);
        let (sites, grid) = (&mut self.sites, &mut self.grid);
        let k = self.iteration;
        let stats = run_in(self.pool.as_ref(), || engine.advance(k, sites, grid))?;
        self.iteration += 1;
        Ok(stats)
    }

    /// Expects sites settled since they last moved
    fn collect(&mut self) -> Result<SeedingResult> {
        let raster = self.rasterize();
        let rdf = self.analyze()?;

        let spacing = rdf.peak_spacing().unwrap_or_else(|| {
            let fallback = (self.domain.area() / self.sites.len() as f64).sqrt();
            warn!(
                "no site pairs within the {} cutoff; using mean spacing {}",
                rdf.cutoff(),
                fallback
            );
            fallback
        });

        let records = raster.records(
            self.sites.positions(),
            &self.domain,
            self.config.packing_efficiency,
        );
        let summary = ConfigurationSummary::new(self.sites.len(), spacing, &self.domain);

        #[cfg(feature = "spatial-index")]
        let site_index = SiteIndex::new(self.sites.positions(), &self.domain);

        Ok(SeedingResult {
            domain: self.domain,
            sites: self.sites.clone(),
            raster,
            rdf,
            records,
            summary,
            #[cfg(feature = "spatial-index")]
            site_index,
        })
    }
}

fn run_in<R, F>(pool: Option<&ThreadPool>, f: F) -> R
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    match pool {
        Some(pool) => pool.install(f),
        None => f(),
    }
}

/// Sites and everything derived from them at one point of a run
#[derive(Clone)]
pub struct SeedingResult {
    domain: Domain,
    sites: SiteSet,
    raster: LabelRaster,
    rdf: RadialDistribution,
    records: Vec<SiteRecord>,
    summary: ConfigurationSummary,

    #[cfg(feature = "spatial-index")]
    site_index: SiteIndex,
}

impl SeedingResult {
    #[inline]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    #[inline]
    pub fn sites(&self) -> &SiteSet {
        &self.sites
    }

    #[inline]
    pub fn positions(&self) -> &[DVec2] {
        self.sites.positions()
    }

    /// Label raster of the sites
    #[inline]
    pub fn raster(&self) -> &LabelRaster {
        &self.raster
    }

    /// Pair-distance histogram of the sites
    #[inline]
    pub fn rdf(&self) -> &RadialDistribution {
        &self.rdf
    }

    /// Per-site id, position and volume
    #[inline]
    pub fn records(&self) -> &[SiteRecord] {
        &self.records
    }

    /// Lattice summary for the configuration file
    #[inline]
    pub fn summary(&self) -> &ConfigurationSummary {
        &self.summary
    }

    /// Suggested lattice spacing
    #[inline]
    pub fn spacing(&self) -> f64 {
        self.summary.spacing
    }

    /// Site closest to a point, searched exactly (requires spatial-index feature)
    #[cfg(feature = "spatial-index")]
    pub fn find_site_at(&self, point: DVec2) -> usize {
        self.site_index.find_nearest(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RelaxationWeights, SeederConfigBuilder};
    use crate::error::SeederError;
    use crate::mask::{EmptyMask, FnMask};

    fn small_config(periodic: bool) -> SeederConfig {
        SeederConfigBuilder::new()
            .seed(42)
            .site_count(100)
            .unwrap()
            .samples_per_iteration(2_000)
            .unwrap()
            .iterations(5)
            .image_resolution(100)
            .periodic(periodic, periodic)
            .build()
            .unwrap()
    }

    fn unit_box(periodic: bool) -> Domain {
        Domain::new(0.0, 1.0, 0.0, 1.0, periodic, periodic).unwrap()
    }

    fn mean_nearest_distance(domain: &Domain, positions: &[DVec2]) -> f64 {
        let total: f64 = positions
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                positions
                    .iter()
                    .enumerate()
                    .filter(|&(k, _)| k != i)
                    .map(|(_, &q)| domain.distance_squared(p, q).sqrt())
                    .fold(f64::INFINITY, f64::min)
            })
            .sum();
        total / positions.len() as f64
    }

    #[test]
    fn test_four_sites_spread_to_mean_spacing() {
        let config = SeederConfigBuilder::new()
            .seed(7)
            .site_count(4)
            .unwrap()
            .samples_per_iteration(4_000)
            .unwrap()
            .iterations(300)
            .periodic(true, true)
            .build()
            .unwrap();
        assert_eq!(config.weights, RelaxationWeights::default());
        let domain = unit_box(true);

        let mut seeder = MeshSeeder::new(config, domain, EmptyMask).unwrap();
        seeder.relax().unwrap();
        assert_eq!(seeder.iteration(), 300);

        // Four sites on the periodic unit square settle on a square lattice
        let mean = mean_nearest_distance(&domain, seeder.sites().positions());
        assert!((mean - 0.5).abs() < 0.03, "mean nearest distance {}", mean);
    }

    #[test]
    fn test_fully_occupied_mask_fails_before_relaxation() {
        let mut config = small_config(false);
        config.max_sample_attempts = 100;
        let result = MeshSeeder::new(config, unit_box(false), FnMask(|_: DVec2| true));
        assert!(matches!(
            result,
            Err(SeederError::MaskExhausted { attempts: 100 })
        ));
    }

    #[test]
    fn test_invalid_configuration_is_rejected() {
        let mut config = small_config(false);
        config.site_count = 0;
        let result = MeshSeeder::new(config, unit_box(false), EmptyMask);
        assert!(matches!(result, Err(SeederError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_domain_must_match_configuration() {
        let config = SeederConfigBuilder::new()
            .seed(1)
            .site_count(10)
            .unwrap()
            .periodic(true, true)
            .bounds(0.0, 2.0, 0.0, 2.0)
            .unwrap()
            .build()
            .unwrap();

        let result = MeshSeeder::new(config.clone(), unit_box(false), EmptyMask);
        assert!(matches!(result, Err(SeederError::InvalidConfiguration(_))));

        // Right flags, wrong bounds
        let result = MeshSeeder::new(config.clone(), unit_box(true), EmptyMask);
        assert!(matches!(result, Err(SeederError::InvalidConfiguration(_))));

        let domain = config.domain_for(10, 10).unwrap();
        let seeder = MeshSeeder::new(config, domain, EmptyMask).unwrap();
        assert!(seeder.domain().periodic_x() && seeder.domain().periodic_y());
        assert_eq!(seeder.domain().max(), DVec2::new(2.0, 2.0));
    }

    #[test]
    fn test_step_advances_iteration() {
        let mut seeder = MeshSeeder::new(small_config(true), unit_box(true), EmptyMask).unwrap();
        let stats = seeder.step().unwrap();
        assert_eq!(stats.iteration, 0);
        assert_eq!(stats.assigned + stats.unassigned, 2_000);
        assert_eq!(seeder.iteration(), 1);

        // relax picks up where step left off
        seeder.relax().unwrap();
        assert_eq!(seeder.iteration(), 5);
    }

    #[test]
    fn test_snapshots_when_due() {
        let mut config = small_config(false);
        config.snapshot_every = Some(2);
        let mut seeder = MeshSeeder::new(config, unit_box(false), EmptyMask).unwrap();

        let mut seen = Vec::new();
        seeder
            .relax_with(|k, snapshot| {
                assert_eq!(snapshot.records().len(), 100);
                seen.push(k);
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![0, 2, 4]);
    }

    #[test]
    fn test_snapshot_error_stops_run() {
        let mut config = small_config(false);
        config.snapshot_every = Some(1);
        let mut seeder = MeshSeeder::new(config, unit_box(false), EmptyMask).unwrap();

        let result = seeder.relax_with(|k, _| {
            if k == 2 {
                return Err(SeederError::InvalidConfiguration("stop".into()));
            }
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(seeder.iteration(), 2);
    }

    #[test]
    fn test_finish_packages_result() {
        let config = small_config(false);
        let domain = Domain::new(0.0, 1.0, 0.0, 0.5, false, false).unwrap();
        let mask = FnMask(|p: DVec2| p.x > 0.8);
        let result = MeshSeeder::new(config, domain, mask).unwrap().run().unwrap();

        assert_eq!(result.records().len(), 100);
        assert_eq!(result.summary().site_count, 100);
        assert!(result.spacing() > 0.0);
        assert!(result.positions().iter().all(|p| p.x <= 0.8 + 1e-9));

        let raster = result.raster();
        assert!(raster.masked_pixels() > 0);
        let labelled: u64 = raster.areas().iter().sum();
        assert_eq!(labelled + raster.background_pixels(), raster.pixel_count());

        // Volumes cover the unmasked area
        let volume: f64 = result.records().iter().map(|r| r.volume).sum();
        let expected = 0.5 * labelled as f64 / raster.pixel_count() as f64;
        assert!((volume - expected).abs() < 1e-9);
    }

    #[test]
    fn test_thread_count_does_not_change_result() {
        let run = |threads: Option<usize>| {
            let mut config = small_config(true);
            config.threads = threads;
            config.redistribution.every = 2;
            config.redistribution.count = 3;
            let mut seeder = MeshSeeder::new(config, unit_box(true), EmptyMask).unwrap();
            seeder.relax().unwrap();
            seeder.sites().clone()
        };
        let reference = run(None);
        assert_eq!(run(Some(1)), reference);
        assert_eq!(run(Some(3)), reference);
    }

    #[test]
    fn test_analysis_restores_relaxation_grid() {
        let mut seeder = MeshSeeder::new(small_config(true), unit_box(true), EmptyMask).unwrap();
        let before = seeder.grid().dimensions();
        let rdf = seeder.analyze().unwrap();
        assert_eq!(seeder.grid().dimensions(), before);
        assert!(rdf.counts().iter().sum::<u64>() > 0);
    }

    #[cfg(feature = "spatial-index")]
    #[test]
    fn test_find_site_at() {
        let result = MeshSeeder::new(small_config(true), unit_box(true), EmptyMask)
            .unwrap()
            .run()
            .unwrap();
        for (id, &p) in result.positions().iter().enumerate().take(10) {
            assert_eq!(result.find_site_at(p), id);
        }
    }
}
