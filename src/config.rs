//! Seeding Configuration and Builder
//!
//! This module provides configuration types for deterministic domain seeding.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::error::{Result, SeederError};

/// Weights of the damped centroid update
///
/// After `j` updates a site moves to
/// `((alpha1*j + beta1) * x + (alpha2*j + beta2) * u) / W`, where `u` is the
/// mean of the samples assigned to it and `W` is the total weight
/// `(alpha1 + alpha2)*j + beta1 + beta2`. For the usual convex families
/// (`alpha1 + alpha2 = 1`, `beta1 + beta2 = 1`) `W = j + 1`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelaxationWeights {
    pub alpha1: f64,
    pub alpha2: f64,
    pub beta1: f64,
    pub beta2: f64,
}

impl RelaxationWeights {
    /// Weights `(old, centroid)` for a site with exposure count `j`
    #[inline]
    pub fn blend(&self, j: f64) -> (f64, f64) {
        (self.alpha1 * j + self.beta1, self.alpha2 * j + self.beta2)
    }

    fn validate(&self) -> Result<()> {
        let all = [self.alpha1, self.alpha2, self.beta1, self.beta2];
        if !all.iter().all(|w| w.is_finite() && *w >= 0.0) {
            return Err(SeederError::InvalidConfiguration(format!(
                "relaxation weights must be finite and non-negative (got {:?})",
                self
            )));
        }
        if all.iter().sum::<f64>() <= 0.0 {
            return Err(SeederError::InvalidConfiguration(
                "relaxation weights must not all be zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RelaxationWeights {
    /// Running mean: the new position is `(j*x + u) / (j + 1)`
    fn default() -> Self {
        Self {
            alpha1: 1.0,
            alpha2: 0.0,
            beta1: 0.0,
            beta2: 1.0,
        }
    }
}

/// Periodic reseeding of random sites
///
/// Every `every` iterations, `count` sites picked uniformly at random are moved
/// to fresh unoccupied points. Helps sites trapped in small pockets escape.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Redistribution {
    pub every: usize,
    pub count: usize,
}

impl Redistribution {
    /// Whether redistribution runs at this iteration
    #[inline]
    pub fn is_due(&self, iteration: usize) -> bool {
        self.every > 0 && self.count > 0 && iteration % self.every == 0
    }
}

/// Explicit domain bounds
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
}

/// Configuration for deterministic domain seeding
///
/// The same configuration, domain and mask always produce the same sites,
/// independent of the number of worker threads.
///
/// # Example
///
/// ```rust
/// use rust_voronoi_seeder::*;
///
/// let config = SeederConfigBuilder::new()
///     .seed(42)
///     .site_count(500).unwrap()
///     .iterations(50)
///     .periodic(true, true)
///     .build()
///     .unwrap();
///
/// # #[cfg(feature = "serde")]
/// # {
/// let json = serde_json::to_string(&config).unwrap();
/// let restored: SeederConfig = serde_json::from_str(&json).unwrap();
/// assert_eq!(config, restored);
/// # }
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SeederConfig {
    /// Master seed for every random stream used by the run
    pub seed: u64,

    /// Number of sites `N`
    pub site_count: usize,

    /// Random samples drawn per iteration (`q`)
    pub samples_per_iteration: usize,

    /// Number of relaxation iterations; there is no early stop
    pub iterations: usize,

    pub weights: RelaxationWeights,

    pub redistribution: Redistribution,

    pub periodic_x: bool,
    pub periodic_y: bool,

    /// Domain bounds; `None` derives a unit-width box from the image aspect
    pub bounds: Option<Bounds>,

    /// Grid cell size as a multiple of the mean site spacing during relaxation
    pub relaxation_spacing: f64,

    /// Grid cell size multiple used for the radial distribution analysis
    ///
    /// Larger than `relaxation_spacing` so the pair search reaches further.
    pub analysis_spacing: f64,

    /// Number of radial distribution bins
    pub histogram_bins: usize,

    /// Radial distribution cutoff as a multiple of the analysis cell width
    pub cutoff_factor: f64,

    /// Rejection sampling budget per point before giving up
    pub max_sample_attempts: usize,

    /// Output raster pixels per unit length
    pub image_resolution: usize,

    /// Emit a diagnostic snapshot every this many iterations
    pub snapshot_every: Option<usize>,

    /// Worker threads; `None` uses the global rayon pool
    pub threads: Option<usize>,

    /// Packing correction applied to per-site volumes (1.0 = none)
    pub packing_efficiency: f64,
}

impl SeederConfig {
    /// Check every field
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` describing the first offending field, or
    /// `InvalidDomain` if explicit bounds do not form a non-empty rectangle.
    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: String) -> Result<()> {
            Err(SeederError::InvalidConfiguration(msg))
        }

        if self.site_count == 0 {
            return invalid("site count must be positive".into());
        }
        if self.samples_per_iteration == 0 {
            return invalid("samples per iteration must be positive".into());
        }
        self.weights.validate()?;
        if self.redistribution.count > 0 && self.redistribution.every == 0 {
            return invalid(format!(
                "redistributing {} sites requires a positive frequency",
                self.redistribution.count
            ));
        }
        for (name, value) in [
            ("relaxation spacing", self.relaxation_spacing),
            ("analysis spacing", self.analysis_spacing),
            ("cutoff factor", self.cutoff_factor),
            ("packing efficiency", self.packing_efficiency),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return invalid(format!("{} must be positive (got {})", name, value));
            }
        }
        if self.histogram_bins == 0 {
            return invalid("histogram bins must be positive".into());
        }
        if self.max_sample_attempts == 0 {
            return invalid("sample attempt budget must be positive".into());
        }
        if self.image_resolution == 0 {
            return invalid("image resolution must be positive".into());
        }
        if self.snapshot_every == Some(0) {
            return invalid("snapshot frequency must be positive".into());
        }
        if self.threads == Some(0) {
            return invalid("thread count must be positive".into());
        }
        if let Some(b) = self.bounds {
            Domain::new(b.x0, b.x1, b.y0, b.y1, false, false)?;
        }
        Ok(())
    }

    /// Build the domain for a mask of `width × height` pixels
    ///
    /// Uses the configured bounds if set, otherwise `[0, 1] × [0, height/width]`.
    pub fn domain_for(&self, width: usize, height: usize) -> Result<Domain> {
        match self.bounds {
            Some(b) => Domain::new(b.x0, b.x1, b.y0, b.y1, self.periodic_x, self.periodic_y),
            None => Domain::from_aspect(width, height, self.periodic_x, self.periodic_y),
        }
    }

    /// Check that a domain agrees with the configured periodicity and bounds
    ///
    /// # Arguments
    ///
    /// * `domain` - Domain the run will use, usually from [`domain_for`](Self::domain_for)
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if a periodic flag differs, or if explicit
    /// bounds are configured and the domain does not span exactly those bounds.
    pub fn check_domain(&self, domain: &Domain) -> Result<()> {
        if domain.periodic_x() != self.periodic_x || domain.periodic_y() != self.periodic_y {
            return Err(SeederError::InvalidConfiguration(format!(
                "domain periodicity [{}, {}] does not match configured [{}, {}]",
                domain.periodic_x(),
                domain.periodic_y(),
                self.periodic_x,
                self.periodic_y
            )));
        }
        if let Some(b) = self.bounds {
            let (min, max) = (domain.min(), domain.max());
            if [min.x, max.x, min.y, max.y] != [b.x0, b.x1, b.y0, b.y1] {
                return Err(SeederError::InvalidConfiguration(format!(
                    "domain [{}, {}] x [{}, {}] does not match configured bounds [{}, {}] x [{}, {}]",
                    min.x, max.x, min.y, max.y, b.x0, b.x1, b.y0, b.y1
                )));
            }
        }
        Ok(())
    }

    /// Whether a diagnostic snapshot is due at this iteration
    #[inline]
    pub fn snapshot_due(&self, iteration: usize) -> bool {
        self.snapshot_every
            .map_or(false, |every| iteration % every == 0)
    }
}

impl Default for SeederConfig {
    fn default() -> Self {
        SeederConfigBuilder::new().build().unwrap()
    }
}

/// Builder for creating SeederConfig with validation
///
/// # Example
///
/// ```rust
/// use rust_voronoi_seeder::*;
///
/// let config = SeederConfigBuilder::new()
///     .seed(7)
///     .site_count(2_000).unwrap()
///     .samples_per_iteration(200_000).unwrap()
///     .weights(RelaxationWeights { alpha1: 0.5, alpha2: 0.5, beta1: 0.5, beta2: 0.5 }).unwrap()
///     .redistribution(10, 5).unwrap()
///     .build()
///     .unwrap();
/// assert_eq!(config.site_count, 2_000);
/// ```
#[derive(Debug, Clone)]
pub struct SeederConfigBuilder {
    seed: Option<u64>,
    config: SeederConfig,
}

impl SeederConfigBuilder {
    /// Create a new builder with default values
    ///
    /// Defaults:
    /// - seed: Random
    /// - site_count: 1000
    /// - samples_per_iteration: 100,000
    /// - iterations: 100
    /// - weights: running mean (`alpha1 = 1, beta2 = 1`)
    /// - redistribution: disabled
    /// - non-periodic, bounds from image aspect
    /// - relaxation/analysis spacing: 2.01 / 4.01
    /// - 300 histogram bins, cutoff 1.6 cells
    /// - image_resolution: 500
    pub fn new() -> Self {
        Self {
            seed: None,
            config: SeederConfig {
                seed: 0,
                site_count: 1000,
                samples_per_iteration: 100_000,
                iterations: 100,
                weights: RelaxationWeights::default(),
                redistribution: Redistribution::default(),
                periodic_x: false,
                periodic_y: false,
                bounds: None,
                relaxation_spacing: 2.01,
                analysis_spacing: 4.01,
                histogram_bins: 300,
                cutoff_factor: 1.6,
                max_sample_attempts: 100_000,
                image_resolution: 500,
                snapshot_every: None,
                threads: None,
                packing_efficiency: 1.0,
            },
        }
    }

    /// Set the master random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the number of sites
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `count` is zero
    pub fn site_count(mut self, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(SeederError::InvalidConfiguration(
                "site count must be positive".into(),
            ));
        }
        self.config.site_count = count;
        Ok(self)
    }

    /// Set the number of samples drawn per iteration
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `samples` is zero
    pub fn samples_per_iteration(mut self, samples: usize) -> Result<Self> {
        if samples == 0 {
            return Err(SeederError::InvalidConfiguration(
                "samples per iteration must be positive".into(),
            ));
        }
        self.config.samples_per_iteration = samples;
        Ok(self)
    }

    /// Set the number of relaxation iterations
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.config.iterations = iterations;
        self
    }

    /// Set the centroid update weights
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for negative, non-finite or all-zero weights
    pub fn weights(mut self, weights: RelaxationWeights) -> Result<Self> {
        weights.validate()?;
        self.config.weights = weights;
        Ok(self)
    }

    /// Reseed `count` random sites every `every` iterations
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `count > 0` and `every == 0`
    pub fn redistribution(mut self, every: usize, count: usize) -> Result<Self> {
        let redistribution = Redistribution { every, count };
        if count > 0 && every == 0 {
            return Err(SeederError::InvalidConfiguration(format!(
                "redistributing {} sites requires a positive frequency",
                count
            )));
        }
        self.config.redistribution = redistribution;
        Ok(self)
    }

    /// Set the periodic flags per axis
    pub fn periodic(mut self, x: bool, y: bool) -> Self {
        self.config.periodic_x = x;
        self.config.periodic_y = y;
        self
    }

    /// Use explicit domain bounds instead of the image aspect box
    ///
    /// # Errors
    ///
    /// Returns `InvalidDomain` if the bounds do not describe a non-empty rectangle
    pub fn bounds(mut self, x0: f64, x1: f64, y0: f64, y1: f64) -> Result<Self> {
        Domain::new(x0, x1, y0, y1, false, false)?;
        self.config.bounds = Some(Bounds { x0, x1, y0, y1 });
        Ok(self)
    }

    /// Set the grid spacing multipliers for relaxation and analysis
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if either multiplier is not positive
    pub fn grid_spacing(mut self, relaxation: f64, analysis: f64) -> Result<Self> {
        if !(relaxation > 0.0 && analysis > 0.0) {
            return Err(SeederError::InvalidConfiguration(format!(
                "spacing multipliers must be positive (got {} and {})",
                relaxation, analysis
            )));
        }
        self.config.relaxation_spacing = relaxation;
        self.config.analysis_spacing = analysis;
        Ok(self)
    }

    /// Set the radial distribution histogram bin count
    pub fn histogram_bins(mut self, bins: usize) -> Self {
        self.config.histogram_bins = bins;
        self
    }

    /// Set the rejection sampling budget per point
    pub fn max_sample_attempts(mut self, attempts: usize) -> Self {
        self.config.max_sample_attempts = attempts;
        self
    }

    /// Set the output raster resolution (pixels per unit length)
    pub fn image_resolution(mut self, resolution: usize) -> Self {
        self.config.image_resolution = resolution;
        self
    }

    /// Emit a diagnostic snapshot every `every` iterations
    pub fn snapshot_every(mut self, every: usize) -> Self {
        self.config.snapshot_every = Some(every);
        self
    }

    /// Run on a dedicated pool with this many worker threads
    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = Some(threads);
        self
    }

    /// Set the packing correction applied to volumes
    pub fn packing_efficiency(mut self, efficiency: f64) -> Self {
        self.config.packing_efficiency = efficiency;
        self
    }

    /// Build the configuration
    ///
    /// If no seed was provided, a random one is drawn.
    pub fn build(self) -> Result<SeederConfig> {
        let mut config = self.config;
        config.seed = self.seed.unwrap_or_else(rand::random);
        config.validate()?;
        Ok(config)
    }
}

impl Default for SeederConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
