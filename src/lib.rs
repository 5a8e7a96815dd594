//! Centroidal Voronoi seeding of masked 2D domains
//!
//! Distributes `N` sites quasi-uniformly over the unoccupied part of a 2D
//! domain, for seeding particle or mesh simulations. The admissible region
//! comes from a mask, usually a grayscale image, and either axis may be
//! periodic. Results include site positions, per-site volume estimates from
//! a label raster, and a lattice spacing picked from the radial distribution.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rust_voronoi_seeder::*;
//!
//! // Bright pixels are excluded
//! let field = DensityField::open("silhouette.png").unwrap();
//!
//! let config = SeederConfigBuilder::new()
//!     .seed(42)
//!     .site_count(5_000).unwrap()
//!     .iterations(200)
//!     .periodic(true, false)
//!     .build().unwrap();
//!
//! let domain = config.domain_for(field.width(), field.height()).unwrap();
//! let mask = field.into_mask(&domain);
//!
//! let result = seed_domain(config, domain, mask).unwrap();
//! println!("Suggested spacing {}", result.spacing());
//! ```
//!
//! # Features
//!
//! - `spatial-index` (default): exact nearest-site lookups on a finished result using a KD-tree
//! - `serde`: serialization support for configuration

// Modules
pub mod error;
pub mod config;
pub mod domain;
pub mod mask;
pub mod site;
pub mod grid;
pub mod generation;
pub mod analysis;
pub mod raster;
pub mod export;
pub mod seeder;

#[cfg(feature = "spatial-index")]
pub mod spatial;

// Re-export core types for convenience
pub use error::{SeederError, Result};
pub use config::{Bounds, Redistribution, RelaxationWeights, SeederConfig, SeederConfigBuilder};
pub use domain::Domain;
pub use mask::{DensityField, DomainMask, EmptyMask, FieldMask, FnMask};
pub use site::{Accumulators, SiteSet};
pub use grid::{NearestSite, SpatialGrid};
pub use generation::{seed_domain, IterationStats, RelaxationEngine};
pub use analysis::RadialDistribution;
pub use raster::{ConfigurationSummary, LabelRaster, SiteRecord};
pub use seeder::{MeshSeeder, SeedingResult};

#[cfg(feature = "spatial-index")]
pub use spatial::SiteIndex;

// Re-export glam::DVec2 for convenience
pub use glam::DVec2;
