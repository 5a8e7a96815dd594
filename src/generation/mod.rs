//! Core seeding algorithm
//!
//! Places sites uniformly over the unoccupied part of the domain, then
//! relaxes them toward a centroidal Voronoi tessellation with Monte-Carlo
//! Lloyd iterations.

pub mod lloyd;
pub mod sampling;

pub use lloyd::{IterationStats, RelaxationEngine};
pub use sampling::{initial_placement, redistribute, sample_unoccupied};

use crate::config::SeederConfig;
use crate::domain::Domain;
use crate::error::Result;
use crate::mask::DomainMask;
use crate::seeder::{MeshSeeder, SeedingResult};

/// Seed a masked domain from configuration in one call
///
/// Places the sites, runs every configured iteration and packages the result.
/// Use [`MeshSeeder`] directly for snapshots or step-by-step control.
///
/// # Errors
///
/// Returns `InvalidConfiguration` if the configuration is invalid or disagrees
/// with `domain`, and `MaskExhausted` if the mask leaves no room for sites.
pub fn seed_domain<M: DomainMask>(
    config: SeederConfig,
    domain: Domain,
    mask: M,
) -> Result<SeedingResult> {
    MeshSeeder::new(config, domain, mask)?.run()
}
