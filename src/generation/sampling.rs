//! Random streams and rejection sampling against the domain mask
//!
//! Every parallel task draws from its own ChaCha stream, keyed by the master
//! seed, an epoch and a lane. Work is split into fixed-size chunks rather than
//! per-thread pieces, so a run is reproducible for any thread count.

use glam::DVec2;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::domain::Domain;
use crate::error::{Result, SeederError};
use crate::mask::DomainMask;
use crate::site::SiteSet;

/// Points handled by one random stream
pub(crate) const CHUNK_SIZE: usize = 1024;

/// Epoch used by initial placement; relaxation iteration `k` uses `k + 1`
pub(crate) const PLACEMENT_EPOCH: u64 = 0;

/// Lane reserved for serial draws (redistribution); chunk `c` uses `c + 1`
pub(crate) const SERIAL_LANE: u64 = 0;

/// Independent random stream for one task
pub(crate) fn stream(seed: u64, epoch: u64, lane: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream((epoch << 32) ^ lane);
    rng
}

/// Draw a point uniformly from the domain until the mask reports it unoccupied
///
/// # Errors
///
/// Returns `MaskExhausted` after `max_attempts` occupied draws.
pub fn sample_unoccupied<R, M>(
    rng: &mut R,
    domain: &Domain,
    mask: &M,
    max_attempts: usize,
) -> Result<DVec2>
where
    R: Rng + ?Sized,
    M: DomainMask + ?Sized,
{
    let (min, max) = (domain.min(), domain.max());
    for _ in 0..max_attempts {
        let point = DVec2::new(rng.gen_range(min.x..max.x), rng.gen_range(min.y..max.y));
        if !mask.is_occupied(point) {
            return Ok(point);
        }
    }
    Err(SeederError::MaskExhausted {
        attempts: max_attempts,
    })
}

/// Place `count` sites uniformly over the unoccupied region
pub fn initial_placement<M>(
    seed: u64,
    count: usize,
    domain: &Domain,
    mask: &M,
    max_attempts: usize,
) -> Result<SiteSet>
where
    M: DomainMask + ?Sized,
{
    let chunks: Vec<Vec<DVec2>> = (0..count.div_ceil(CHUNK_SIZE))
        .into_par_iter()
        .map(|chunk| {
            let mut rng = stream(seed, PLACEMENT_EPOCH, chunk as u64 + 1);
            let len = CHUNK_SIZE.min(count - chunk * CHUNK_SIZE);
            (0..len)
                .map(|_| sample_unoccupied(&mut rng, domain, mask, max_attempts))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SiteSet::new(chunks.into_iter().flatten().collect()))
}

/// Move `count` sites, chosen uniformly over all site ids, to fresh unoccupied points
///
/// The same site may be picked more than once. Exposure counts are kept.
/// Returns the picked ids in draw order.
pub fn redistribute<R, M>(
    rng: &mut R,
    sites: &mut SiteSet,
    count: usize,
    domain: &Domain,
    mask: &M,
    max_attempts: usize,
) -> Result<Vec<usize>>
where
    R: Rng + ?Sized,
    M: DomainMask + ?Sized,
{
    let mut picked = Vec::with_capacity(count);
    for _ in 0..count {
        let id = rng.gen_range(0..sites.len());
        let point = sample_unoccupied(rng, domain, mask, max_attempts)?;
        sites.set_position(id, point);
        picked.push(id);
    }
    Ok(picked)
}
