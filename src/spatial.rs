//! Exact site lookup over finished positions
//!
//! This module is only available with the `spatial-index` feature.

use glam::DVec2;
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;

use crate::domain::Domain;

/// KD-tree over site positions, periodic images included
///
/// Unlike the relaxation grid, which only searches a 3×3 cell neighborhood,
/// this always returns the true nearest site. Along each periodic axis the
/// tree holds shifted copies of every site, so a query near one edge finds
/// sites across the opposite edge.
///
/// # Example
///
/// ```
/// use rust_voronoi_seeder::*;
///
/// # #[cfg(feature = "spatial-index")]
/// # {
/// let domain = Domain::new(0.0, 1.0, 0.0, 1.0, true, false).unwrap();
/// let sites = vec![DVec2::new(0.05, 0.5), DVec2::new(0.5, 0.5)];
///
/// let index = SiteIndex::new(&sites, &domain);
/// // Closer to site 0 across the periodic x boundary
/// assert_eq!(index.find_nearest(DVec2::new(0.95, 0.5)), 0);
/// # }
/// ```
#[derive(Clone)]
pub struct SiteIndex {
    tree: ImmutableKdTree<f64, usize, 2, 32>,
    domain: Domain,
    site_count: usize,
}

impl SiteIndex {
    /// Build the index over `positions`
    ///
    /// # Arguments
    ///
    /// * `positions` - Site positions; ids are their indices
    /// * `domain` - Domain whose periodic axes get shifted copies
    pub fn new(positions: &[DVec2], domain: &Domain) -> Self {
        let extent = domain.extent();
        let shifts = |periodic: bool, length: f64| {
            if periodic {
                vec![0.0, -length, length]
            } else {
                vec![0.0]
            }
        };

        let mut points: Vec<[f64; 2]> = Vec::new();
        for sx in shifts(domain.periodic_x(), extent.x) {
            for sy in shifts(domain.periodic_y(), extent.y) {
                points.extend(positions.iter().map(|p| [p.x + sx, p.y + sy]));
            }
        }

        Self {
            tree: ImmutableKdTree::new_from_slice(&points),
            domain: *domain,
            site_count: positions.len(),
        }
    }

    /// Id of the site closest to `point` under the minimum-image convention
    pub fn find_nearest(&self, point: DVec2) -> usize {
        let p = self.domain.wrap(point);
        let result = self.tree.nearest_one::<SquaredEuclidean>(&[p.x, p.y]);
        result.item % self.site_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn random_positions(domain: &Domain, n: usize, seed: u64) -> Vec<DVec2> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let (min, max) = (domain.min(), domain.max());
        (0..n)
            .map(|_| DVec2::new(rng.gen_range(min.x..max.x), rng.gen_range(min.y..max.y)))
            .collect()
    }

    fn brute_force(domain: &Domain, positions: &[DVec2], point: DVec2) -> usize {
        (0..positions.len())
            .min_by(|&a, &b| {
                domain
                    .distance_squared(point, positions[a])
                    .total_cmp(&domain.distance_squared(point, positions[b]))
            })
            .unwrap()
    }

    #[test]
    fn test_matches_brute_force() {
        for (px, py) in [(false, false), (true, false), (true, true)] {
            let domain = Domain::new(-1.0, 2.0, 0.0, 1.5, px, py).unwrap();
            let positions = random_positions(&domain, 300, 21);
            let index = SiteIndex::new(&positions, &domain);

            for q in random_positions(&domain, 500, 22) {
                assert_eq!(index.find_nearest(q), brute_force(&domain, &positions, q));
            }
        }
    }

    #[test]
    fn test_exact_match() {
        let domain = Domain::new(0.0, 10.0, 0.0, 10.0, false, false).unwrap();
        let centers = vec![DVec2::new(1.0, 1.0), DVec2::new(9.0, 3.0), DVec2::new(4.0, 8.0)];
        let index = SiteIndex::new(&centers, &domain);
        for (id, &c) in centers.iter().enumerate() {
            assert_eq!(index.find_nearest(c), id);
        }
    }

    #[test]
    fn test_periodic_corner() {
        let domain = Domain::new(0.0, 1.0, 0.0, 1.0, true, true).unwrap();
        let centers = vec![DVec2::new(0.02, 0.02), DVec2::new(0.5, 0.5), DVec2::new(0.8, 0.3)];
        let index = SiteIndex::new(&centers, &domain);
        assert_eq!(index.find_nearest(DVec2::new(0.98, 0.97)), 0);
        // Outside the box: wrapped before lookup
        assert_eq!(index.find_nearest(DVec2::new(1.01, -0.01)), 0);
    }
}
