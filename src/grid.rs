//! Uniform cell grid for nearest-site queries
//!
//! Partitions the domain into `nx × ny` cells sized so that each holds roughly
//! one site at the configured spacing multiplier. Every cell keeps a
//! precomputed list of its up-to-8 neighbors (wrapped on periodic axes,
//! clipped on the others) and the ids of the sites currently inside it.
//!
//! Membership is rebuilt wholesale from the site positions; it is never
//! updated incrementally, so call [`SpatialGrid::rebuild`] after sites move.

use glam::DVec2;
use rayon::prelude::*;

use crate::domain::Domain;
use crate::error::{Result, SeederError};

/// Closest site found by [`SpatialGrid::nearest_site`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestSite {
    /// Site id
    pub site: usize,
    /// Squared minimum-image distance
    pub distance_squared: f64,
    /// The query point, shifted into the site's periodic frame
    ///
    /// Equal to the query point unless a periodic wrap was needed to reach
    /// the site. Accumulating this keeps centroids consistent near boundaries.
    pub image: DVec2,
}

/// Uniform spatial grid over a [`Domain`]
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    domain: Domain,
    nx: usize,
    ny: usize,
    cell_size: DVec2,
    neighbors: Vec<Vec<usize>>,
    members: Vec<Vec<usize>>,
}

impl SpatialGrid {
    /// Build a grid for `site_count` sites with cells `spacing` times the mean site spacing
    ///
    /// # Arguments
    ///
    /// * `domain` - Domain to partition
    /// * `site_count` - Number of sites the grid will hold
    /// * `spacing` - Cell size as a multiple of `sqrt(area / site_count)`
    ///
    /// # Example
    ///
    /// ```
    /// use rust_voronoi_seeder::{Domain, SpatialGrid, DVec2};
    ///
    /// let domain = Domain::new(0.0, 1.0, 0.0, 1.0, true, true).unwrap();
    /// let positions = vec![DVec2::new(0.1, 0.1), DVec2::new(0.9, 0.9)];
    /// let mut grid = SpatialGrid::new(&domain, positions.len(), 1.0).unwrap();
    /// grid.rebuild(&positions);
    ///
    /// let hit = grid.nearest_site(&positions, DVec2::new(0.12, 0.08)).unwrap();
    /// assert_eq!(hit.site, 0);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `site_count` is zero or `spacing` is not positive.
    pub fn new(domain: &Domain, site_count: usize, spacing: f64) -> Result<Self> {
        let mut grid = Self {
            domain: *domain,
            nx: 0,
            ny: 0,
            cell_size: domain.extent(),
            neighbors: Vec::new(),
            members: Vec::new(),
        };
        grid.resize(site_count, spacing)?;
        Ok(grid)
    }

    /// Recompute the cell counts for a new spacing multiplier
    ///
    /// Neighbor lists are rebuilt only when the cell counts change. Membership
    /// is cleared in that case and must be rebuilt before querying.
    pub fn resize(&mut self, site_count: usize, spacing: f64) -> Result<()> {
        let (nx, ny) = cell_counts(&self.domain, site_count, spacing)?;
        if (nx, ny) == (self.nx, self.ny) {
            return Ok(());
        }
        self.nx = nx;
        self.ny = ny;
        self.cell_size = self.domain.extent() / DVec2::new(nx as f64, ny as f64);
        self.neighbors = build_neighbors(nx, ny, self.domain.periodic_x(), self.domain.periodic_y());
        self.members = vec![Vec::new(); nx * ny];
        Ok(())
    }

    /// Cell counts `(nx, ny)`
    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    /// Total number of cells `nx * ny`
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.nx * self.ny
    }

    /// Cell width and height
    #[inline]
    pub fn cell_size(&self) -> DVec2 {
        self.cell_size
    }

    /// Domain the grid covers, including its periodic flags
    #[inline]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Cell containing a point
    ///
    /// Fractional cell coordinates are clamped to the valid range, so points
    /// on or past the upper boundary land in the last cell. This is not a
    /// periodic wrap.
    pub fn locate(&self, point: DVec2) -> usize {
        let rel = (point - self.domain.min()) / self.cell_size;
        let ix = (rel.x.floor().max(0.0) as usize).min(self.nx - 1);
        let iy = (rel.y.floor().max(0.0) as usize).min(self.ny - 1);
        iy + self.ny * ix
    }

    /// Precomputed neighbor cells, excluding the cell itself
    #[inline]
    pub fn neighbors(&self, cell: usize) -> &[usize] {
        &self.neighbors[cell]
    }

    /// Sites currently inside a cell
    #[inline]
    pub fn members(&self, cell: usize) -> &[usize] {
        &self.members[cell]
    }

    /// Replace all cell membership with the given site positions
    pub fn rebuild(&mut self, positions: &[DVec2]) {
        let cells: Vec<usize> = positions.par_iter().map(|&p| self.locate(p)).collect();
        for list in &mut self.members {
            list.clear();
        }
        for (site, cell) in cells.into_iter().enumerate() {
            self.members[cell].push(site);
        }
    }

    /// Find the closest site to a point
    ///
    /// Only the point's own cell and its neighbor cells are searched, so a
    /// site further than one cell away can be missed. Ties keep the first
    /// site found. Returns `None` when the neighborhood holds no site.
    pub fn nearest_site(&self, positions: &[DVec2], point: DVec2) -> Option<NearestSite> {
        let cell = self.locate(point);
        let mut best: Option<NearestSite> = None;

        for &c in std::iter::once(&cell).chain(self.neighbors[cell].iter()) {
            for &site in &self.members[c] {
                let (offset, shift) = self.domain.minimum_image(point - positions[site]);
                let d2 = offset.length_squared();
                if best.map_or(true, |b| d2 < b.distance_squared) {
                    best = Some(NearestSite {
                        site,
                        distance_squared: d2,
                        image: point + shift,
                    });
                }
            }
        }

        best
    }

    /// Visit every site in a cell's 3×3 neighborhood
    pub(crate) fn for_each_candidate<F: FnMut(usize)>(&self, cell: usize, mut f: F) {
        for &c in std::iter::once(&cell).chain(self.neighbors[cell].iter()) {
            for &site in &self.members[c] {
                f(site);
            }
        }
    }
}

/// Cell counts for a target of one site per `spacing`-scaled cell
///
/// Degenerate counts clamp to one cell per axis.
fn cell_counts(domain: &Domain, site_count: usize, spacing: f64) -> Result<(usize, usize)> {
    if site_count == 0 {
        return Err(SeederError::InvalidConfiguration(
            "grid requires at least one site".into(),
        ));
    }
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(SeederError::InvalidConfiguration(format!(
            "grid spacing multiplier must be positive (got {})",
            spacing
        )));
    }
    let extent = domain.extent();
    let density = site_count as f64 / domain.area();
    let base_nx = ((density.sqrt() * extent.x) as usize).max(1);
    let cell = spacing * extent.x / base_nx as f64;
    let nx = ((extent.x / cell).floor() as usize).max(1);
    let ny = ((extent.y / cell).floor() as usize).max(1);
    Ok((nx, ny))
}

fn build_neighbors(nx: usize, ny: usize, periodic_x: bool, periodic_y: bool) -> Vec<Vec<usize>> {
    let wrap = |i: isize, n: usize, periodic: bool| -> Option<usize> {
        if i < 0 {
            periodic.then(|| n - 1)
        } else if i >= n as isize {
            periodic.then_some(0)
        } else {
            Some(i as usize)
        }
    };

    let mut neighbors = vec![Vec::new(); nx * ny];
    for ix in 0..nx {
        for iy in 0..ny {
            let id = iy + ny * ix;
            let list = &mut neighbors[id];
            for dx in -1..=1isize {
                let Some(jx) = wrap(ix as isize + dx, nx, periodic_x) else {
                    continue;
                };
                for dy in -1..=1isize {
                    let Some(jy) = wrap(iy as isize + dy, ny, periodic_y) else {
                        continue;
                    };
                    let other = jy + ny * jx;
                    if other != id {
                        list.push(other);
                    }
                }
            }
            // Small periodic grids reach the same cell from both sides
            list.sort_unstable();
            list.dedup();
        }
    }
    neighbors
}
