//! Label raster and per-site area estimates
//!
//! Every pixel of the output raster is either masked, orphaned (no site in
//! its grid neighborhood) or labelled with its nearest site. Pixel counts per
//! site give the area estimates that become per-site volumes.

use glam::DVec2;
use rayon::prelude::*;

use crate::domain::Domain;
use crate::grid::SpatialGrid;
use crate::mask::DomainMask;

/// Site id per pixel, row-major, row 0 at the domain's lower `y` bound
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRaster {
    width: usize,
    height: usize,
    labels: Vec<Option<usize>>,
    areas: Vec<u64>,
    masked_pixels: u64,
    orphan_pixels: u64,
}

impl LabelRaster {
    /// Rasterize the domain at `resolution` pixels per unit length
    ///
    /// The grid must have been rebuilt from `positions`.
    pub fn render<M>(grid: &SpatialGrid, positions: &[DVec2], mask: &M, resolution: usize) -> Self
    where
        M: DomainMask + ?Sized,
    {
        let domain = grid.domain();
        let extent = domain.extent();
        let width = ((extent.x * resolution as f64).round() as usize).max(1);
        let height = ((extent.y * resolution as f64).round() as usize).max(1);
        let pixel = extent / DVec2::new(width as f64, height as f64);

        let mut labels = vec![None; width * height];
        let (masked_pixels, orphan_pixels) = labels
            .par_chunks_mut(width)
            .enumerate()
            .map(|(row, line)| {
                let mut masked = 0u64;
                let mut orphan = 0u64;
                for (col, label) in line.iter_mut().enumerate() {
                    let point = domain.min() + DVec2::new(col as f64, row as f64) * pixel;
                    if mask.is_occupied(point) {
                        masked += 1;
                        continue;
                    }
                    match grid.nearest_site(positions, point) {
                        Some(hit) => *label = Some(hit.site),
                        None => orphan += 1,
                    }
                }
                (masked, orphan)
            })
            .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

        let mut areas = vec![0u64; positions.len()];
        for site in labels.iter().flatten() {
            areas[*site] += 1;
        }

        Self {
            width,
            height,
            labels,
            areas,
            masked_pixels,
            orphan_pixels,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn pixel_count(&self) -> u64 {
        (self.width * self.height) as u64
    }

    /// Label of pixel `(col, row)`; `None` for background
    #[inline]
    pub fn label(&self, col: usize, row: usize) -> Option<usize> {
        self.labels[row * self.width + col]
    }

    #[inline]
    pub fn labels(&self) -> &[Option<usize>] {
        &self.labels
    }

    /// Pixels labelled with each site
    #[inline]
    pub fn areas(&self) -> &[u64] {
        &self.areas
    }

    /// Pixels the mask reported occupied
    #[inline]
    pub fn masked_pixels(&self) -> u64 {
        self.masked_pixels
    }

    /// Unmasked pixels with no site in their grid neighborhood
    #[inline]
    pub fn orphan_pixels(&self) -> u64 {
        self.orphan_pixels
    }

    #[inline]
    pub fn background_pixels(&self) -> u64 {
        self.masked_pixels + self.orphan_pixels
    }

    /// Pixel containing a point, if it lies inside the raster
    pub fn pixel_of(&self, domain: &Domain, point: DVec2) -> Option<(usize, usize)> {
        let rel = (point - domain.min()) / domain.extent();
        let col = (rel.x * self.width as f64).floor();
        let row = (rel.y * self.height as f64).floor();
        if col < 0.0 || row < 0.0 || col >= self.width as f64 || row >= self.height as f64 {
            return None;
        }
        Some((col as usize, row as usize))
    }

    /// Per-site volume: area fraction of all pixels times domain area times `packing`
    pub fn volumes(&self, domain: &Domain, packing: f64) -> Vec<f64> {
        let scale = packing * domain.area() / self.pixel_count() as f64;
        self.areas.iter().map(|&a| a as f64 * scale).collect()
    }

    /// One record per site, in id order
    pub fn records(&self, positions: &[DVec2], domain: &Domain, packing: f64) -> Vec<SiteRecord> {
        positions
            .iter()
            .zip(self.volumes(domain, packing))
            .enumerate()
            .map(|(id, (&position, volume))| SiteRecord {
                id,
                position,
                volume,
            })
            .collect()
    }
}

/// Exported per-site row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiteRecord {
    pub id: usize,
    pub position: DVec2,
    pub volume: f64,
}

/// Lattice and box suggested for a downstream simulation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfigurationSummary {
    pub site_count: usize,
    pub spacing: f64,
    /// `[nx, ny, 1]`
    pub lattice_points: [usize; 3],
    /// `[x0, x1, y0, y1, -spacing/2, spacing/2]`
    pub boundaries: [f64; 6],
    /// `[px, py, 0]`
    pub periodic: [bool; 3],
}

impl ConfigurationSummary {
    pub fn new(site_count: usize, spacing: f64, domain: &Domain) -> Self {
        let extent = domain.extent();
        let (min, max) = (domain.min(), domain.max());
        Self {
            site_count,
            spacing,
            lattice_points: [
                (extent.x / spacing).floor() as usize,
                (extent.y / spacing).floor() as usize,
                1,
            ],
            boundaries: [
                min.x,
                max.x,
                min.y,
                max.y,
                -0.5 * spacing,
                0.5 * spacing,
            ],
            periodic: [domain.periodic_x(), domain.periodic_y(), false],
        }
    }
}
