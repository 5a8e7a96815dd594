//! Domain masks: occupancy queries over the domain
//!
//! The relaxation only ever asks one question of the input image: is this
//! continuous coordinate occupied? Anything answering it can drive seeding.

use std::path::Path;

use glam::DVec2;
use image::GrayImage;

use crate::domain::Domain;
use crate::error::{Result, SeederError};

/// Occupancy predicate over the domain
///
/// Occupied points are excluded: no site is ever placed there and no sample
/// drawn there contributes to a centroid. Implementations are queried from
/// many worker threads at once.
pub trait DomainMask: Sync {
    /// Whether the point is occupied (excluded from the admissible region)
    fn is_occupied(&self, point: DVec2) -> bool;
}

/// Mask with nothing occupied; the whole domain is admissible
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyMask;

impl DomainMask for EmptyMask {
    #[inline]
    fn is_occupied(&self, _point: DVec2) -> bool {
        false
    }
}

/// Mask defined by a closure
///
/// # Example
///
/// ```
/// use rust_voronoi_seeder::{DomainMask, FnMask, DVec2};
///
/// // Disc of radius 0.25 in the middle of the unit box is excluded
/// let mask = FnMask(|p: DVec2| p.distance(DVec2::splat(0.5)) < 0.25);
/// assert!(mask.is_occupied(DVec2::splat(0.5)));
/// assert!(!mask.is_occupied(DVec2::new(0.1, 0.1)));
/// ```
pub struct FnMask<F>(pub F);

impl<F> DomainMask for FnMask<F>
where
    F: Fn(DVec2) -> bool + Sync,
{
    #[inline]
    fn is_occupied(&self, point: DVec2) -> bool {
        (self.0)(point)
    }
}

/// Immutable 2D field of normalized intensities in `[0, 1]`
///
/// Stored row-major, row 0 at `y0`. Loaded once, read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityField {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl DensityField {
    /// Create a field from row-major intensities
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the dimensions are zero or do not
    /// match the number of values.
    pub fn new(width: usize, height: usize, values: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SeederError::InvalidConfiguration(format!(
                "density field dimensions must be positive (got {}x{})",
                width, height
            )));
        }
        if values.len() != width * height {
            return Err(SeederError::InvalidConfiguration(format!(
                "density field expects {} values (got {})",
                width * height,
                values.len()
            )));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    /// Normalize an 8-bit grayscale image into a field
    pub fn from_luma(image: &GrayImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        let values = image.pixels().map(|p| p.0[0] as f32 / 255.0).collect();
        Self::new(width as usize, height as usize, values)
    }

    /// Decode an image file into a field
    ///
    /// Colour images are converted to luminance first.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let image = image::open(path)?.into_luma8();
        Self::from_luma(&image)
    }

    /// Width in pixels
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Intensity of pixel `(col, row)`
    #[inline]
    pub fn intensity(&self, col: usize, row: usize) -> f32 {
        self.values[row * self.width + col]
    }

    /// Fraction of pixels with zero intensity
    pub fn free_fraction(&self) -> f64 {
        let free = self.values.iter().filter(|&&v| v <= 0.0).count();
        free as f64 / self.values.len() as f64
    }

    /// Stretch the field over a domain, producing a mask
    pub fn into_mask(self, domain: &Domain) -> FieldMask {
        let pixel_size = domain.extent() / DVec2::new(self.width as f64, self.height as f64);
        FieldMask {
            origin: domain.min(),
            pixel_size,
            field: self,
        }
    }
}

/// Density field mapped onto a domain
///
/// A point is occupied iff the intensity of the pixel under it is > 0.
/// Pixel size is `DX/width` by `DY/height`; lookups outside the field clamp
/// to the nearest edge pixel.
#[derive(Debug, Clone)]
pub struct FieldMask {
    field: DensityField,
    origin: DVec2,
    pixel_size: DVec2,
}

impl FieldMask {
    /// Underlying intensity field
    pub fn field(&self) -> &DensityField {
        &self.field
    }

    /// Per-axis pixel size `(dx, dy)`
    pub fn pixel_size(&self) -> DVec2 {
        self.pixel_size
    }

    fn pixel_of(&self, point: DVec2) -> (usize, usize) {
        let rel = (point - self.origin) / self.pixel_size;
        let col = (rel.x.floor().max(0.0) as usize).min(self.field.width - 1);
        let row = (rel.y.floor().max(0.0) as usize).min(self.field.height - 1);
        (col, row)
    }
}

impl DomainMask for FieldMask {
    fn is_occupied(&self, point: DVec2) -> bool {
        let (col, row) = self.pixel_of(point);
        self.field.intensity(col, row) > 0.0
    }
}
