//! Rectangular simulation domain with per-axis periodicity

use glam::DVec2;

use crate::error::{Result, SeederError};

/// Rectangle `[x0, x1] × [y0, y1]` with independent periodic flags per axis
///
/// Sites are relaxed inside the domain. On a periodic axis distances are
/// measured under the minimum-image convention and sites that drift across
/// a boundary are translated back in.
///
/// Only constructible through [`Domain::new`] or [`Domain::from_aspect`], so
/// every domain has finite bounds and positive extents. Configurations carry
/// plain [`Bounds`](crate::config::Bounds) instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    min: DVec2,
    max: DVec2,
    periodic_x: bool,
    periodic_y: bool,
}

impl Domain {
    /// Create a domain from its bounds
    ///
    /// # Arguments
    ///
    /// * `x0`, `x1` - Lower and upper x bounds
    /// * `y0`, `y1` - Lower and upper y bounds
    /// * `periodic_x`, `periodic_y` - Per-axis periodic flags
    ///
    /// # Example
    ///
    /// ```
    /// use rust_voronoi_seeder::{Domain, DVec2};
    ///
    /// let domain = Domain::new(-1.0, 1.0, 0.0, 0.5, true, false).unwrap();
    /// assert_eq!(domain.extent(), DVec2::new(2.0, 0.5));
    /// assert!(Domain::new(1.0, 0.0, 0.0, 1.0, false, false).is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `InvalidDomain` if a bound is not finite or an extent is not positive.
    pub fn new(
        x0: f64,
        x1: f64,
        y0: f64,
        y1: f64,
        periodic_x: bool,
        periodic_y: bool,
    ) -> Result<Self> {
        if ![x0, x1, y0, y1].iter().all(|v| v.is_finite()) {
            return Err(SeederError::InvalidDomain(format!(
                "bounds must be finite (got [{}, {}] x [{}, {}])",
                x0, x1, y0, y1
            )));
        }
        if x1 <= x0 || y1 <= y0 {
            return Err(SeederError::InvalidDomain(format!(
                "extents must be positive (got [{}, {}] x [{}, {}])",
                x0, x1, y0, y1
            )));
        }
        Ok(Self {
            min: DVec2::new(x0, y0),
            max: DVec2::new(x1, y1),
            periodic_x,
            periodic_y,
        })
    }

    /// Unit-width box `[0, 1] × [0, height/width]` matching an image's aspect ratio
    pub fn from_aspect(
        width: usize,
        height: usize,
        periodic_x: bool,
        periodic_y: bool,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SeederError::InvalidDomain(format!(
                "image dimensions must be positive (got {}x{})",
                width, height
            )));
        }
        Self::new(0.0, 1.0, 0.0, height as f64 / width as f64, periodic_x, periodic_y)
    }

    /// Lower corner `(x0, y0)`
    #[inline]
    pub fn min(&self) -> DVec2 {
        self.min
    }

    /// Upper corner `(x1, y1)`
    #[inline]
    pub fn max(&self) -> DVec2 {
        self.max
    }

    /// Extents `(DX, DY)`
    #[inline]
    pub fn extent(&self) -> DVec2 {
        self.max - self.min
    }

    /// Area `DX * DY`, always positive
    #[inline]
    pub fn area(&self) -> f64 {
        let e = self.extent();
        e.x * e.y
    }

    /// Whether the x axis wraps around
    #[inline]
    pub fn periodic_x(&self) -> bool {
        self.periodic_x
    }

    /// Whether the y axis wraps around
    #[inline]
    pub fn periodic_y(&self) -> bool {
        self.periodic_y
    }

    /// Translate a point back into the domain along its periodic axes
    ///
    /// A single period is added or subtracted; non-periodic axes are left as is.
    pub fn wrap(&self, mut point: DVec2) -> DVec2 {
        let extent = self.extent();
        if self.periodic_x {
            if point.x < self.min.x {
                point.x += extent.x;
            }
            if point.x >= self.max.x {
                point.x -= extent.x;
            }
        }
        if self.periodic_y {
            if point.y < self.min.y {
                point.y += extent.y;
            }
            if point.y >= self.max.y {
                point.y -= extent.y;
            }
        }
        point
    }

    /// Apply the minimum-image convention to an offset `a - b`
    ///
    /// Returns the adjusted offset together with the shift that was applied to
    /// it. Adding the shift to `a` gives the periodic image of `a` closest to `b`.
    pub fn minimum_image(&self, offset: DVec2) -> (DVec2, DVec2) {
        let extent = self.extent();
        let mut shift = DVec2::ZERO;
        if self.periodic_x {
            if offset.x > 0.5 * extent.x {
                shift.x = -extent.x;
            } else if offset.x < -0.5 * extent.x {
                shift.x = extent.x;
            }
        }
        if self.periodic_y {
            if offset.y > 0.5 * extent.y {
                shift.y = -extent.y;
            } else if offset.y < -0.5 * extent.y {
                shift.y = extent.y;
            }
        }
        (offset + shift, shift)
    }

    /// Squared minimum-image distance between two points
    #[inline]
    pub fn distance_squared(&self, a: DVec2, b: DVec2) -> f64 {
        self.minimum_image(a - b).0.length_squared()
    }
}
