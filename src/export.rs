//! Output file writers
//!
//! Plain text formats read by the downstream particle simulation, plus a
//! 16-bit label image for inspection.

use std::io::{Seek, Write};
use std::path::Path;

use glam::DVec2;
use image::{ImageBuffer, ImageFormat, Luma};
use log::warn;

use crate::analysis::RadialDistribution;
use crate::domain::Domain;
use crate::error::Result;
use crate::raster::{ConfigurationSummary, LabelRaster, SiteRecord};

/// Pixel value marking a site position in the label image
pub const SITE_MARKER: u16 = u16::MAX;

/// 16-bit label image type
pub type LabelImage = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Point file: site count, a column comment, then `id x y z volume` rows
pub fn write_points<W: Write>(mut out: W, records: &[SiteRecord]) -> Result<()> {
    writeln!(out, "{}", records.len())?;
    writeln!(out, "# id x y z volume")?;
    for record in records {
        writeln!(
            out,
            "{}\t{}\t{}\t0\t{}",
            record.id, record.position.x, record.position.y, record.volume
        )?;
    }
    out.flush()?;
    Ok(())
}

/// Histogram file: `radius density` per bin, bin 0 omitted
pub fn write_histogram<W: Write>(mut out: W, rdf: &RadialDistribution) -> Result<()> {
    for (radius, density) in rdf.profile() {
        writeln!(out, "{}\t{}", radius, density)?;
    }
    out.flush()?;
    Ok(())
}

/// Configuration file with reals in 5-digit scientific notation
pub fn write_configuration<W: Write>(mut out: W, summary: &ConfigurationSummary) -> Result<()> {
    let flag = |b: bool| if b { 1 } else { 0 };
    let [nx, ny, nz] = summary.lattice_points;
    let [px, py, pz] = summary.periodic;

    writeln!(out, "nParticles = {}", summary.site_count)?;
    writeln!(out, "spacing = {}", scientific(summary.spacing))?;
    writeln!(out, "latticePoints = [{}, {}, {}]", nx, ny, nz)?;
    writeln!(
        out,
        "boundaries = [{}]",
        summary
            .boundaries
            .iter()
            .map(|&b| scientific(b))
            .collect::<Vec<_>>()
            .join(", ")
    )?;
    writeln!(out, "periodic = [{}, {}, {}]", flag(px), flag(py), flag(pz))?;
    out.flush()?;
    Ok(())
}

/// Pixel value of site `id` in the label image
///
/// Site 65534 shares [`SITE_MARKER`] and later ids wrap back to 1, so labels
/// are only unambiguous below 65535 sites.
#[inline]
pub fn site_label(id: usize) -> u16 {
    (id % SITE_MARKER as usize) as u16 + 1
}

/// Label image: background 0, site `i` as [`site_label`], site positions marked
pub fn label_image(raster: &LabelRaster, positions: &[DVec2], domain: &Domain) -> LabelImage {
    if positions.len() >= SITE_MARKER as usize {
        warn!(
            "{} sites do not fit the {} unambiguous labels of a 16-bit image",
            positions.len(),
            SITE_MARKER - 1
        );
    }
    let mut img = LabelImage::from_fn(raster.width() as u32, raster.height() as u32, |x, y| {
        let value = raster
            .label(x as usize, y as usize)
            .map_or(0, site_label);
        Luma([value])
    });
    for &p in positions {
        if let Some((col, row)) = raster.pixel_of(domain, p) {
            img.put_pixel(col as u32, row as u32, Luma([SITE_MARKER]));
        }
    }
    img
}

/// Encode the label image as PNG
pub fn write_label_image<W: Write + Seek>(
    out: &mut W,
    raster: &LabelRaster,
    positions: &[DVec2],
    domain: &Domain,
) -> Result<()> {
    label_image(raster, positions, domain).write_to(out, ImageFormat::Png)?;
    Ok(())
}

/// Save the label image, format chosen by extension
pub fn save_label_image<P: AsRef<Path>>(
    path: P,
    raster: &LabelRaster,
    positions: &[DVec2],
    domain: &Domain,
) -> Result<()> {
    label_image(raster, positions, domain).save(path)?;
    Ok(())
}

/// `1.50000e-02` style: five fractional digits, signed two-digit exponent
fn scientific(value: f64) -> String {
    let formatted = format!("{:.5e}", value);
    match formatted.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => formatted,
    }
}
