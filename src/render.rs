//! Capability seams for the heavyweight rendering steps.
//!
//! The conversions delegate all real document rendering to these traits:
//! a WordprocessingML exporter, a markup renderer and a slide rasterizer.
//! The crate ships pdf-writer/image backed implementations
//! ([`crate::PdfWmlExporter`], [`crate::PdfMarkupRenderer`],
//! [`crate::FlatRasterizer`]); callers with a higher-fidelity engine
//! plug it in through the `*_with` entry points.

use image::RgbImage;

use crate::error::Error;
use crate::model::{Markup, Slide, WmlPackage};

/// Renders a parsed WordprocessingML package to PDF bytes.
pub trait WmlExporter {
    fn export(&self, package: &WmlPackage) -> Result<Vec<u8>, Error>;
}

/// Renders a markup document to PDF bytes.
pub trait MarkupRenderer {
    fn render(&self, markup: &Markup) -> Result<Vec<u8>, Error>;
}

/// Rasterizes one slide at the given pixel dimensions.
pub trait SlideRasterizer {
    fn rasterize(&self, slide: &Slide, width: u32, height: u32) -> Result<RgbImage, Error>;
}
