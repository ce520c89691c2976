use image::{Rgb, RgbImage};

use crate::error::Error;
use crate::model::Slide;
use crate::render::SlideRasterizer;

/// Built-in slide rasterizer: a flat canvas in the slide's declared
/// background color (white when none is declared). Shape and text
/// artwork is the domain of a real rendering engine; page geometry is
/// what this one guarantees.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlatRasterizer;

impl SlideRasterizer for FlatRasterizer {
    fn rasterize(&self, slide: &Slide, width: u32, height: u32) -> Result<RgbImage, Error> {
        if width == 0 || height == 0 {
            return Err(Error::Render(format!(
                "slide {} has a degenerate page size {width}x{height}",
                slide.number
            )));
        }
        let [r, g, b] = slide.background.unwrap_or([0xFF, 0xFF, 0xFF]);
        Ok(RgbImage::from_pixel(width, height, Rgb([r, g, b])))
    }
}
