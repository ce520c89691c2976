use std::path::PathBuf;

use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

/// Core document properties from `docProps/core.xml`.
#[derive(Debug, Default)]
pub struct CoreProperties {
    pub title: Option<String>,
    pub creator: Option<String>,
    /// `dcterms:modified`, kept as the raw ISO-8601 string.
    pub modified: Option<String>,
}

/// Parsed WordprocessingML content: page geometry, styled paragraphs and
/// the core properties that simple fields resolve against.
pub struct WmlPackage {
    pub page_width: f32,
    pub page_height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    pub line_spacing: f32, // auto line spacing factor (e.g. 278/240)
    pub paragraphs: Vec<Paragraph>,
    pub core: CoreProperties,
}

pub struct Paragraph {
    pub runs: Vec<Run>,
    pub space_before: f32,
    pub space_after: f32,
    /// Height reserved for inline drawings, in points.
    pub content_height: f32,
    pub alignment: Alignment,
    pub indent_left: f32,
    pub indent_hanging: f32,
    pub list_label: String,
    pub contextual_spacing: bool,
}

pub struct Run {
    pub text: String,
    pub font_size: f32,
    pub font_name: String,
    pub bold: bool,
    pub italic: bool,
    pub color: Option<[u8; 3]>, // None = automatic (black)
}

/// An intermediate markup document. Owns its source text; the DOM is
/// re-parsed on demand because `roxmltree` documents borrow their input.
pub struct Markup {
    source: String,
}

impl Markup {
    /// Wrap markup text, verifying that it is well-formed. Only
    /// well-formed (X)HTML is accepted as rendering input.
    pub fn from_source(source: String) -> Result<Self, Error> {
        roxmltree::Document::parse(&source)?;
        Ok(Markup { source })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn dom(&self) -> Result<roxmltree::Document<'_>, Error> {
        Ok(roxmltree::Document::parse(&self.source)?)
    }
}

/// A presentation reduced to what rasterization needs: the declared page
/// size and one entry per slide.
pub struct SlideDeck {
    /// Page width in points (EMU / 12700).
    pub page_width: f32,
    pub page_height: f32,
    pub slides: Vec<Slide>,
}

pub struct Slide {
    /// 1-based position in the deck.
    pub number: usize,
    /// Explicit solid background fill, when the slide declares one.
    pub background: Option<[u8; 3]>,
}

/// Success marker returned by every conversion entry point.
#[derive(Debug)]
pub struct ConversionOutcome {
    pub output_path: PathBuf,
    pub byte_size: u64,
}
