//! Convert office documents to PDF.
//!
//! One entry point per source format (DOCX, XLS, XLSX, PPTX and
//! (X)HTML), each following the same shape: load the input, build a
//! format-specific intermediate representation, resolve the output path
//! to a `.pdf` destination, render, write. Rendering goes through the
//! capability traits in [`render`]; the built-in implementations cover
//! the common case and the `*_with` variants accept replacements.
//!
//! ```no_run
//! use std::path::Path;
//!
//! let outcome = officeside_pdf::convert_docx_to_pdf(
//!     Path::new("report.docx"),
//!     None, // derive report.pdf next to the source
//!     None,
//! )?;
//! println!("{}", outcome.output_path.display());
//! # Ok::<(), officeside_pdf::Error>(())
//! ```
//!
//! Conversions are synchronous and self-contained: no state is shared
//! between calls, and every file handle is released when the call
//! returns. Concurrent calls are fine as long as they target different
//! output paths; writes to the same path are the caller's race to lose.

mod config;
mod docx;
mod error;
mod fonts;
mod model;
mod path;
mod pdf;
mod raster;
pub mod render;
mod sheet;
mod slides;

use std::fs;
use std::path::{Path, PathBuf};

pub use config::ConvertOptions;
pub use error::Error;
pub use model::{
    Alignment, ConversionOutcome, CoreProperties, Markup, Paragraph, Run, Slide, SlideDeck,
    WmlPackage,
};
pub use path::{PdfExtensionRule, resolve_output_path};
pub use pdf::{PdfMarkupRenderer, PdfWmlExporter};
pub use raster::FlatRasterizer;
pub use render::{MarkupRenderer, SlideRasterizer, WmlExporter};

fn ensure_source(source: &Path) -> Result<(), Error> {
    if source.is_file() {
        Ok(())
    } else {
        Err(Error::FileNotFound(source.to_path_buf()))
    }
}

fn path_str(path: &Path) -> Result<&str, Error> {
    path.to_str()
        .ok_or_else(|| Error::InvalidPath(format!("non-UTF-8 path: {}", path.display())))
}

fn resolve_destination(
    source: &Path,
    dest: Option<&Path>,
    rule: PdfExtensionRule,
) -> Result<PathBuf, Error> {
    let dest = dest.map(path_str).transpose()?;
    let resolved = resolve_output_path(path_str(source)?, dest, rule)?;
    Ok(PathBuf::from(resolved))
}

/// Write the rendered bytes. A failed write removes whatever partial
/// artifact made it to disk before returning the error.
fn persist(output: &Path, bytes: &[u8]) -> Result<ConversionOutcome, Error> {
    if let Err(e) = fs::write(output, bytes) {
        let _ = fs::remove_file(output);
        return Err(Error::Io(e));
    }
    log::info!("Saved: {}", output.display());
    Ok(ConversionOutcome {
        output_path: output.to_path_buf(),
        byte_size: bytes.len() as u64,
    })
}

fn dump_markup(output: &Path, markup: &Markup) -> Result<(), Error> {
    let dump_path = output.with_extension("html");
    fs::write(&dump_path, markup.source())?;
    log::info!("Markup dump: {}", dump_path.display());
    Ok(())
}

/// Convert a DOCX file to PDF.
///
/// `dest` may be `None` (the PDF lands next to the source), extensionless
/// or carrying a wrong extension; it is normalized to a `.pdf` path
/// either way. `main_font` is tried for runs whose font is not
/// installed before falling back to the base font.
pub fn convert_docx_to_pdf(
    source: &Path,
    dest: Option<&Path>,
    main_font: Option<&str>,
) -> Result<ConversionOutcome, Error> {
    let options = ConvertOptions {
        main_font: main_font.map(str::to_string),
        ..Default::default()
    };
    let exporter = PdfWmlExporter::new(options.main_font.clone());
    convert_docx_to_pdf_with(source, dest, &options, &exporter)
}

pub fn convert_docx_to_pdf_with(
    source: &Path,
    dest: Option<&Path>,
    options: &ConvertOptions,
    exporter: &dyn WmlExporter,
) -> Result<ConversionOutcome, Error> {
    ensure_source(source)?;
    let mut package = docx::load(source)?;
    docx::apply_font_substitutions(&mut package, &options.font_substitutions);
    let output = resolve_destination(source, dest, options.extension_rule)?;
    let bytes = exporter.export(&package)?;
    persist(&output, &bytes)
}

/// Convert a legacy binary XLS workbook to PDF via intermediate HTML
/// markup. Charts do not survive the trip.
pub fn convert_xls_to_pdf(source: &Path, dest: Option<&Path>) -> Result<ConversionOutcome, Error> {
    convert_spreadsheet_to_pdf_with(source, dest, &ConvertOptions::default(), &PdfMarkupRenderer)
}

/// Convert an XLSX workbook to PDF via intermediate HTML markup.
/// Charts and cell color formatting do not survive the trip.
pub fn convert_xlsx_to_pdf(
    source: &Path,
    dest: Option<&Path>,
    include_column_headers: bool,
    include_row_numbers: bool,
) -> Result<ConversionOutcome, Error> {
    let options = ConvertOptions {
        include_column_headers,
        include_row_numbers,
        ..Default::default()
    };
    convert_spreadsheet_to_pdf_with(source, dest, &options, &PdfMarkupRenderer)
}

/// Spreadsheet conversion with explicit options and markup renderer.
/// The workbook backend is picked from the extension, so this accepts
/// both `.xls` and `.xlsx` sources.
pub fn convert_spreadsheet_to_pdf_with(
    source: &Path,
    dest: Option<&Path>,
    options: &ConvertOptions,
    renderer: &dyn MarkupRenderer,
) -> Result<ConversionOutcome, Error> {
    ensure_source(source)?;
    let sheets = sheet::load_workbook(source)?;
    let markup = sheet::to_markup(
        &sheets,
        options.include_column_headers,
        options.include_row_numbers,
    )?;
    let output = resolve_destination(source, dest, options.extension_rule)?;
    if options.debug_dump_markup {
        dump_markup(&output, &markup)?;
    }
    let bytes = renderer.render(&markup)?;
    persist(&output, &bytes)
}

/// Convert a PPTX presentation to PDF: every slide is rasterized at the
/// deck's declared page size and lands on its own, identically sized
/// page.
pub fn convert_pptx_to_pdf(source: &Path, dest: Option<&Path>) -> Result<ConversionOutcome, Error> {
    convert_pptx_to_pdf_with(source, dest, &ConvertOptions::default(), &FlatRasterizer)
}

pub fn convert_pptx_to_pdf_with(
    source: &Path,
    dest: Option<&Path>,
    options: &ConvertOptions,
    rasterizer: &dyn SlideRasterizer,
) -> Result<ConversionOutcome, Error> {
    ensure_source(source)?;
    let deck = slides::load(source)?;
    let output = resolve_destination(source, dest, options.extension_rule)?;
    let bytes = pdf::slides_to_pdf(&deck, rasterizer)?;
    persist(&output, &bytes)
}

/// Whole-deck conversion of legacy binary PowerPoint files is not
/// implemented; this reports [`Error::Unsupported`] rather than
/// silently writing nothing.
pub fn convert_ppt_to_pdf(source: &Path, _dest: Option<&Path>) -> Result<ConversionOutcome, Error> {
    ensure_source(source)?;
    Err(Error::Unsupported(
        "legacy binary PowerPoint decks (.ppt)".into(),
    ))
}

/// Convert an (X)HTML file to PDF. The markup must be well-formed;
/// anything a strict XML parse rejects is reported as [`Error::Xml`].
pub fn convert_html_to_pdf(source: &Path, dest: Option<&Path>) -> Result<ConversionOutcome, Error> {
    convert_html_to_pdf_with(source, dest, &ConvertOptions::default(), &PdfMarkupRenderer)
}

pub fn convert_html_to_pdf_with(
    source: &Path,
    dest: Option<&Path>,
    options: &ConvertOptions,
    renderer: &dyn MarkupRenderer,
) -> Result<ConversionOutcome, Error> {
    ensure_source(source)?;
    let markup = Markup::from_source(fs::read_to_string(source)?)?;
    let output = resolve_destination(source, dest, options.extension_rule)?;
    let bytes = renderer.render(&markup)?;
    persist(&output, &bytes)
}
