use std::collections::HashMap;

use crate::path::PdfExtensionRule;

/// Per-call conversion settings. Every field has a conservative default,
/// so `ConvertOptions::default()` reproduces the plain conversions:
///
/// ```
/// use officeside_pdf::ConvertOptions;
///
/// let options = ConvertOptions {
///     main_font: Some("Liberation Serif".into()),
///     include_row_numbers: false,
///     ..Default::default()
/// };
/// # let _ = options;
/// ```
#[derive(Clone, Debug)]
pub struct ConvertOptions {
    /// Font families to swap before export, requested name → replacement.
    pub font_substitutions: HashMap<String, String>,
    /// Fallback family tried when a run's font is not installed, before
    /// giving up and using the built-in base font.
    pub main_font: Option<String>,
    /// Emit the `A`, `B`, `C`… header row in spreadsheet markup.
    pub include_column_headers: bool,
    /// Emit the row-number column in spreadsheet markup.
    pub include_row_numbers: bool,
    /// Write the intermediate markup next to the PDF (same stem, `.html`)
    /// for the conversions that generate one.
    pub debug_dump_markup: bool,
    /// How a pre-existing destination extension is recognized as `pdf`.
    pub extension_rule: PdfExtensionRule,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            font_substitutions: HashMap::new(),
            main_font: None,
            include_column_headers: true,
            include_row_numbers: true,
            debug_dump_markup: false,
            extension_rule: PdfExtensionRule::default(),
        }
    }
}
