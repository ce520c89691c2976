use crate::error::Error;

/// How an existing destination extension is recognized as `pdf`.
///
/// The two policies differ only for destinations where the text after the
/// first `.` is not exactly `pdf` but the path still ends with `pdf`,
/// e.g. `a.b.pdf` or `v1.2/out.pdf`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PdfExtensionRule {
    /// Everything after the first `.` must equal `pdf` exactly
    /// (case-sensitive).
    AfterFirstDot,
    /// The destination must end with `pdf`.
    #[default]
    Suffix,
}

/// Derive the definitive output path for a conversion.
///
/// Rules, first match wins:
/// 1. no destination: the source truncated at its first `.`, plus `.pdf`
/// 2. destination without any `.`: the destination plus `.pdf`
/// 3. destination whose extension is not `pdf` under `rule`: the
///    destination truncated at its first `.`, plus `.pdf`
/// 4. extension already `pdf`: the destination unchanged
///
/// Truncation is on the raw string, so a `.` inside a directory component
/// cuts there. The result always ends in `.pdf`. Pure; never touches the
/// filesystem.
pub fn resolve_output_path(
    source: &str,
    dest: Option<&str>,
    rule: PdfExtensionRule,
) -> Result<String, Error> {
    let Some(dest) = dest else {
        return pdf_sibling(source);
    };
    if !dest.contains('.') {
        return Ok(format!("{dest}.pdf"));
    }
    let is_pdf = match rule {
        PdfExtensionRule::AfterFirstDot => after_first_dot(dest) == Some("pdf"),
        PdfExtensionRule::Suffix => dest.ends_with("pdf"),
    };
    if !is_pdf {
        pdf_sibling(dest)
    } else {
        Ok(dest.to_string())
    }
}

/// Truncate at the first `.` and append `.pdf`.
fn pdf_sibling(path: &str) -> Result<String, Error> {
    match path.find('.') {
        Some(dot) => Ok(format!("{}.pdf", &path[..dot])),
        None => Err(Error::InvalidPath(format!(
            "no extension separator in '{path}'"
        ))),
    }
}

fn after_first_dot(path: &str) -> Option<&str> {
    path.find('.').map(|dot| &path[dot + 1..])
}
