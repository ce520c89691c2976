use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use pdf_writer::{Name, Pdf, Rect, Ref};
use ttf_parser::Face;

use crate::model::Run;

pub(crate) struct FontEntry {
    pub(crate) pdf_name: String,
    pub(crate) font_ref: Ref,
    pub(crate) widths_1000: Vec<f32>,
}

/// (lowercase family name, bold, italic) -> (file path, face index within TTC)
type FontLookup = HashMap<(String, bool, bool), (PathBuf, u32)>;

static FONT_INDEX: OnceLock<FontLookup> = OnceLock::new();

fn font_family_name(face: &Face) -> Option<String> {
    // Use ID 1 (Family): it matches what document files reference and
    // distinguishes e.g. "Aptos Display" from "Aptos". ID 16 groups those
    // under one name, causing collisions.
    face.names().into_iter().find_map(|name| {
        if name.name_id == ttf_parser::name_id::FAMILY && name.is_unicode() {
            name.to_string()
        } else {
            None
        }
    })
}

fn font_directories() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    // 1. User-configured directories via OFFICESIDE_FONTS
    if let Ok(val) = std::env::var("OFFICESIDE_FONTS") {
        let sep = if cfg!(windows) { ';' } else { ':' };
        dirs.extend(
            val.split(sep)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        );
    }

    // 2. Platform-specific system font directories
    #[cfg(target_os = "macos")]
    {
        dirs.extend([
            "/Applications/Microsoft Word.app/Contents/Resources/DFonts".into(),
            "/Library/Fonts".into(),
            "/Library/Fonts/Microsoft".into(),
            "/System/Library/Fonts".into(),
            "/System/Library/Fonts/Supplemental".into(),
        ]);
    }

    #[cfg(target_os = "linux")]
    {
        dirs.extend(["/usr/share/fonts".into(), "/usr/local/share/fonts".into()]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        } else {
            dirs.push("C:\\Windows\\Fonts".into());
        }
    }

    dirs
}

fn scan_font_dirs() -> FontLookup {
    let mut index = FontLookup::new();

    let mut stack: Vec<PathBuf> = font_directories();
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let is_collection = match path.extension().and_then(|e| e.to_str()) {
                Some("ttf" | "otf" | "TTF" | "OTF") => false,
                Some("ttc" | "TTC") => true,
                _ => continue,
            };
            let Ok(data) = std::fs::read(&path) else {
                continue;
            };
            let face_count = if is_collection {
                ttf_parser::fonts_in_collection(&data).unwrap_or(1)
            } else {
                1
            };
            for face_idx in 0..face_count {
                let Ok(face) = Face::parse(&data, face_idx) else {
                    continue;
                };
                let Some(family) = font_family_name(&face) else {
                    continue;
                };
                index
                    .entry((family.to_lowercase(), face.is_bold(), face.is_italic()))
                    .or_insert((path.clone(), face_idx));
            }
        }
    }
    index
}

fn get_font_index() -> &'static FontLookup {
    FONT_INDEX.get_or_init(scan_font_dirs)
}

/// Look up a single family/style in the index, falling back to the
/// regular variant when the requested bold/italic face is not installed.
fn find_font_file(family: &str, bold: bool, italic: bool) -> Option<(PathBuf, u32)> {
    let index = get_font_index();
    let key = family.to_lowercase();
    index
        .get(&(key.clone(), bold, italic))
        .or_else(|| {
            if bold || italic {
                index.get(&(key, false, false))
            } else {
                None
            }
        })
        .cloned()
}

/// Resolution chain for a run's font: the requested family, then the
/// caller's main-font hint.
fn resolve_font_file(
    family: &str,
    bold: bool,
    italic: bool,
    hint: Option<&str>,
) -> Option<(PathBuf, u32)> {
    find_font_file(family, bold, italic)
        .or_else(|| hint.and_then(|h| find_font_file(h, bold, italic)))
}

/// WinAnsi (Windows-1252) bytes 0x80-0x9F and their Unicode codepoints;
/// all other bytes map directly.
const WINANSI_REMAP: &[(u8, char)] = &[
    (0x80, '\u{20AC}'),
    (0x82, '\u{201A}'),
    (0x83, '\u{0192}'),
    (0x84, '\u{201E}'),
    (0x85, '\u{2026}'),
    (0x86, '\u{2020}'),
    (0x87, '\u{2021}'),
    (0x88, '\u{02C6}'),
    (0x89, '\u{2030}'),
    (0x8A, '\u{0160}'),
    (0x8B, '\u{2039}'),
    (0x8C, '\u{0152}'),
    (0x8E, '\u{017D}'),
    (0x91, '\u{2018}'),
    (0x92, '\u{2019}'),
    (0x93, '\u{201C}'),
    (0x94, '\u{201D}'),
    (0x95, '\u{2022}'),
    (0x96, '\u{2013}'),
    (0x97, '\u{2014}'),
    (0x98, '\u{02DC}'),
    (0x99, '\u{2122}'),
    (0x9A, '\u{0161}'),
    (0x9B, '\u{203A}'),
    (0x9C, '\u{0153}'),
    (0x9E, '\u{017E}'),
    (0x9F, '\u{0178}'),
];

fn winansi_to_char(byte: u8) -> char {
    WINANSI_REMAP
        .iter()
        .find(|(b, _)| *b == byte)
        .map(|(_, c)| *c)
        .unwrap_or(byte as char)
}

fn char_to_winansi(c: char) -> Option<u8> {
    match c as u32 {
        0x0000..=0x007F => Some(c as u8),
        0x00A0..=0x00FF => Some(c as u8), // Latin-1 supplement maps directly
        _ => WINANSI_REMAP
            .iter()
            .find(|(_, rc)| *rc == c)
            .map(|(b, _)| *b),
    }
}

/// Convert a UTF-8 string to WinAnsi bytes for PDF `Str` encoding.
/// Characters outside the encoding are dropped.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars().filter_map(char_to_winansi).collect()
}

/// Approximate Helvetica widths at 1000 units/em for WinAnsi chars 32..=255.
pub(crate) fn helvetica_widths() -> Vec<f32> {
    (32u8..=255u8)
        .map(|b| match b {
            32 => 278.0,                          // space
            33..=47 => 333.0,                     // punctuation
            48..=57 => 556.0,                     // digits
            58..=64 => 333.0,                     // more punctuation
            73 | 74 => 278.0,                     // I J (narrow uppercase)
            77 => 833.0,                          // M (wide)
            65..=90 => 667.0,                     // uppercase A-Z (average)
            91..=96 => 333.0,                     // brackets etc.
            102 | 105 | 106 | 108 | 116 => 278.0, // narrow lowercase: f i j l t
            109 | 119 => 833.0,                   // m w (wide)
            97..=122 => 556.0,                    // lowercase a-z (average)
            _ => 556.0,
        })
        .collect()
}

/// Embed a TrueType/OpenType face into the PDF. Returns the WinAnsi
/// width table.
fn embed_truetype(
    pdf: &mut Pdf,
    font_ref: Ref,
    descriptor_ref: Ref,
    data_ref: Ref,
    font_name: &str,
    font_data: &[u8],
    face_index: u32,
) -> Option<Vec<f32>> {
    let face = Face::parse(font_data, face_index).ok()?;

    let units = face.units_per_em() as f32;
    let to_milli = |v: f32| v / units * 1000.0;

    let bb = face.global_bounding_box();
    let bbox = Rect::new(
        to_milli(bb.x_min as f32),
        to_milli(bb.y_min as f32),
        to_milli(bb.x_max as f32),
        to_milli(bb.y_max as f32),
    );

    let widths: Vec<f32> = (32u8..=255u8)
        .map(|byte| {
            face.glyph_index(winansi_to_char(byte))
                .and_then(|gid| face.glyph_hor_advance(gid))
                .map(|adv| to_milli(adv as f32))
                .unwrap_or(0.0)
        })
        .collect();

    let data_len = i32::try_from(font_data.len()).ok()?;
    pdf.stream(data_ref, font_data)
        .pair(Name(b"Length1"), data_len);

    let ps_name = font_name.replace(' ', "");

    pdf.font_descriptor(descriptor_ref)
        .name(Name(ps_name.as_bytes()))
        .flags(pdf_writer::types::FontFlags::NON_SYMBOLIC)
        .bbox(bbox)
        .italic_angle(0.0)
        .ascent(to_milli(face.ascender() as f32))
        .descent(to_milli(face.descender() as f32))
        .cap_height(face.capital_height().map(|h| to_milli(h as f32)).unwrap_or(700.0))
        .stem_v(80.0)
        .font_file2(data_ref);

    {
        let mut d = pdf.indirect(font_ref).dict();
        d.pair(Name(b"Type"), Name(b"Font"));
        d.pair(Name(b"Subtype"), Name(b"TrueType"));
        d.pair(Name(b"BaseFont"), Name(ps_name.as_bytes()));
        d.pair(Name(b"Encoding"), Name(b"WinAnsiEncoding"));
        d.pair(Name(b"FirstChar"), 32i32);
        d.pair(Name(b"LastChar"), 255i32);
        d.pair(Name(b"FontDescriptor"), descriptor_ref);
        d.insert(Name(b"Widths"))
            .array()
            .items(widths.iter().copied());
    }

    Some(widths)
}

pub(crate) fn primary_font_name(name: &str) -> &str {
    name.split(';').next().unwrap_or(name).trim()
}

pub(crate) fn font_key(run: &Run) -> String {
    let base = primary_font_name(&run.font_name);
    match (run.bold, run.italic) {
        (true, true) => format!("{}/BI", base),
        (true, false) => format!("{}/B", base),
        (false, true) => format!("{}/I", base),
        (false, false) => base.to_string(),
    }
}

/// Register one font in the PDF: an installed face when the family (or
/// the hint) resolves, the base font otherwise.
pub(crate) fn register_font(
    pdf: &mut Pdf,
    font_name: &str,
    bold: bool,
    italic: bool,
    pdf_name: String,
    alloc: &mut impl FnMut() -> Ref,
    hint: Option<&str>,
) -> FontEntry {
    let font_ref = alloc();
    let descriptor_ref = alloc();
    let data_ref = alloc();

    let widths = resolve_font_file(font_name, bold, italic, hint)
        .and_then(|(path, face_index)| {
            let data = std::fs::read(&path).ok()?;
            embed_truetype(pdf, font_ref, descriptor_ref, data_ref, font_name, &data, face_index)
        })
        .unwrap_or_else(|| {
            log::warn!("Font not found: {font_name} bold={bold} italic={italic} - using Helvetica");
            pdf.type1_font(font_ref)
                .base_font(Name(b"Helvetica"))
                .encoding_predefined(Name(b"WinAnsiEncoding"));
            helvetica_widths()
        });

    FontEntry {
        pdf_name,
        font_ref,
        widths_1000: widths,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winansi_round_trips_remapped_bytes() {
        for &(byte, c) in WINANSI_REMAP {
            assert_eq!(winansi_to_char(byte), c);
            assert_eq!(char_to_winansi(c), Some(byte));
        }
    }

    #[test]
    fn unencodable_chars_are_dropped() {
        assert_eq!(to_winansi_bytes("a\u{4E2D}b"), vec![b'a', b'b']);
    }

    #[test]
    fn font_key_encodes_style() {
        let run = |bold, italic| Run {
            text: String::new(),
            font_size: 11.0,
            font_name: "Aptos; fallback".into(),
            bold,
            italic,
            color: None,
        };
        assert_eq!(font_key(&run(false, false)), "Aptos");
        assert_eq!(font_key(&run(true, false)), "Aptos/B");
        assert_eq!(font_key(&run(false, true)), "Aptos/I");
        assert_eq!(font_key(&run(true, true)), "Aptos/BI");
    }
}
