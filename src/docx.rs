use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Error;
use crate::model::{Alignment, CoreProperties, Paragraph, Run, WmlPackage};

const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const WPD_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
const DCTERMS_NS: &str = "http://purl.org/dc/terms/";

fn twips_to_pts(twips: f32) -> f32 {
    twips / 20.0
}

pub(crate) fn parse_hex_color(val: &str) -> Option<[u8; 3]> {
    if val == "auto" || val.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&val[0..2], 16).ok()?;
    let g = u8::from_str_radix(&val[2..4], 16).ok()?;
    let b = u8::from_str_radix(&val[4..6], 16).ok()?;
    Some([r, g, b])
}

fn wml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(WML_NS))
}

fn wml_attr<'a>(node: roxmltree::Node<'a, 'a>, child: &str) -> Option<&'a str> {
    wml(node, child).and_then(|n| n.attribute((WML_NS, "val")))
}

fn twips_attr(node: roxmltree::Node, attr: &str) -> Option<f32> {
    node.attribute((WML_NS, attr))
        .and_then(|v| v.parse::<f32>().ok())
        .map(twips_to_pts)
}

fn dml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(DML_NS))
}

/// Read a package part as text; `None` when the part is absent or broken.
/// Most parts are optional, so callers fall back to defaults.
fn read_part(zip: &mut zip::ZipArchive<File>, name: &str) -> Option<String> {
    let mut content = String::new();
    zip.by_name(name).ok()?.read_to_string(&mut content).ok()?;
    Some(content)
}

struct ThemeFonts {
    major: String,
    minor: String,
}

fn parse_theme(zip: &mut zip::ZipArchive<File>) -> ThemeFonts {
    let mut theme = ThemeFonts {
        major: String::from("Aptos Display"),
        minor: String::from("Aptos"),
    };

    let names: Vec<String> = zip.file_names().map(|s| s.to_string()).collect();
    let Some(part) = names
        .iter()
        .find(|n| n.starts_with("word/theme/") && n.ends_with(".xml"))
        .cloned()
        .and_then(|name| read_part(zip, &name))
    else {
        return theme;
    };
    let Ok(xml) = roxmltree::Document::parse(&part) else {
        return theme;
    };

    for node in xml.descendants() {
        if node.tag_name().namespace() != Some(DML_NS) {
            continue;
        }
        let typeface = dml(node, "latin")
            .and_then(|n| n.attribute("typeface"))
            .filter(|tf| !tf.is_empty());
        match (node.tag_name().name(), typeface) {
            ("majorFont", Some(tf)) => theme.major = tf.to_string(),
            ("minorFont", Some(tf)) => theme.minor = tf.to_string(),
            _ => {}
        }
    }

    theme
}

fn resolve_font(rfonts: roxmltree::Node, theme: &ThemeFonts, default_font: &str) -> String {
    if let Some(f) = rfonts.attribute((WML_NS, "ascii")) {
        return f.to_string();
    }
    match rfonts.attribute((WML_NS, "asciiTheme")) {
        Some("majorHAnsi") => theme.major.clone(),
        Some("minorHAnsi") => theme.minor.clone(),
        _ => default_font.to_string(),
    }
}

struct StyleDefaults {
    font_size: f32,
    font_name: String,
    space_after: f32,
    line_spacing: f32, // multiplier from w:spacing @line / 240
}

struct ParagraphStyle {
    font_size: Option<f32>,
    font_name: Option<String>,
    color: Option<[u8; 3]>,
    space_before: f32,
    space_after: Option<f32>,
    alignment: Option<Alignment>,
    contextual_spacing: bool,
}

struct StylesInfo {
    defaults: StyleDefaults,
    paragraph_styles: HashMap<String, ParagraphStyle>,
}

fn parse_alignment(val: &str) -> Alignment {
    match val {
        "center" => Alignment::Center,
        "right" | "end" => Alignment::Right,
        "both" | "distribute" => Alignment::Justify,
        _ => Alignment::Left,
    }
}

fn parse_styles(zip: &mut zip::ZipArchive<File>, theme: &ThemeFonts) -> StylesInfo {
    let mut info = StylesInfo {
        defaults: StyleDefaults {
            font_size: 12.0,
            font_name: theme.minor.clone(),
            space_after: 8.0,
            line_spacing: 1.2,
        },
        paragraph_styles: HashMap::new(),
    };

    let Some(part) = read_part(zip, "word/styles.xml") else {
        return info;
    };
    let Ok(xml) = roxmltree::Document::parse(&part) else {
        return info;
    };
    let root = xml.root_element();

    if let Some(doc_defaults) = wml(root, "docDefaults") {
        if let Some(rpr) = wml(doc_defaults, "rPrDefault").and_then(|n| wml(n, "rPr")) {
            if let Some(sz) = wml_attr(rpr, "sz").and_then(|v| v.parse::<f32>().ok()) {
                info.defaults.font_size = sz / 2.0;
            }
            if let Some(rfonts) = wml(rpr, "rFonts") {
                info.defaults.font_name = resolve_font(rfonts, theme, &theme.minor);
            }
        }
        let spacing = wml(doc_defaults, "pPrDefault")
            .and_then(|n| wml(n, "pPr"))
            .and_then(|n| wml(n, "spacing"));
        if let Some(spacing) = spacing {
            if let Some(after) = twips_attr(spacing, "after") {
                info.defaults.space_after = after;
            }
            if let Some(line) = spacing
                .attribute((WML_NS, "line"))
                .and_then(|v| v.parse::<f32>().ok())
            {
                info.defaults.line_spacing = line / 240.0;
            }
        }
    }

    for style_node in root.children() {
        if style_node.tag_name().name() != "style"
            || style_node.tag_name().namespace() != Some(WML_NS)
            || style_node.attribute((WML_NS, "type")) != Some("paragraph")
        {
            continue;
        }
        let Some(style_id) = style_node.attribute((WML_NS, "styleId")) else {
            continue;
        };

        let ppr = wml(style_node, "pPr");
        let spacing = ppr.and_then(|n| wml(n, "spacing"));
        let rpr = wml(style_node, "rPr");

        info.paragraph_styles.insert(
            style_id.to_string(),
            ParagraphStyle {
                font_size: rpr
                    .and_then(|n| wml_attr(n, "sz"))
                    .and_then(|v| v.parse::<f32>().ok())
                    .map(|hp| hp / 2.0),
                font_name: rpr
                    .and_then(|n| wml(n, "rFonts"))
                    .map(|rfonts| resolve_font(rfonts, theme, &info.defaults.font_name)),
                color: rpr
                    .and_then(|n| wml_attr(n, "color"))
                    .and_then(parse_hex_color),
                space_before: spacing.and_then(|n| twips_attr(n, "before")).unwrap_or(0.0),
                space_after: spacing.and_then(|n| twips_attr(n, "after")),
                alignment: ppr.and_then(|n| wml_attr(n, "jc")).map(parse_alignment),
                contextual_spacing: ppr.and_then(|n| wml(n, "contextualSpacing")).is_some(),
            },
        );
    }

    info
}

struct LevelDef {
    num_fmt: String,
    lvl_text: String,
    indent_left: f32,
    indent_hanging: f32,
}

struct NumberingInfo {
    abstract_nums: HashMap<String, HashMap<u8, LevelDef>>,
    num_to_abstract: HashMap<String, String>,
}

fn parse_numbering(zip: &mut zip::ZipArchive<File>) -> NumberingInfo {
    let mut numbering = NumberingInfo {
        abstract_nums: HashMap::new(),
        num_to_abstract: HashMap::new(),
    };

    let Some(part) = read_part(zip, "word/numbering.xml") else {
        return numbering;
    };
    let Ok(xml) = roxmltree::Document::parse(&part) else {
        return numbering;
    };

    for node in xml.root_element().children() {
        if node.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        match node.tag_name().name() {
            "abstractNum" => {
                let Some(abs_id) = node.attribute((WML_NS, "abstractNumId")) else {
                    continue;
                };
                let mut levels: HashMap<u8, LevelDef> = HashMap::new();
                for lvl in node.children() {
                    if lvl.tag_name().name() != "lvl" || lvl.tag_name().namespace() != Some(WML_NS)
                    {
                        continue;
                    }
                    let Some(ilvl) = lvl
                        .attribute((WML_NS, "ilvl"))
                        .and_then(|v| v.parse::<u8>().ok())
                    else {
                        continue;
                    };
                    let ind = wml(lvl, "pPr").and_then(|ppr| wml(ppr, "ind"));
                    levels.insert(
                        ilvl,
                        LevelDef {
                            num_fmt: wml_attr(lvl, "numFmt").unwrap_or("bullet").to_string(),
                            lvl_text: wml_attr(lvl, "lvlText").unwrap_or("").to_string(),
                            indent_left: ind.and_then(|n| twips_attr(n, "left")).unwrap_or(0.0),
                            indent_hanging: ind
                                .and_then(|n| twips_attr(n, "hanging"))
                                .unwrap_or(0.0),
                        },
                    );
                }
                numbering.abstract_nums.insert(abs_id.to_string(), levels);
            }
            "num" => {
                if let Some(num_id) = node.attribute((WML_NS, "numId"))
                    && let Some(abs_id) = wml_attr(node, "abstractNumId")
                {
                    numbering
                        .num_to_abstract
                        .insert(num_id.to_string(), abs_id.to_string());
                }
            }
            _ => {}
        }
    }

    numbering
}

fn parse_core_properties(zip: &mut zip::ZipArchive<File>) -> CoreProperties {
    let mut core = CoreProperties::default();

    let Some(part) = read_part(zip, "docProps/core.xml") else {
        return core;
    };
    let Ok(xml) = roxmltree::Document::parse(&part) else {
        return core;
    };

    for node in xml.descendants() {
        let text = node.text().map(str::to_string).filter(|t| !t.is_empty());
        match (node.tag_name().namespace(), node.tag_name().name()) {
            (Some(DC_NS), "title") => core.title = text,
            (Some(DC_NS), "creator") => core.creator = text,
            (Some(DCTERMS_NS), "modified") => core.modified = text,
            _ => {}
        }
    }

    core
}

/// Recompute the display text of a `w:fldSimple` field instead of
/// trusting its cached result. Date-like and document-property fields
/// resolve against the core properties; anything else keeps the cached
/// text.
fn resolve_simple_field(instr: &str, cached: String, core: &CoreProperties) -> String {
    let mut tokens = instr.split_whitespace();
    let keyword = tokens.next().unwrap_or("").to_ascii_uppercase();
    let resolved = match keyword.as_str() {
        "DATE" | "SAVEDATE" | "TIME" => core.modified.clone(),
        "AUTHOR" | "USERNAME" => core.creator.clone(),
        "TITLE" => core.title.clone(),
        "DOCPROPERTY" => match tokens.next() {
            Some("LastSavedTime") => core.modified.clone(),
            Some("Title") => core.title.clone(),
            Some("Author") | Some("Creator") => core.creator.clone(),
            _ => None,
        },
        _ => None,
    };
    resolved.unwrap_or(cached)
}

fn run_text(run_node: roxmltree::Node) -> String {
    run_node
        .children()
        .filter(|n| n.tag_name().name() == "t" && n.tag_name().namespace() == Some(WML_NS))
        .filter_map(|n| n.text())
        .collect()
}

struct InheritedRunStyle<'a> {
    font_size: f32,
    font_name: &'a str,
    color: Option<[u8; 3]>,
}

fn parse_run(
    run_node: roxmltree::Node,
    theme: &ThemeFonts,
    inherited: &InheritedRunStyle,
    text: String,
) -> Option<Run> {
    if text.is_empty() {
        return None;
    }
    let rpr = wml(run_node, "rPr");
    Some(Run {
        text,
        font_size: rpr
            .and_then(|n| wml_attr(n, "sz"))
            .and_then(|v| v.parse::<f32>().ok())
            .map(|hp| hp / 2.0)
            .unwrap_or(inherited.font_size),
        font_name: rpr
            .and_then(|n| wml(n, "rFonts"))
            .map(|rfonts| resolve_font(rfonts, theme, inherited.font_name))
            .unwrap_or_else(|| inherited.font_name.to_string()),
        bold: rpr.and_then(|n| wml(n, "b")).is_some(),
        italic: rpr.and_then(|n| wml(n, "i")).is_some(),
        color: rpr
            .and_then(|n| wml_attr(n, "color"))
            .and_then(parse_hex_color)
            .or(inherited.color),
    })
}

fn parse_list_info(
    num_pr: Option<roxmltree::Node>,
    numbering: &NumberingInfo,
    counters: &mut HashMap<(String, u8), u32>,
) -> (f32, f32, String) {
    let Some(num_pr) = num_pr else {
        return (0.0, 0.0, String::new());
    };
    let Some(num_id) = wml_attr(num_pr, "numId") else {
        return (0.0, 0.0, String::new());
    };
    let ilvl = wml_attr(num_pr, "ilvl")
        .and_then(|v| v.parse::<u8>().ok())
        .unwrap_or(0);

    let Some(def) = numbering
        .num_to_abstract
        .get(num_id)
        .and_then(|abs_id| numbering.abstract_nums.get(abs_id))
        .and_then(|levels| levels.get(&ilvl))
    else {
        return (0.0, 0.0, String::new());
    };

    let counter = counters
        .entry((num_id.to_string(), ilvl))
        .and_modify(|c| *c += 1)
        .or_insert(1);
    let label = if def.num_fmt == "bullet" {
        "\u{2022}".to_string()
    } else {
        def.lvl_text
            .replace(&format!("%{}", ilvl + 1), &counter.to_string())
    };
    (def.indent_left, def.indent_hanging, label)
}

fn compute_drawing_height(para_node: roxmltree::Node) -> f32 {
    let mut max_height: f32 = 0.0;
    for child in para_node.children() {
        let drawing_node = if child.tag_name().name() == "drawing"
            && child.tag_name().namespace() == Some(WML_NS)
        {
            Some(child)
        } else if child.tag_name().name() == "r" && child.tag_name().namespace() == Some(WML_NS) {
            wml(child, "drawing")
        } else {
            None
        };

        let Some(drawing) = drawing_node else { continue };
        for container in drawing.children() {
            let name = container.tag_name().name();
            if (name == "inline" || name == "anchor")
                && container.tag_name().namespace() == Some(WPD_NS)
                && let Some(cy) = container
                    .children()
                    .find(|n| {
                        n.tag_name().name() == "extent"
                            && n.tag_name().namespace() == Some(WPD_NS)
                    })
                    .and_then(|n| n.attribute("cy"))
                    .and_then(|v| v.parse::<f32>().ok())
            {
                max_height = max_height.max(cy / 12700.0);
            }
        }
    }
    max_height
}

/// Load a WordprocessingML package: theme, styles, numbering, core
/// properties and the document body, with simple field values refreshed
/// from the core properties.
pub fn load(path: &Path) -> Result<WmlPackage, Error> {
    let file = File::open(path)?;
    let mut zip = zip::ZipArchive::new(file)?;

    let theme = parse_theme(&mut zip);
    let styles = parse_styles(&mut zip, &theme);
    let numbering = parse_numbering(&mut zip);
    let core = parse_core_properties(&mut zip);

    let Some(body_part) = read_part(&mut zip, "word/document.xml") else {
        return Err(Error::InvalidPackage("missing word/document.xml".into()));
    };
    let xml = roxmltree::Document::parse(&body_part)?;
    let body = wml(xml.root_element(), "body")
        .ok_or_else(|| Error::InvalidPackage("missing w:body".into()))?;

    let sect = wml(body, "sectPr");
    let pg_sz = sect.and_then(|s| wml(s, "pgSz"));
    let pg_mar = sect.and_then(|s| wml(s, "pgMar"));

    let mut paragraphs = Vec::new();
    let mut counters: HashMap<(String, u8), u32> = HashMap::new();

    for node in body.children() {
        if node.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        match node.tag_name().name() {
            "tbl" => {
                // Tables are reserved as vertical space, one line per row.
                let row_count = node
                    .children()
                    .filter(|n| {
                        n.tag_name().name() == "tr" && n.tag_name().namespace() == Some(WML_NS)
                    })
                    .count();
                paragraphs.push(Paragraph {
                    runs: vec![],
                    space_before: 0.0,
                    space_after: 4.0,
                    content_height: row_count as f32 * (10.5 * 1.6 + 4.0),
                    alignment: Alignment::Left,
                    indent_left: 0.0,
                    indent_hanging: 0.0,
                    list_label: String::new(),
                    contextual_spacing: false,
                });
            }
            "p" => {
                let ppr = wml(node, "pPr");
                let para_style = ppr
                    .and_then(|ppr| wml_attr(ppr, "pStyle"))
                    .and_then(|id| styles.paragraph_styles.get(id));

                let inline_spacing = ppr.and_then(|ppr| wml(ppr, "spacing"));
                let space_before = inline_spacing
                    .and_then(|n| twips_attr(n, "before"))
                    .or_else(|| para_style.map(|s| s.space_before))
                    .unwrap_or(0.0);
                let space_after = inline_spacing
                    .and_then(|n| twips_attr(n, "after"))
                    .or_else(|| para_style.and_then(|s| s.space_after))
                    .unwrap_or(styles.defaults.space_after);

                let style_font_name = para_style
                    .and_then(|s| s.font_name.as_deref())
                    .unwrap_or(&styles.defaults.font_name)
                    .to_string();
                let inherited = InheritedRunStyle {
                    font_size: para_style
                        .and_then(|s| s.font_size)
                        .unwrap_or(styles.defaults.font_size),
                    font_name: &style_font_name,
                    color: para_style.and_then(|s| s.color),
                };

                let alignment = ppr
                    .and_then(|ppr| wml_attr(ppr, "jc"))
                    .map(parse_alignment)
                    .or_else(|| para_style.and_then(|s| s.alignment))
                    .unwrap_or(Alignment::Left);

                let contextual_spacing = ppr
                    .and_then(|ppr| wml(ppr, "contextualSpacing"))
                    .is_some()
                    || para_style.is_some_and(|s| s.contextual_spacing);

                let num_pr = ppr.and_then(|ppr| wml(ppr, "numPr"));
                let (mut indent_left, mut indent_hanging, list_label) =
                    parse_list_info(num_pr, &numbering, &mut counters);

                // Paragraph-level w:ind overrides the level def
                if let Some(ind) = ppr.and_then(|ppr| wml(ppr, "ind")) {
                    if let Some(v) = twips_attr(ind, "left") {
                        indent_left = v;
                    }
                    if let Some(v) = twips_attr(ind, "hanging") {
                        indent_hanging = v;
                    }
                }

                let mut runs = Vec::new();
                for child in node.children() {
                    if child.tag_name().namespace() != Some(WML_NS) {
                        continue;
                    }
                    match child.tag_name().name() {
                        "r" => {
                            runs.extend(parse_run(child, &theme, &inherited, run_text(child)));
                        }
                        "fldSimple" => {
                            // The cached result lives in the wrapped run;
                            // recompute it before export.
                            let Some(inner) = wml(child, "r") else {
                                continue;
                            };
                            let instr = child.attribute((WML_NS, "instr")).unwrap_or("");
                            let text = resolve_simple_field(instr, run_text(inner), &core);
                            runs.extend(parse_run(inner, &theme, &inherited, text));
                        }
                        _ => {}
                    }
                }

                paragraphs.push(Paragraph {
                    runs,
                    space_before,
                    space_after,
                    content_height: compute_drawing_height(node),
                    alignment,
                    indent_left,
                    indent_hanging,
                    list_label,
                    contextual_spacing,
                });
            }
            _ => {}
        }
    }

    Ok(WmlPackage {
        page_width: pg_sz.and_then(|n| twips_attr(n, "w")).unwrap_or(612.0),
        page_height: pg_sz.and_then(|n| twips_attr(n, "h")).unwrap_or(792.0),
        margin_top: pg_mar.and_then(|n| twips_attr(n, "top")).unwrap_or(72.0),
        margin_bottom: pg_mar.and_then(|n| twips_attr(n, "bottom")).unwrap_or(72.0),
        margin_left: pg_mar.and_then(|n| twips_attr(n, "left")).unwrap_or(72.0),
        margin_right: pg_mar.and_then(|n| twips_attr(n, "right")).unwrap_or(72.0),
        line_spacing: styles.defaults.line_spacing,
        paragraphs,
        core,
    })
}

/// Swap run font families according to the substitution map. Exact-name
/// lookup, applied once before export.
pub fn apply_font_substitutions(package: &mut WmlPackage, substitutions: &HashMap<String, String>) {
    if substitutions.is_empty() {
        return;
    }
    for para in &mut package.paragraphs {
        for run in &mut para.runs {
            if let Some(replacement) = substitutions.get(&run.font_name) {
                run.font_name = replacement.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> CoreProperties {
        CoreProperties {
            title: Some("Quarterly Report".into()),
            creator: Some("amundsen".into()),
            modified: Some("2024-11-02T10:15:00Z".into()),
        }
    }

    #[test]
    fn date_fields_resolve_to_modified_timestamp() {
        for instr in ["DATE", " SAVEDATE \\* MERGEFORMAT ", "DOCPROPERTY LastSavedTime"] {
            let got = resolve_simple_field(instr, "stale".into(), &core());
            assert_eq!(got, "2024-11-02T10:15:00Z", "instr={instr}");
        }
    }

    #[test]
    fn unknown_fields_keep_cached_text() {
        let got = resolve_simple_field("PAGEREF _Toc1", "7".into(), &core());
        assert_eq!(got, "7");
    }

    #[test]
    fn missing_property_keeps_cached_text() {
        let empty = CoreProperties::default();
        let got = resolve_simple_field("AUTHOR", "cached author".into(), &empty);
        assert_eq!(got, "cached author");
    }

    #[test]
    fn substitution_replaces_exact_family_names() {
        let mut package = WmlPackage {
            page_width: 612.0,
            page_height: 792.0,
            margin_top: 72.0,
            margin_bottom: 72.0,
            margin_left: 72.0,
            margin_right: 72.0,
            line_spacing: 1.2,
            paragraphs: vec![Paragraph {
                runs: vec![
                    Run {
                        text: "a".into(),
                        font_size: 11.0,
                        font_name: "Times New Roman".into(),
                        bold: false,
                        italic: false,
                        color: None,
                    },
                    Run {
                        text: "b".into(),
                        font_size: 11.0,
                        font_name: "Courier New".into(),
                        bold: false,
                        italic: false,
                        color: None,
                    },
                ],
                space_before: 0.0,
                space_after: 8.0,
                content_height: 0.0,
                alignment: Alignment::Left,
                indent_left: 0.0,
                indent_hanging: 0.0,
                list_label: String::new(),
                contextual_spacing: false,
            }],
            core: CoreProperties::default(),
        };

        let mut map = HashMap::new();
        map.insert("Times New Roman".to_string(), "Songti".to_string());
        apply_font_substitutions(&mut package, &map);

        let fonts: Vec<&str> = package.paragraphs[0]
            .runs
            .iter()
            .map(|r| r.font_name.as_str())
            .collect();
        assert_eq!(fonts, ["Songti", "Courier New"]);
    }
}
