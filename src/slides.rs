use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::docx::parse_hex_color;
use crate::error::Error;
use crate::model::{Slide, SlideDeck};

const PML_NS: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const REL_REF_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Default deck page size (4:3) in EMUs, used when `p:sldSz` is absent.
const DEFAULT_CX: f32 = 9_144_000.0;
const DEFAULT_CY: f32 = 6_858_000.0;

fn emu_to_pts(emu: f32) -> f32 {
    emu / 12_700.0
}

fn read_part(zip: &mut zip::ZipArchive<File>, name: &str) -> Option<String> {
    let mut content = String::new();
    zip.by_name(name).ok()?.read_to_string(&mut content).ok()?;
    Some(content)
}

fn pml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(PML_NS))
}

/// Relationship id -> target, from `ppt/_rels/presentation.xml.rels`.
fn parse_relationships(zip: &mut zip::ZipArchive<File>) -> HashMap<String, String> {
    let mut rels = HashMap::new();
    let Some(part) = read_part(zip, "ppt/_rels/presentation.xml.rels") else {
        return rels;
    };
    let Ok(xml) = roxmltree::Document::parse(&part) else {
        return rels;
    };
    for node in xml.descendants() {
        if node.tag_name().name() != "Relationship"
            || node.tag_name().namespace() != Some(REL_NS)
        {
            continue;
        }
        if let Some(id) = node.attribute("Id")
            && let Some(target) = node.attribute("Target")
        {
            rels.insert(id.to_string(), target.to_string());
        }
    }
    rels
}

/// Resolve a presentation-relative relationship target to a package path.
fn rel_target_to_part(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("ppt/{target}"),
    }
}

/// Slide part paths in deck order: the `p:sldIdLst` entries resolved
/// through the relationships, or a sorted filename scan when the list is
/// missing.
fn slide_parts(
    zip: &mut zip::ZipArchive<File>,
    presentation: &roxmltree::Document,
) -> Vec<String> {
    let rels = parse_relationships(zip);

    let mut parts: Vec<String> = presentation
        .root_element()
        .children()
        .filter(|n| n.tag_name().name() == "sldIdLst" && n.tag_name().namespace() == Some(PML_NS))
        .flat_map(|list| list.children())
        .filter(|n| n.tag_name().name() == "sldId" && n.tag_name().namespace() == Some(PML_NS))
        .filter_map(|n| n.attribute((REL_REF_NS, "id")))
        .filter_map(|rel_id| rels.get(rel_id))
        .map(|target| rel_target_to_part(target))
        .collect();

    if parts.is_empty() {
        let mut numbered: Vec<(u32, String)> = zip
            .file_names()
            .filter_map(|name| {
                let n = name
                    .strip_prefix("ppt/slides/slide")?
                    .strip_suffix(".xml")?
                    .parse::<u32>()
                    .ok()?;
                Some((n, name.to_string()))
            })
            .collect();
        numbered.sort();
        parts = numbered.into_iter().map(|(_, name)| name).collect();
    }

    parts
}

/// Explicit solid background fill of a slide, when declared.
fn parse_background(slide_xml: &str) -> Option<[u8; 3]> {
    let xml = roxmltree::Document::parse(slide_xml).ok()?;
    let bg = xml
        .descendants()
        .find(|n| n.tag_name().name() == "bg" && n.tag_name().namespace() == Some(PML_NS))?;
    let srgb = bg
        .descendants()
        .find(|n| n.tag_name().name() == "srgbClr" && n.tag_name().namespace() == Some(DML_NS))?;
    srgb.attribute("val").and_then(parse_hex_color)
}

/// Load a presentation: page size from `p:sldSz` and one entry per slide,
/// in deck order.
pub fn load(path: &Path) -> Result<SlideDeck, Error> {
    let file = File::open(path)?;
    let mut zip = zip::ZipArchive::new(file)?;

    let Some(part) = read_part(&mut zip, "ppt/presentation.xml") else {
        return Err(Error::InvalidPackage("missing ppt/presentation.xml".into()));
    };
    let xml = roxmltree::Document::parse(&part)?;

    let sld_sz = pml(xml.root_element(), "sldSz");
    let attr = |name| {
        sld_sz
            .and_then(|n| n.attribute(name))
            .and_then(|v| v.parse::<f32>().ok())
    };
    let page_width = emu_to_pts(attr("cx").unwrap_or(DEFAULT_CX));
    let page_height = emu_to_pts(attr("cy").unwrap_or(DEFAULT_CY));

    let parts = slide_parts(&mut zip, &xml);
    if parts.is_empty() {
        return Err(Error::InvalidPackage("presentation has no slides".into()));
    }

    let mut slides = Vec::with_capacity(parts.len());
    for (i, part_name) in parts.iter().enumerate() {
        let background = read_part(&mut zip, part_name)
            .as_deref()
            .and_then(parse_background);
        slides.push(Slide {
            number: i + 1,
            background,
        });
    }

    Ok(SlideDeck {
        page_width,
        page_height,
        slides,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const PRESENTATION: &str = r#"<?xml version="1.0"?>
<p:presentation
    xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"
    xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <p:sldIdLst>
    <p:sldId id="256" r:id="rId2"/>
    <p:sldId id="257" r:id="rId3"/>
  </p:sldIdLst>
  <p:sldSz cx="12192000" cy="6858000"/>
</p:presentation>"#;

    const RELS: &str = r#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide2.xml"/>
</Relationships>"#;

    const RED_SLIDE: &str = r#"<?xml version="1.0"?>
<p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"
       xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
  <p:cSld>
    <p:bg><p:bgPr><a:solidFill><a:srgbClr val="CC0000"/></a:solidFill></p:bgPr></p:bg>
    <p:spTree/>
  </p:cSld>
</p:sld>"#;

    const PLAIN_SLIDE: &str = r#"<?xml version="1.0"?>
<p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
  <p:cSld><p:spTree/></p:cSld>
</p:sld>"#;

    fn write_deck(dir: &Path, parts: &[(&str, &str)]) -> std::path::PathBuf {
        let path = dir.join("deck.pptx");
        let file = File::create(&path).unwrap();
        let mut archive = zip::ZipWriter::new(file);
        for (name, content) in parts {
            archive
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            archive.write_all(content.as_bytes()).unwrap();
        }
        archive.finish().unwrap();
        path
    }

    #[test]
    fn deck_page_size_and_slide_order_come_from_the_package() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_deck(
            dir.path(),
            &[
                ("ppt/presentation.xml", PRESENTATION),
                ("ppt/_rels/presentation.xml.rels", RELS),
                ("ppt/slides/slide1.xml", RED_SLIDE),
                ("ppt/slides/slide2.xml", PLAIN_SLIDE),
            ],
        );

        let deck = load(&path).unwrap();
        assert_eq!(deck.page_width, 960.0); // 12192000 EMU
        assert_eq!(deck.page_height, 540.0);
        assert_eq!(deck.slides.len(), 2);
        assert_eq!(deck.slides[0].background, Some([0xCC, 0x00, 0x00]));
        assert_eq!(deck.slides[1].background, None);
    }

    #[test]
    fn slide_scan_fallback_when_the_id_list_is_missing() {
        let minimal = r#"<?xml version="1.0"?>
<p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"/>"#;
        let dir = tempfile::tempdir().unwrap();
        let path = write_deck(
            dir.path(),
            &[
                ("ppt/presentation.xml", minimal),
                ("ppt/slides/slide2.xml", PLAIN_SLIDE),
                ("ppt/slides/slide1.xml", PLAIN_SLIDE),
                ("ppt/slides/slide10.xml", PLAIN_SLIDE),
            ],
        );

        let deck = load(&path).unwrap();
        // Default page size, numeric slide order.
        assert_eq!(deck.page_width, 720.0);
        assert_eq!(deck.slides.len(), 3);
        assert_eq!(deck.slides.last().unwrap().number, 3);
    }

    #[test]
    fn packages_without_a_presentation_part_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_deck(dir.path(), &[("ppt/slides/slide1.xml", PLAIN_SLIDE)]);
        assert!(matches!(load(&path), Err(Error::InvalidPackage(_))));
    }
}
