use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use officeside_pdf::{
    ConvertOptions, Error, PdfExtensionRule, PdfMarkupRenderer, convert_docx_to_pdf,
    convert_html_to_pdf, convert_ppt_to_pdf, convert_pptx_to_pdf,
    convert_spreadsheet_to_pdf_with, convert_xlsx_to_pdf, resolve_output_path,
};

/// Temp dir with a dot-free prefix, so derived output paths stay inside
/// it (resolution truncates at the first dot of the whole path).
fn workdir() -> TempDir {
    tempfile::Builder::new()
        .prefix("officeside-")
        .tempdir()
        .unwrap()
}

fn zip_fixture(path: &Path, parts: &[(&str, &str)]) {
    let file = fs::File::create(path).unwrap();
    let mut archive = zip::ZipWriter::new(file);
    for (name, content) in parts {
        archive
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        archive.write_all(content.as_bytes()).unwrap();
    }
    archive.finish().unwrap();
}

fn count_pages(pdf: &[u8]) -> usize {
    String::from_utf8_lossy(pdf).matches("/MediaBox").count()
}

// ── Fixtures ─────────────────────────────────────────────────────────────

fn write_docx(path: &Path) {
    let document = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Hello from the fixture document.</w:t></w:r></w:p>
    <w:p>
      <w:fldSimple w:instr=" DOCPROPERTY LastSavedTime \* MERGEFORMAT ">
        <w:r><w:t>1999-01-01</w:t></w:r>
      </w:fldSimple>
    </w:p>
    <w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr>
  </w:body>
</w:document>"#;
    let core = r#"<?xml version="1.0" encoding="UTF-8"?>
<cp:coreProperties
    xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties"
    xmlns:dc="http://purl.org/dc/elements/1.1/"
    xmlns:dcterms="http://purl.org/dc/terms/"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <dc:title>Fixture</dc:title>
  <dc:creator>tester</dc:creator>
  <dcterms:modified xsi:type="dcterms:W3CDTF">2024-06-01T12:00:00Z</dcterms:modified>
</cp:coreProperties>"#;
    zip_fixture(
        path,
        &[("word/document.xml", document), ("docProps/core.xml", core)],
    );
}

fn write_pptx(path: &Path, slide_count: usize) {
    let mut parts: Vec<(String, String)> = Vec::new();

    let slide_ids: String = (0..slide_count)
        .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, 2 + i))
        .collect();
    parts.push((
        "ppt/presentation.xml".to_string(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<p:presentation
    xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"
    xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <p:sldIdLst>{slide_ids}</p:sldIdLst>
  <p:sldSz cx="9144000" cy="6858000"/>
</p:presentation>"#
        ),
    ));

    let relationships: String = (0..slide_count)
        .map(|i| {
            format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{}.xml"/>"#,
                2 + i,
                1 + i
            )
        })
        .collect();
    parts.push((
        "ppt/_rels/presentation.xml.rels".to_string(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{relationships}</Relationships>"#
        ),
    ));

    for i in 0..slide_count {
        parts.push((
            format!("ppt/slides/slide{}.xml", 1 + i),
            r#"<?xml version="1.0" encoding="UTF-8"?>
<p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"
       xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
  <p:cSld><p:spTree/></p:cSld>
</p:sld>"#
                .to_string(),
        ));
    }

    let borrowed: Vec<(&str, &str)> = parts
        .iter()
        .map(|(name, content)| (name.as_str(), content.as_str()))
        .collect();
    zip_fixture(path, &borrowed);
}

fn write_xlsx(path: &Path) {
    let content_types = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#;
    let root_rels = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;
    let workbook = r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
          xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;
    let workbook_rels = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#;
    let sheet = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1">
      <c r="A1" t="inlineStr"><is><t>Item</t></is></c>
      <c r="B1" t="inlineStr"><is><t>Qty</t></is></c>
    </row>
    <row r="2">
      <c r="A2" t="inlineStr"><is><t>Bolt</t></is></c>
      <c r="B2"><v>40</v></c>
    </row>
  </sheetData>
</worksheet>"#;
    zip_fixture(
        path,
        &[
            ("[Content_Types].xml", content_types),
            ("_rels/.rels", root_rels),
            ("xl/workbook.xml", workbook),
            ("xl/_rels/workbook.xml.rels", workbook_rels),
            ("xl/worksheets/sheet1.xml", sheet),
        ],
    );
}

// ── DOCX ─────────────────────────────────────────────────────────────────

#[test]
fn docx_converts_end_to_end() {
    let dir = workdir();
    let source = dir.path().join("report.docx");
    write_docx(&source);

    let dest = dir.path().join("out.pdf");
    let outcome = convert_docx_to_pdf(&source, Some(&dest), None).unwrap();

    assert_eq!(outcome.output_path, dest);
    let bytes = fs::read(&dest).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
    assert_eq!(outcome.byte_size, bytes.len() as u64);
    assert_eq!(count_pages(&bytes), 1);
}

#[test]
fn docx_refreshes_simple_field_values() {
    let dir = workdir();
    let source = dir.path().join("report.docx");
    write_docx(&source);

    let dest = dir.path().join("out.pdf");
    convert_docx_to_pdf(&source, Some(&dest), None).unwrap();

    // Content streams are uncompressed, so the shown text is visible in
    // the output bytes.
    let text = fs::read_to_string(&dest).unwrap_or_else(|_| {
        String::from_utf8_lossy(&fs::read(&dest).unwrap()).into_owned()
    });
    assert!(text.contains("2024-06-01T12:00:00Z"), "field not refreshed");
    assert!(!text.contains("1999-01-01"), "stale cached field kept");
}

#[test]
fn missing_docx_is_file_not_found_and_writes_nothing() {
    let dir = workdir();
    let source = dir.path().join("missing.docx");
    let dest = dir.path().join("never.pdf");

    let err = convert_docx_to_pdf(&source, Some(&dest), None).unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)), "got {err:?}");
    assert!(!dest.exists());
}

// ── PPTX / PPT ───────────────────────────────────────────────────────────

#[test]
fn pptx_produces_one_page_per_slide_at_deck_page_size() {
    let dir = workdir();
    let source = dir.path().join("deck.pptx");
    write_pptx(&source, 3);

    let dest = dir.path().join("deck.pdf");
    convert_pptx_to_pdf(&source, Some(&dest)).unwrap();

    let bytes = fs::read(&dest).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
    assert_eq!(count_pages(&bytes), 3);
    // 9144000 x 6858000 EMU -> 720 x 540 points
    assert!(String::from_utf8_lossy(&bytes).contains("[0 0 720 540]"));
}

#[test]
fn legacy_ppt_is_reported_unsupported() {
    let dir = workdir();
    let source = dir.path().join("deck.ppt");
    fs::write(&source, b"not really a deck").unwrap();

    let err = convert_ppt_to_pdf(&source, None).unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)), "got {err:?}");
}

// ── Spreadsheets ─────────────────────────────────────────────────────────

#[test]
fn xlsx_converts_end_to_end() {
    let dir = workdir();
    let source = dir.path().join("table.xlsx");
    write_xlsx(&source);

    let dest = dir.path().join("table.pdf");
    let outcome = convert_xlsx_to_pdf(&source, Some(&dest), true, true).unwrap();

    assert!(outcome.output_path.is_file());
    assert!(fs::read(&dest).unwrap().starts_with(b"%PDF-"));
}

#[test]
fn disabled_flags_strip_markers_from_intermediate_markup() {
    let dir = workdir();
    let source = dir.path().join("table.xlsx");
    write_xlsx(&source);

    let dest = dir.path().join("bare.pdf");
    let options = ConvertOptions {
        include_column_headers: false,
        include_row_numbers: false,
        debug_dump_markup: true,
        ..Default::default()
    };
    convert_spreadsheet_to_pdf_with(&source, Some(&dest), &options, &PdfMarkupRenderer).unwrap();

    let dump = fs::read_to_string(dir.path().join("bare.html")).unwrap();
    assert!(!dump.contains("<th>"), "header/row markers in: {dump}");
    assert!(dump.contains("<td>Bolt</td>"));
    assert!(dump.contains("<td>40</td>"));
}

#[test]
fn default_flags_keep_markers_in_intermediate_markup() {
    let dir = workdir();
    let source = dir.path().join("table.xlsx");
    write_xlsx(&source);

    let dest = dir.path().join("full.pdf");
    let options = ConvertOptions {
        debug_dump_markup: true,
        ..Default::default()
    };
    convert_spreadsheet_to_pdf_with(&source, Some(&dest), &options, &PdfMarkupRenderer).unwrap();

    let dump = fs::read_to_string(dir.path().join("full.html")).unwrap();
    assert!(dump.contains("<th>A</th><th>B</th>"));
    assert!(dump.contains("<th>1</th>"));
}

// ── HTML ─────────────────────────────────────────────────────────────────

#[test]
fn html_converts_with_derived_output_path() {
    let dir = workdir();
    let source = dir.path().join("page.html");
    fs::write(
        &source,
        "<html><body><h1>Title</h1><p>Hello from markup.</p></body></html>",
    )
    .unwrap();

    let outcome = convert_html_to_pdf(&source, None).unwrap();

    let expected = resolve_output_path(
        source.to_str().unwrap(),
        None,
        PdfExtensionRule::Suffix,
    )
    .unwrap();
    assert_eq!(outcome.output_path, PathBuf::from(expected));
    assert!(fs::read(&outcome.output_path).unwrap().starts_with(b"%PDF-"));
}

#[test]
fn wrong_destination_extension_is_normalized() {
    let dir = workdir();
    let source = dir.path().join("page.html");
    fs::write(&source, "<html><body><p>x</p></body></html>").unwrap();

    let dest = dir.path().join("result.txt");
    let outcome = convert_html_to_pdf(&source, Some(&dest)).unwrap();

    assert_eq!(outcome.output_path, dir.path().join("result.pdf"));
    assert!(outcome.output_path.is_file());
    assert!(!dest.exists());
}

#[test]
fn malformed_html_is_a_typed_error_with_no_artifact() {
    let dir = workdir();
    let source = dir.path().join("broken.html");
    fs::write(&source, "<html><body><p>unclosed</body></html>").unwrap();

    let dest = dir.path().join("broken.pdf");
    let err = convert_html_to_pdf(&source, Some(&dest)).unwrap_err();
    assert!(matches!(err, Error::Xml(_)), "got {err:?}");
    assert!(!dest.exists());
}
