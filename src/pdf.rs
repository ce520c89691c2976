use std::collections::HashMap;
use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref, Str};

use crate::error::Error;
use crate::fonts::{self, FontEntry};
use crate::model::{Alignment, Markup, SlideDeck, WmlPackage};
use crate::render::{MarkupRenderer, SlideRasterizer, WmlExporter};

// ── Shared text layout ───────────────────────────────────────────────────

struct PageGeometry {
    width: f32,
    height: f32,
    margin_top: f32,
    margin_bottom: f32,
    margin_left: f32,
    margin_right: f32,
}

impl PageGeometry {
    fn content_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }
}

/// One positioned piece of text; `font` indexes the registered entries.
struct PlacedText {
    x: f32,
    y: f32,
    font: usize,
    size: f32,
    color: Option<[u8; 3]>,
    bytes: Vec<u8>,
}

struct TextSeg {
    font: usize,
    size: f32,
    color: Option<[u8; 3]>,
    bytes: Vec<u8>,
    width: f32,
}

struct Line {
    segments: Vec<TextSeg>,
    width: f32,
    height: f32,
}

impl Line {
    fn empty() -> Self {
        Line {
            segments: Vec::new(),
            width: 0.0,
            height: 0.0,
        }
    }

    fn push(&mut self, seg: TextSeg) {
        self.width += seg.width;
        self.height = self.height.max(seg.size);
        // Merge into the previous segment when the style is unchanged.
        if let Some(last) = self.segments.last_mut()
            && last.font == seg.font
            && last.size == seg.size
            && last.color == seg.color
        {
            last.bytes.extend_from_slice(&seg.bytes);
            last.width += seg.width;
            return;
        }
        self.segments.push(seg);
    }
}

/// Accumulates placed text top-to-bottom, breaking pages as the cursor
/// runs out of room.
struct LayoutSink {
    geometry: PageGeometry,
    cursor_y: f32,
    pages: Vec<Vec<PlacedText>>,
}

impl LayoutSink {
    fn new(geometry: PageGeometry) -> Self {
        let cursor_y = geometry.height - geometry.margin_top;
        LayoutSink {
            geometry,
            cursor_y,
            pages: vec![Vec::new()],
        }
    }

    fn break_page(&mut self) {
        self.pages.push(Vec::new());
        self.cursor_y = self.geometry.height - self.geometry.margin_top;
    }

    fn ensure_room(&mut self, height: f32) {
        if self.cursor_y - height < self.geometry.margin_bottom {
            self.break_page();
        }
    }

    fn advance(&mut self, dy: f32) {
        self.cursor_y -= dy;
    }

    /// Place one line with its left edge at `x`, prefixed by an optional
    /// hanging label (list bullets/numbers). `spacing` scales the line
    /// advance, not the baseline.
    fn place_line(&mut self, line: Line, x: f32, label: Option<TextSeg>, spacing: f32) {
        let advance = line.height * spacing;
        self.ensure_room(advance);
        let baseline = self.cursor_y - line.height;
        let page = self.pages.last_mut().unwrap();

        if let Some(label) = label {
            page.push(PlacedText {
                x: x - label.width.max(0.0) - 4.0,
                y: baseline,
                font: label.font,
                size: label.size,
                color: label.color,
                bytes: label.bytes,
            });
        }

        let mut pen_x = x;
        for seg in line.segments {
            let width = seg.width;
            page.push(PlacedText {
                x: pen_x,
                y: baseline,
                font: seg.font,
                size: seg.size,
                color: seg.color,
                bytes: seg.bytes,
            });
            pen_x += width;
        }
        self.cursor_y -= advance;
    }
}

fn text_width(bytes: &[u8], widths: &[f32], size: f32) -> f32 {
    bytes
        .iter()
        .filter(|&&b| b >= 32)
        .map(|&b| widths.get((b - 32) as usize).copied().unwrap_or(500.0))
        .sum::<f32>()
        / 1000.0
        * size
}

/// Greedy word wrap of styled segments into lines of at most `avail`
/// points. A single token wider than the line is placed anyway.
fn wrap_segments(
    segments: &[(usize, f32, Option<[u8; 3]>, String)],
    entries: &[FontEntry],
    avail: f32,
) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut line = Line::empty();

    for (font, size, color, text) in segments {
        let widths = &entries[*font].widths_1000;
        for token in text.split_inclusive(' ') {
            let bytes = fonts::to_winansi_bytes(token);
            if bytes.is_empty() {
                continue;
            }
            let width = text_width(&bytes, widths, *size);
            if !line.segments.is_empty() && line.width + width > avail {
                lines.push(std::mem::replace(&mut line, Line::empty()));
            }
            line.push(TextSeg {
                font: *font,
                size: *size,
                color: *color,
                bytes,
                width,
            });
        }
    }

    if !line.segments.is_empty() {
        lines.push(line);
    }
    lines
}

fn line_start_x(geometry: &PageGeometry, alignment: Alignment, indent: f32, width: f32) -> f32 {
    let left = geometry.margin_left + indent;
    let avail = geometry.content_width() - indent;
    match alignment {
        Alignment::Center => left + ((avail - width) / 2.0).max(0.0),
        Alignment::Right => left + (avail - width).max(0.0),
        Alignment::Left | Alignment::Justify => left,
    }
}

/// Serialize accumulated pages: one content stream and one page object
/// each, every page referencing the full font set.
fn emit_pages(
    mut pdf: Pdf,
    next_ref: &mut i32,
    entries: &[FontEntry],
    pages: Vec<Vec<PlacedText>>,
    page_width: f32,
    page_height: f32,
) -> Vec<u8> {
    let catalog_id = Ref::new(1);
    let pages_id = Ref::new(2);

    let mut page_ids = Vec::with_capacity(pages.len());
    for placed in &pages {
        let content_id = Ref::new(*next_ref);
        let page_id = Ref::new(*next_ref + 1);
        *next_ref += 2;
        page_ids.push(page_id);

        let mut content = Content::new();
        for t in placed {
            let [r, g, b] = t.color.unwrap_or([0, 0, 0]);
            content
                .begin_text()
                .set_fill_rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
                .set_font(Name(entries[t.font].pdf_name.as_bytes()), t.size)
                .next_line(t.x, t.y)
                .show(Str(&t.bytes))
                .end_text();
        }
        pdf.stream(content_id, &content.finish());

        let mut page = pdf.page(page_id);
        page.media_box(Rect::new(0.0, 0.0, page_width, page_height))
            .parent(pages_id)
            .contents(content_id);
        let mut resources = page.resources();
        let mut fonts_dict = resources.fonts();
        for entry in entries {
            fonts_dict.pair(Name(entry.pdf_name.as_bytes()), entry.font_ref);
        }
    }

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(page_ids.len() as i32);
    pdf.finish()
}

// ── WordprocessingML export ──────────────────────────────────────────────

/// Built-in [`WmlExporter`]: paginated text layout of a parsed package,
/// with document fonts embedded from the system index.
#[derive(Clone, Debug, Default)]
pub struct PdfWmlExporter {
    main_font: Option<String>,
}

impl PdfWmlExporter {
    pub fn new(main_font: Option<String>) -> Self {
        PdfWmlExporter { main_font }
    }
}

impl WmlExporter for PdfWmlExporter {
    fn export(&self, package: &WmlPackage) -> Result<Vec<u8>, Error> {
        let mut pdf = Pdf::new();
        let mut next_ref = 3; // 1 = catalog, 2 = page tree
        let mut entries: Vec<FontEntry> = Vec::new();
        let mut key_to_entry: HashMap<String, usize> = HashMap::new();

        {
            let mut alloc = || {
                let r = Ref::new(next_ref);
                next_ref += 1;
                r
            };
            for para in &package.paragraphs {
                for run in &para.runs {
                    let key = fonts::font_key(run);
                    if key_to_entry.contains_key(&key) {
                        continue;
                    }
                    let pdf_name = format!("F{}", entries.len() + 1);
                    let entry = fonts::register_font(
                        &mut pdf,
                        fonts::primary_font_name(&run.font_name),
                        run.bold,
                        run.italic,
                        pdf_name,
                        &mut alloc,
                        self.main_font.as_deref(),
                    );
                    key_to_entry.insert(key, entries.len());
                    entries.push(entry);
                }
            }
        }

        let geometry = PageGeometry {
            width: package.page_width,
            height: package.page_height,
            margin_top: package.margin_top,
            margin_bottom: package.margin_bottom,
            margin_left: package.margin_left,
            margin_right: package.margin_right,
        };
        let mut sink = LayoutSink::new(geometry);

        for para in &package.paragraphs {
            if !para.contextual_spacing {
                sink.advance(para.space_before);
            }
            if para.content_height > 0.0 {
                sink.ensure_room(para.content_height);
                sink.advance(para.content_height);
            }

            let segments: Vec<(usize, f32, Option<[u8; 3]>, String)> = para
                .runs
                .iter()
                .map(|run| {
                    (
                        key_to_entry[&fonts::font_key(run)],
                        run.font_size,
                        run.color,
                        run.text.clone(),
                    )
                })
                .collect();

            let avail = sink.geometry.content_width() - para.indent_left;
            let lines = wrap_segments(&segments, &entries, avail.max(1.0));
            let spacing = package.line_spacing.max(1.0);
            for (i, line) in lines.into_iter().enumerate() {
                let x = line_start_x(&sink.geometry, para.alignment, para.indent_left, line.width);
                let label = (i == 0 && !para.list_label.is_empty()).then(|| {
                    let seg = &line.segments[0];
                    let bytes = fonts::to_winansi_bytes(&para.list_label);
                    let width = text_width(&bytes, &entries[seg.font].widths_1000, seg.size);
                    TextSeg {
                        font: seg.font,
                        size: seg.size,
                        color: seg.color,
                        bytes,
                        width,
                    }
                });
                sink.place_line(line, x, label, spacing);
            }

            if !para.contextual_spacing {
                sink.advance(para.space_after);
            }
        }

        let pages = std::mem::take(&mut sink.pages);
        Ok(emit_pages(
            pdf,
            &mut next_ref,
            &entries,
            pages,
            package.page_width,
            package.page_height,
        ))
    }
}

// ── Markup rendering ─────────────────────────────────────────────────────

struct TextBlock {
    text: String,
    size: f32,
    bold: bool,
    space_after: f32,
}

fn subtree_text(node: roxmltree::Node) -> String {
    let mut text = String::new();
    for piece in node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
    {
        for word in piece.split_whitespace() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(word);
        }
    }
    text
}

fn collect_blocks(node: roxmltree::Node, blocks: &mut Vec<TextBlock>) {
    for child in node.children().filter(|n| n.is_element()) {
        let (size, bold, space_after) = match child.tag_name().name() {
            "head" | "style" | "script" | "title" => continue,
            "h1" => (24.0, true, 12.0),
            "h2" => (18.0, true, 10.0),
            "h3" => (14.0, true, 8.0),
            "h4" | "h5" | "h6" => (12.0, true, 8.0),
            "p" | "li" | "blockquote" | "pre" => (11.0, false, 6.0),
            "tr" => {
                let cells: Vec<String> = child
                    .children()
                    .filter(|n| n.is_element() && matches!(n.tag_name().name(), "td" | "th"))
                    .map(subtree_text)
                    .collect();
                let text = cells.join("  ");
                if !text.trim().is_empty() {
                    blocks.push(TextBlock {
                        text,
                        size: 10.0,
                        bold: false,
                        space_after: 2.0,
                    });
                }
                continue;
            }
            _ => {
                collect_blocks(child, blocks);
                continue;
            }
        };
        let text = subtree_text(child);
        if !text.is_empty() {
            blocks.push(TextBlock {
                text,
                size,
                bold,
                space_after,
            });
        }
    }
}

/// Built-in [`MarkupRenderer`]: a paginated text rendition of the
/// block-level markup structure, set in the base font on US Letter
/// pages. Deterministic: it never consults the system font index.
#[derive(Clone, Copy, Debug, Default)]
pub struct PdfMarkupRenderer;

const LETTER_WIDTH: f32 = 612.0;
const LETTER_HEIGHT: f32 = 792.0;

impl MarkupRenderer for PdfMarkupRenderer {
    fn render(&self, markup: &Markup) -> Result<Vec<u8>, Error> {
        let dom = markup.dom()?;

        let mut blocks = Vec::new();
        let body = dom
            .root_element()
            .children()
            .find(|n| n.is_element() && n.tag_name().name() == "body");
        match body {
            Some(body) => collect_blocks(body, &mut blocks),
            None => collect_blocks(dom.root(), &mut blocks),
        }

        let mut pdf = Pdf::new();
        let mut next_ref = 3;
        let mut entries = Vec::new();
        for (pdf_name, base) in [("F1", "Helvetica"), ("F2", "Helvetica-Bold")] {
            let font_ref = Ref::new(next_ref);
            next_ref += 1;
            pdf.type1_font(font_ref)
                .base_font(Name(base.as_bytes()))
                .encoding_predefined(Name(b"WinAnsiEncoding"));
            entries.push(FontEntry {
                pdf_name: pdf_name.to_string(),
                font_ref,
                widths_1000: fonts::helvetica_widths(),
            });
        }

        let mut sink = LayoutSink::new(PageGeometry {
            width: LETTER_WIDTH,
            height: LETTER_HEIGHT,
            margin_top: 72.0,
            margin_bottom: 72.0,
            margin_left: 72.0,
            margin_right: 72.0,
        });

        for block in blocks {
            let font = if block.bold { 1 } else { 0 };
            let segments = vec![(font, block.size, None, block.text)];
            for line in wrap_segments(&segments, &entries, sink.geometry.content_width()) {
                let x = sink.geometry.margin_left;
                sink.place_line(line, x, None, 1.2);
            }
            sink.advance(block.space_after);
        }

        let pages = std::mem::take(&mut sink.pages);
        Ok(emit_pages(
            pdf,
            &mut next_ref,
            &entries,
            pages,
            LETTER_WIDTH,
            LETTER_HEIGHT,
        ))
    }
}

// ── Slide image assembly ─────────────────────────────────────────────────

struct SlidePage {
    jpeg: Vec<u8>,
    px_width: u32,
    px_height: u32,
    pt_width: f32,
    pt_height: f32,
}

fn encode_jpeg(img: &RgbImage) -> Result<Vec<u8>, Error> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(Cursor::new(&mut jpeg), 90)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| Error::Render(format!("JPEG encoding failed: {e}")))?;
    Ok(jpeg)
}

/// Rasterize every slide at page-matched pixel dimensions and assemble
/// the images into a PDF, one slide per page, each page sized to the
/// deck's declared page size.
pub(crate) fn slides_to_pdf(
    deck: &SlideDeck,
    rasterizer: &dyn SlideRasterizer,
) -> Result<Vec<u8>, Error> {
    let px_width = deck.page_width.round().max(1.0) as u32;
    let px_height = deck.page_height.round().max(1.0) as u32;

    let mut pages = Vec::with_capacity(deck.slides.len());
    for slide in &deck.slides {
        log::info!("Rasterizing slide {}/{}", slide.number, deck.slides.len());
        let img = rasterizer.rasterize(slide, px_width, px_height)?;
        let (px_w, px_h) = img.dimensions();
        pages.push(SlidePage {
            jpeg: encode_jpeg(&img)?,
            px_width: px_w,
            px_height: px_h,
            pt_width: deck.page_width,
            pt_height: deck.page_height,
        });
    }

    images_to_pdf(&pages)
}

fn images_to_pdf(pages: &[SlidePage]) -> Result<Vec<u8>, Error> {
    if pages.is_empty() {
        return Err(Error::Render("no pages to assemble".into()));
    }

    let mut pdf = Pdf::new();
    let catalog_id = Ref::new(1);
    let pages_id = Ref::new(2);
    let mut next_ref = 3;

    let mut page_ids = Vec::with_capacity(pages.len());
    for page in pages {
        let image_id = Ref::new(next_ref);
        let content_id = Ref::new(next_ref + 1);
        let page_id = Ref::new(next_ref + 2);
        next_ref += 3;
        page_ids.push(page_id);

        {
            let mut image = pdf.image_xobject(image_id, &page.jpeg);
            image.filter(Filter::DctDecode);
            image.width(page.px_width as i32);
            image.height(page.px_height as i32);
            image.color_space().device_rgb();
            image.bits_per_component(8);
        }

        let mut content = Content::new();
        content
            .save_state()
            .transform([page.pt_width, 0.0, 0.0, page.pt_height, 0.0, 0.0])
            .x_object(Name(b"Im1"))
            .restore_state();
        pdf.stream(content_id, &content.finish());

        pdf.page(page_id)
            .media_box(Rect::new(0.0, 0.0, page.pt_width, page.pt_height))
            .parent(pages_id)
            .contents(content_id)
            .resources()
            .x_objects()
            .pair(Name(b"Im1"), image_id);
    }

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(page_ids.len() as i32);
    Ok(pdf.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CoreProperties, Paragraph, Run, Slide};
    use crate::raster::FlatRasterizer;

    fn count_pages(pdf: &[u8]) -> usize {
        let haystack = String::from_utf8_lossy(pdf);
        haystack.matches("/MediaBox").count()
    }

    fn package_with_paragraphs(count: usize) -> WmlPackage {
        let paragraphs = (0..count)
            .map(|i| Paragraph {
                runs: vec![Run {
                    text: format!("Paragraph number {i} with a little bit of text."),
                    font_size: 12.0,
                    font_name: "NoSuchFamily".into(),
                    bold: false,
                    italic: false,
                    color: None,
                }],
                space_before: 0.0,
                space_after: 8.0,
                content_height: 0.0,
                alignment: Alignment::Left,
                indent_left: 0.0,
                indent_hanging: 0.0,
                list_label: String::new(),
                contextual_spacing: false,
            })
            .collect();
        WmlPackage {
            page_width: 612.0,
            page_height: 792.0,
            margin_top: 72.0,
            margin_bottom: 72.0,
            margin_left: 72.0,
            margin_right: 72.0,
            line_spacing: 1.2,
            paragraphs,
            core: CoreProperties::default(),
        }
    }

    #[test]
    fn wml_export_produces_a_single_page_pdf() {
        let bytes = PdfWmlExporter::default()
            .export(&package_with_paragraphs(3))
            .unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        assert_eq!(count_pages(&bytes), 1);
    }

    #[test]
    fn wml_export_breaks_long_documents_into_pages() {
        let bytes = PdfWmlExporter::default()
            .export(&package_with_paragraphs(120))
            .unwrap();
        assert!(count_pages(&bytes) > 1);
    }

    #[test]
    fn markup_render_walks_block_elements() {
        let markup = Markup::from_source(
            "<html><head><title>skip me</title></head><body>\
             <h1>Title</h1><p>Body text.</p>\
             <table><tr><td>a</td><td>b</td></tr></table>\
             </body></html>"
                .to_string(),
        )
        .unwrap();
        let bytes = PdfMarkupRenderer.render(&markup).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        assert_eq!(count_pages(&bytes), 1);
    }

    #[test]
    fn slide_assembly_emits_one_page_per_slide() {
        let deck = SlideDeck {
            page_width: 720.0,
            page_height: 540.0,
            slides: (1..=3)
                .map(|number| Slide {
                    number,
                    background: None,
                })
                .collect(),
        };
        let bytes = slides_to_pdf(&deck, &FlatRasterizer).unwrap();
        assert_eq!(count_pages(&bytes), 3);
        assert!(String::from_utf8_lossy(&bytes).contains("[0 0 720 540]"));
    }

    #[test]
    fn empty_page_list_is_a_render_error() {
        let deck = SlideDeck {
            page_width: 720.0,
            page_height: 540.0,
            slides: vec![],
        };
        assert!(matches!(
            slides_to_pdf(&deck, &FlatRasterizer),
            Err(Error::Render(_))
        ));
    }
}
