//! PDF renderer – takes a [`LayoutConfig`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API).

use std::collections::{HashMap, HashSet};

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use printpdf::*;

use crate::fonts::BuiltinFamily;
use crate::layout_config::*;

/// pt → mm
const PT_TO_MM: f32 = 0.352778;

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Render a LayoutConfig into PDF bytes.
///
/// Images whose `src` is not a base64 data URI, or whose bytes cannot be
/// decoded, are skipped with a `log::warn`.
pub fn render_pdf(config: &LayoutConfig) -> Result<Vec<u8>, String> {
    if config.page_width_pt <= 0.0 || config.page_height_pt <= 0.0 {
        return Err(format!(
            "invalid page size {}×{} pt",
            config.page_width_pt, config.page_height_pt
        ));
    }
    let page_w = Mm(config.page_width_pt * PT_TO_MM);
    let page_h = Mm(config.page_height_pt * PT_TO_MM);

    let mut doc = PdfDocument::new(&config.title);
    let image_resources = register_images(&mut doc, config);

    let mut pages: Vec<PdfPage> = config
        .pages
        .iter()
        .map(|page_layout| {
            let mut ops = Vec::new();
            for lbox in &page_layout.boxes {
                render_box(&mut ops, lbox, config.page_height_pt, &image_resources);
            }
            PdfPage::new(page_w, page_h, ops)
        })
        .collect();

    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }
    log::debug!("rendering {} page(s)", pages.len());

    doc.with_pages(pages);
    let mut warnings = Vec::new();
    // Raw text operators are dropped unless `secure` is off.
    let options = PdfSaveOptions {
        secure: false,
        ..PdfSaveOptions::default()
    };
    let bytes = doc.save(&options, &mut warnings);
    if !warnings.is_empty() {
        log::debug!("printpdf reported {} warning(s) while saving", warnings.len());
    }
    Ok(bytes)
}

fn register_images(doc: &mut PdfDocument, config: &LayoutConfig) -> HashMap<String, ImageResource> {
    let mut all_srcs: HashSet<String> = HashSet::new();
    config.visit_boxes(&mut |b| {
        if let Some(img) = &b.image {
            all_srcs.insert(img.src.clone());
        }
    });

    let mut resources = HashMap::new();
    let mut img_warnings: Vec<PdfWarnMsg> = Vec::new();
    for src in all_srcs {
        let bytes = match parse_data_uri(&src) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("Skipping image: {e}");
                continue;
            }
        };
        let dyn_img = match ::image::load_from_memory(&bytes) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("Skipping image: decode error: {e}");
                continue;
            }
        };
        let raw = match RawImage::decode_from_bytes(&bytes, &mut img_warnings) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Skipping image: PDF encode error: {e}");
                continue;
            }
        };
        let resource = ImageResource {
            xobj_id: doc.add_image(&raw),
            px_width: dyn_img.width(),
            px_height: dyn_img.height(),
        };
        resources.insert(src, resource);
    }
    resources
}

/// Encode a string as Windows-1252 bytes. Builtin fonts use
/// WinAnsiEncoding, so each glyph is one byte 0x00–0xFF; characters outside
/// it become `?`.
fn to_winlatin(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80, // euro
            '\u{201A}' => 0x82, // single low-9 quote
            '\u{201E}' => 0x84, // double low-9 quote
            '\u{2026}' => 0x85, // ellipsis
            '\u{2018}' => 0x91, // left single quote
            '\u{2019}' => 0x92, // right single quote
            '\u{201C}' => 0x93, // left double quote
            '\u{201D}' => 0x94, // right double quote
            '\u{2022}' => 0x95, // bullet
            '\u{2013}' => 0x96, // en-dash
            '\u{2014}' => 0x97, // em-dash
            '\u{2122}' => 0x99, // trademark
            '\u{00A0}' => 0x20, // non-breaking space -> space
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect()
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
pub(crate) fn parse_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let rest = src.strip_prefix("data:").ok_or_else(|| {
        let preview: String = src.chars().take(80).collect();
        format!("image src must be a base64 data URI, got {preview:?}")
    })?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| "invalid data URI: missing `,` separator".to_string())?;
    if !header.contains(";base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    BASE64_STD
        .decode(data.trim())
        .map_err(|e| format!("base64 decode error: {e}"))
}

fn builtin_font(family: &str, bold: bool, italic: bool) -> BuiltinFont {
    match (BuiltinFamily::from_name(family), bold, italic) {
        (BuiltinFamily::Helvetica, true, true) => BuiltinFont::HelveticaBoldOblique,
        (BuiltinFamily::Helvetica, true, false) => BuiltinFont::HelveticaBold,
        (BuiltinFamily::Helvetica, false, true) => BuiltinFont::HelveticaOblique,
        (BuiltinFamily::Helvetica, false, false) => BuiltinFont::Helvetica,
        (BuiltinFamily::Times, true, true) => BuiltinFont::TimesBoldItalic,
        (BuiltinFamily::Times, true, false) => BuiltinFont::TimesBold,
        (BuiltinFamily::Times, false, true) => BuiltinFont::TimesItalic,
        (BuiltinFamily::Times, false, false) => BuiltinFont::TimesRoman,
        (BuiltinFamily::Courier, true, true) => BuiltinFont::CourierBoldOblique,
        (BuiltinFamily::Courier, true, false) => BuiltinFont::CourierBold,
        (BuiltinFamily::Courier, false, true) => BuiltinFont::CourierOblique,
        (BuiltinFamily::Courier, false, false) => BuiltinFont::Courier,
    }
}

fn rgb(c: &[f32; 4]) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

fn stroke(ops: &mut Vec<Op>, color: &[f32; 4], width: f32, points: Vec<LinePoint>, closed: bool) {
    ops.push(Op::SetOutlineColor { col: rgb(color) });
    ops.push(Op::SetOutlineThickness { pt: Pt(width) });
    ops.push(Op::DrawLine {
        line: Line {
            points,
            is_closed: closed,
        },
    });
}

fn fill_rect(ops: &mut Vec<Op>, color: &[f32; 4], x1: f32, y1: f32, x2: f32, y2: f32) {
    ops.push(Op::SetFillColor { col: rgb(color) });
    ops.push(Op::DrawPolygon {
        polygon: Polygon {
            rings: vec![PolygonRing {
                points: vec![point(x1, y1), point(x2, y1), point(x2, y2), point(x1, y2)],
            }],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        },
    });
}

fn write_text(ops: &mut Vec<Op>, text: &str, x: f32, y: f32, size: f32, font: BuiltinFont, color: &[f32; 4]) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point { x: Pt(x), y: Pt(y) },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(size),
        font,
    });
    ops.push(Op::SetFillColor { col: rgb(color) });
    // printpdf writes builtin-font text as UTF-8, so the encoded bytes go out
    // through a raw `Tj`. The empty write only registers the font resource.
    ops.push(Op::WriteTextBuiltinFont {
        items: Vec::new(),
        font,
    });
    ops.push(Op::Unknown {
        key: "Tj".to_string(),
        value: vec![DictItem::String {
            data: to_winlatin(text),
            literal: false,
        }],
    });
    ops.push(Op::EndTextSection);
}

/// Recursively render a LayoutBox and its children into PDF ops.
fn render_box(
    ops: &mut Vec<Op>,
    lbox: &LayoutBox,
    page_height: f32,
    images: &HashMap<String, ImageResource>,
) {
    // PDF origin is bottom-left; layout origin is top-left.
    let top = page_height - lbox.y;
    let bottom = top - lbox.height;
    let left = lbox.x;
    let right = lbox.x + lbox.width;

    if let Some(bg) = &lbox.background_color {
        fill_rect(ops, bg, left, bottom, right, top);
    }

    if let Some(border) = &lbox.border {
        stroke(
            ops,
            &border.color,
            border.width,
            vec![
                point(left, top),
                point(right, top),
                point(right, bottom),
                point(left, bottom),
            ],
            true,
        );
    }

    for rule in &lbox.rules {
        // Centre the stroke on the inside of the edge.
        let inset = rule.width / 2.0;
        let points = match rule.edge {
            Edge::Top => vec![point(left, top - inset), point(right, top - inset)],
            Edge::Bottom => vec![point(left, bottom + inset), point(right, bottom + inset)],
            Edge::Left => vec![point(left + inset, top), point(left + inset, bottom)],
            Edge::Right => vec![point(right - inset, top), point(right - inset, bottom)],
        };
        stroke(ops, &rule.color, rule.width, points, false);
    }

    if let Some(text) = &lbox.text {
        let font = builtin_font(&text.font_family, text.bold, text.italic);
        // Baseline ≈ top of line + ascender (approx 0.75 × font_size)
        let ascender = text.font_size * 0.75;

        for tline in text.lines.iter().filter(|l| !l.text.is_empty()) {
            let text_x = left + tline.x_offset;
            let text_y = top - tline.y_offset - ascender;
            write_text(ops, &tline.text, text_x, text_y, text.font_size, font, &text.color);

            if text.underline {
                let underline_y = text_y - text.font_size * 0.1;
                let end = if tline.width > 0.0 {
                    text_x + tline.width
                } else {
                    right
                };
                stroke(
                    ops,
                    &text.color,
                    0.5,
                    vec![point(text_x, underline_y), point(end, underline_y)],
                    false,
                );
            }
        }

        if let Some(marker) = &text.list_marker {
            let marker_font = builtin_font(&text.font_family, false, false);
            write_text(
                ops,
                marker,
                left - 16.0,
                top - ascender,
                text.font_size,
                marker_font,
                &text.color,
            );
        }
    }

    if let Some(img) = &lbox.image {
        if let Some(res) = images.get(&img.src) {
            // At dpi=72 printpdf renders 1 px = 1 pt, so scale = pt / px.
            let scale = |want: f32, px: u32| if px > 0 { want / px as f32 } else { 1.0 };
            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(left)),
                    translate_y: Some(Pt(top - img.height)),
                    dpi: Some(72.0),
                    scale_x: Some(scale(img.width, res.px_width)),
                    scale_y: Some(scale(img.height, res.px_height)),
                    rotate: None,
                },
            });
        }
    }

    for child in &lbox.children {
        render_box(ops, child, page_height, images);
    }
}
