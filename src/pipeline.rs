//! Pipeline – ties together parsing, styling, layout, pagination, and
//! rendering into a single function call.

use crate::css::Stylesheet;
use crate::dom::{collect_stylesheets, document_title, parse_html};
use crate::fonts::FontManager;
use crate::layout::compute_layout;
use crate::layout_config::{LayoutConfig, PageGeometry, A4_HEIGHT_PT, A4_WIDTH_PT};
use crate::pagination::{add_margin_boxes, paginate, PAGE_MARGIN_PT};
use crate::render::render_pdf;
use crate::style::{style_document, Cascade};

/// Page orientation for the generated PDF.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageOrientation {
    /// Portrait mode: height > width (default).
    #[default]
    Portrait,
    /// Landscape mode: width > height (short-edge binding).
    Landscape,
}

/// Configuration for the PDF generation pipeline. `@page` rules in the
/// document's stylesheets override the page size and margin.
#[derive(Clone)]
pub struct PipelineConfig {
    /// Document title embedded in the PDF metadata. Falls back to the
    /// document's `<title>` when `None`.
    pub title: Option<String>,
    /// Page width in points (default: A4 = 595.28).
    pub page_width: f32,
    /// Page height in points (default: A4 = 841.89).
    pub page_height: f32,
    /// Page margin in points (default: 40).
    pub page_margin: f32,
    /// Page orientation; swaps effective width/height when `Landscape`.
    pub orientation: PageOrientation,
    /// Metrics used for text measurement.
    pub fonts: FontManager,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            title: None,
            page_width: A4_WIDTH_PT,
            page_height: A4_HEIGHT_PT,
            page_margin: PAGE_MARGIN_PT,
            orientation: PageOrientation::Portrait,
            fonts: FontManager::default(),
        }
    }
}

impl PipelineConfig {
    /// Create an A4 landscape config.
    pub fn a4_landscape() -> Self {
        Self {
            orientation: PageOrientation::Landscape,
            ..Self::default()
        }
    }

    /// Page geometry after applying `@page` overrides and orientation.
    pub fn geometry(&self, cascade: &Cascade) -> PageGeometry {
        let page = cascade.page_rule();
        let (width, height) = page.size.unwrap_or((self.page_width, self.page_height));
        let geometry = PageGeometry {
            width,
            height,
            margin: page.margin.unwrap_or([self.page_margin; 4]),
        };
        match self.orientation {
            PageOrientation::Landscape if geometry.height > geometry.width => geometry.rotated(),
            _ => geometry,
        }
    }
}

/// Full pipeline: HTML string → PDF bytes. `extra_css` sheets are applied
/// after the document's own `<style>` elements, in order.
///
/// Returns `(pdf_bytes, layout_config)`.
pub fn generate_pdf(
    html: &str,
    config: &PipelineConfig,
    extra_css: &[&str],
) -> Result<(Vec<u8>, LayoutConfig), String> {
    let layout_config = compute_layout_config(html, config, extra_css)?;
    let pdf_bytes = render_pdf(&layout_config)?;
    Ok((pdf_bytes, layout_config))
}

/// Generate only the layout config (no PDF rendering) – useful for testing.
pub fn compute_layout_config(
    html: &str,
    config: &PipelineConfig,
    extra_css: &[&str],
) -> Result<LayoutConfig, String> {
    // 1. Parse HTML
    let dom = parse_html(html);

    // 2. Cascade document sheets, then the extra sheets
    let sheets: Vec<Stylesheet> = collect_stylesheets(&dom)
        .iter()
        .map(|css| Stylesheet::parse(css))
        .chain(extra_css.iter().map(|css| Stylesheet::parse(css)))
        .collect();
    let cascade = Cascade::new(sheets);
    let geometry = config.geometry(&cascade);
    log::debug!(
        "page {}x{} pt, margins {:?}",
        geometry.width,
        geometry.height,
        geometry.margin
    );
    let styled = style_document(&dom, &cascade);

    // 3. Compute layout
    let boxes = compute_layout(&styled, &geometry, &config.fonts)?;

    // 4. Paginate, then draw running headers / footers
    let mut layout_config = paginate(&boxes, &geometry, &config.fonts);
    let page = cascade.page_rule();
    add_margin_boxes(
        &mut layout_config,
        &page.margin_boxes,
        &geometry,
        styled.style(),
        &config.fonts,
    );

    if let Some(title) = config.title.clone().or_else(|| document_title(&dom)) {
        layout_config.title = title;
    }
    Ok(layout_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_basic() {
        let html = "<h1>Hello</h1><p>World</p>";
        let (bytes, config) = generate_pdf(html, &PipelineConfig::default(), &[]).unwrap();
        assert!(!bytes.is_empty());
        assert!(!config.pages.is_empty());
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn page_rule_overrides_geometry() {
        let html = "<html><head><title>Doc</title><style>@page { size: A4 landscape; margin: 2cm }</style></head><body><p>x</p></body></html>";
        let config = compute_layout_config(html, &PipelineConfig::default(), &[]).unwrap();
        assert!(config.page_width_pt > config.page_height_pt);
        assert_eq!(config.title, "Doc");
        let p = &config.pages[0].boxes[0];
        assert!((p.x - 56.69).abs() < 0.1);
    }

    #[test]
    fn landscape_orientation_swaps_size() {
        let config = compute_layout_config("<p>x</p>", &PipelineConfig::a4_landscape(), &[]).unwrap();
        assert_eq!(config.page_width_pt, A4_HEIGHT_PT);
        assert_eq!(config.page_height_pt, A4_WIDTH_PT);
    }

    #[test]
    fn extra_css_applies_after_document_styles() {
        let html = "<html><head><style>p { font-size: 20pt }</style></head><body><p>x</p></body></html>";
        let config = compute_layout_config(html, &PipelineConfig::default(), &["p { font-size: 11pt }"]).unwrap();
        let mut sizes = Vec::new();
        config.visit_boxes(&mut |b| {
            if let Some(t) = &b.text {
                sizes.push(t.font_size);
            }
        });
        assert_eq!(sizes, vec![11.0]);
    }
}
