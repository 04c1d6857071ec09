//! Pagination – splits positioned boxes into pages.
//!
//! Handles:
//! - page boundaries from the `@page` geometry
//! - page-break-before / page-break-after hints
//! - keep-with-next for boxes marked `page-break-after: avoid`
//! - splitting of containers (lists, tables, sections) between children
//! - splitting of text at line boundaries, with orphan and widow control
//! - running headers / footers from `@page` margin boxes

use crate::css::{render_content, MarginBox, MarginPosition};
use crate::fonts::{wrap_runs, FontManager, StyledLine};
use crate::layout::{BoxContent, PositionedBox};
use crate::layout_config::*;
use crate::markup::Run;
use crate::style::{apply_declarations, ComputedStyle, TextAlign, TextDecoration};
use crate::typeset::{place_lines, TextStyle};

/// Default page margins in points.
pub const PAGE_MARGIN_PT: f32 = 40.0;

/// Slack for floating-point comparisons against the page bottom.
const EPSILON: f32 = 0.01;

struct Paginator<'a> {
    geometry: &'a PageGeometry,
    fonts: &'a FontManager,
    pages: Vec<PageLayout>,
    current: Vec<LayoutBox>,
    /// Document-space y at which the current page begins. All
    /// `PositionedBox.y` values are absolute document coordinates produced by
    /// the layout extractor, so `pbox.y - page_start_doc_y` gives the
    /// y-on-page for any box.
    page_start_doc_y: f32,
}

impl<'a> Paginator<'a> {
    fn new(geometry: &'a PageGeometry, fonts: &'a FontManager) -> Self {
        Self {
            geometry,
            fonts,
            pages: Vec::new(),
            current: Vec::new(),
            page_start_doc_y: 0.0,
        }
    }

    fn content_height(&self) -> f32 {
        self.geometry.content_height()
    }

    fn y_on_page(&self, doc_y: f32) -> f32 {
        (doc_y - self.page_start_doc_y).max(0.0)
    }

    fn fits(&self, pbox: &PositionedBox) -> bool {
        self.y_on_page(pbox.y) + pbox.height <= self.content_height() + EPSILON
    }

    /// Start a new page whose top is at `doc_y`. An empty current page is
    /// reused instead of emitting a blank page.
    fn break_page(&mut self, doc_y: f32) {
        if !self.current.is_empty() {
            let boxes = std::mem::take(&mut self.current);
            self.pages.push(PageLayout {
                page_index: self.pages.len(),
                boxes,
            });
        }
        self.page_start_doc_y = doc_y;
    }

    fn place(&mut self, pbox: &PositionedBox) {
        let abs_y = self.geometry.margin[0] + self.y_on_page(pbox.y);
        let lbox = build_layout_box(pbox, pbox.x, abs_y, self.fonts);
        self.current.push(lbox);
    }

    fn layout_boxes(&mut self, boxes: &[PositionedBox]) {
        for (i, pbox) in boxes.iter().enumerate() {
            if pbox.page_break_before {
                self.break_page(pbox.y);
            }

            let container = matches!(pbox.content, BoxContent::None) && !pbox.children.is_empty();
            let forced_inside = pbox.children.iter().any(PositionedBox::has_forced_break);

            if container && (forced_inside || (!self.fits(pbox) && !pbox.page_break_inside_avoid)) {
                // Paginate the children individually.
                self.layout_boxes(&pbox.children);
            } else if !self.fits(pbox) {
                match &pbox.content {
                    BoxContent::Text { lines } if lines.len() > 1 && !pbox.page_break_inside_avoid => {
                        self.split_text(pbox, lines);
                    }
                    _ => {
                        if !self.current.is_empty() {
                            self.break_page(pbox.y);
                        }
                        self.place(pbox);
                    }
                }
            } else {
                if pbox.keep_with_next && !self.current.is_empty() {
                    if let Some(next) = boxes.get(i + 1) {
                        let next_head = next.y + head_height(next, self.fonts);
                        let together = next_head - pbox.y;
                        if self.y_on_page(next_head) > self.content_height() + EPSILON
                            && together <= self.content_height()
                        {
                            self.break_page(pbox.y);
                        }
                    }
                }
                self.place(pbox);
            }

            if pbox.page_break_after {
                self.break_page(pbox.y + pbox.height);
            }
        }
    }

    /// Place a text box across pages, splitting between lines.
    fn split_text(&mut self, pbox: &PositionedBox, lines: &[StyledLine]) {
        let line_height = pbox.line_height(self.fonts);
        let style = &pbox.style;
        let top_chrome = style.padding_top + style.border_top_width();
        let bottom_chrome = style.padding_bottom + style.border_bottom_width();

        let mut start = 0;
        let mut doc_y = pbox.y;
        while start < lines.len() {
            let head = if start == 0 { top_chrome } else { 0.0 };
            let available = self.content_height() - self.y_on_page(doc_y) - head;
            let remaining = lines.len() - start;
            let mut count = ((available + EPSILON) / line_height).floor().max(0.0) as usize;
            count = count.min(remaining);

            // Orphan: a single first line at the bottom of a page.
            let orphan = start == 0 && count == 1 && remaining > 1;
            if (count == 0 || orphan) && !self.current.is_empty() {
                self.break_page(doc_y);
                continue;
            }
            count = count.max(1);
            // Widow: leave at least two lines for the next page.
            if remaining - count == 1 && count > 2 {
                count -= 1;
            }

            let last = start + count == lines.len();
            let tail = if last { bottom_chrome } else { 0.0 };
            let mut piece = pbox.clone();
            piece.y = doc_y;
            piece.height = head + count as f32 * line_height + tail;
            piece.content = BoxContent::Text {
                lines: lines[start..start + count].to_vec(),
            };
            if start > 0 {
                piece.style.padding_top = 0.0;
                piece.style.borders[0] = None;
                piece.list_marker = None;
            }
            if !last {
                piece.style.padding_bottom = 0.0;
                piece.style.borders[2] = None;
            }
            self.place(&piece);

            start += count;
            doc_y += piece.height;
            if !last {
                self.break_page(doc_y);
            }
        }
    }

    fn finish(mut self) -> Vec<PageLayout> {
        if !self.current.is_empty() || self.pages.is_empty() {
            let boxes = std::mem::take(&mut self.current);
            self.pages.push(PageLayout {
                page_index: self.pages.len(),
                boxes,
            });
        }
        self.pages
    }
}

/// Height from the top of `pbox` to the bottom of its first line of content.
fn head_height(pbox: &PositionedBox, fonts: &FontManager) -> f32 {
    match &pbox.content {
        BoxContent::Text { .. } => {
            let head = pbox.style.padding_top + pbox.style.border_top_width() + pbox.line_height(fonts);
            head.min(pbox.height)
        }
        BoxContent::None => match pbox.children.first() {
            Some(child) => (child.y - pbox.y) + head_height(child, fonts),
            None => pbox.height,
        },
        BoxContent::Image { .. } => pbox.height,
    }
}

/// Convert positioned boxes into a paginated LayoutConfig.
pub fn paginate(
    boxes: &[PositionedBox],
    geometry: &PageGeometry,
    fonts: &FontManager,
) -> LayoutConfig {
    let mut paginator = Paginator::new(geometry, fonts);
    paginator.layout_boxes(boxes);
    let mut config = LayoutConfig::for_page(geometry);
    config.pages = paginator.finish();
    log::debug!("paginated into {} page(s)", config.pages.len());
    config
}

/// Recursively build a LayoutBox tree where every box carries *page-absolute*
/// x/y coordinates (origin = top-left of the physical page).
///
/// For each child, its absolute y is derived by:
///   `child_abs_y = parent_abs_y + (child.y − parent.y)`
/// because PositionedBox.y values are accumulated document-space absolutes,
/// so the difference gives the child's position relative to its parent.
fn build_layout_box(
    pbox: &PositionedBox,
    abs_x: f32,
    abs_y: f32,
    fonts: &FontManager,
) -> LayoutBox {
    let style = &pbox.style;
    let mut lb = LayoutBox::new(abs_x, abs_y, pbox.width, pbox.height);

    if !style.background_color.is_transparent() {
        lb.background_color = Some(style.background_color.to_array());
    }

    if let Some(side) = style.uniform_border() {
        lb.border = Some(BorderStyle {
            width: side.width,
            color: side.color.to_array(),
        });
    } else {
        let edges = [Edge::Top, Edge::Right, Edge::Bottom, Edge::Left];
        for (edge, side) in edges.into_iter().zip(style.borders) {
            if let Some(side) = side {
                lb.rules.push(EdgeRule {
                    edge,
                    width: side.width,
                    color: side.color.to_array(),
                });
            }
        }
    }

    let text_style = TextStyle::from_computed(style, fonts);
    match &pbox.content {
        BoxContent::Text { lines } => {
            let inset = (
                style.padding_left + style.border_left_width(),
                style.padding_top + style.border_top_width(),
            );
            let width = pbox.width - style.horizontal_chrome();
            place_lines(&mut lb, lines, &text_style, inset, width, fonts);
        }
        BoxContent::Image { src } => {
            lb.image = Some(ImageContent {
                src: src.clone(),
                width: pbox.width,
                height: pbox.height,
            });
        }
        BoxContent::None => {}
    }

    if let Some(marker) = &pbox.list_marker {
        lb.text
            .get_or_insert_with(|| text_style.empty_content())
            .list_marker = Some(marker.clone());
    }

    for child in &pbox.children {
        let child_abs_y = abs_y + (child.y - pbox.y);
        lb.children.push(build_layout_box(child, child.x, child_abs_y, fonts));
    }

    lb
}

/// Draw `@page` margin boxes (running headers and footers) on every page.
/// Generated content is evaluated per page, so `counter(page)` and
/// `counter(pages)` resolve to the page number and the page count.
pub fn add_margin_boxes(
    config: &mut LayoutConfig,
    margin_boxes: &[MarginBox],
    geometry: &PageGeometry,
    base: &ComputedStyle,
    fonts: &FontManager,
) {
    let total = config.pages.len();
    let width = geometry.content_width();
    for (index, page) in config.pages.iter_mut().enumerate() {
        for mbox in margin_boxes {
            let text = render_content(&mbox.content, index + 1, total);
            if text.trim().is_empty() {
                continue;
            }
            let mut style = ComputedStyle::inherit_from(base);
            apply_declarations(&mut style, &mbox.declarations, base.font_size);
            style.text_align = match mbox.position {
                MarginPosition::TopLeft | MarginPosition::BottomLeft => TextAlign::Left,
                MarginPosition::TopCenter | MarginPosition::BottomCenter => TextAlign::Center,
                MarginPosition::TopRight | MarginPosition::BottomRight => TextAlign::Right,
            };
            let text_style = TextStyle::from_computed(&style, fonts);

            let run = Run {
                text,
                bold: style.bold(),
                italic: style.italic(),
                underline: style.text_decoration == TextDecoration::Underline,
                monospace: false,
            };
            let lines = wrap_runs(&[run], style.font_size, style.font_family, width, fonts);
            let height = lines.len() as f32 * text_style.line_height;

            let (band_top, band_height) = if mbox.position.is_top() {
                (0.0, geometry.margin[0])
            } else {
                (geometry.height - geometry.margin[2], geometry.margin[2])
            };
            let y = band_top + ((band_height - height) / 2.0).max(0.0);
            let mut lb = LayoutBox::new(geometry.margin[3], y, width, height);
            place_lines(&mut lb, &lines, &text_style, (0.0, 0.0), width, fonts);
            page.boxes.push(lb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::Stylesheet;
    use crate::dom::parse_html;
    use crate::layout::compute_layout;
    use crate::style::{style_document, Cascade};

    fn paginate_html(html: &str, css: &str) -> LayoutConfig {
        let cascade = Cascade::new(vec![Stylesheet::parse(css)]);
        let styled = style_document(&parse_html(html), &cascade);
        let fonts = FontManager::default();
        let geometry = PageGeometry::a4(PAGE_MARGIN_PT);
        let boxes = compute_layout(&styled, &geometry, &fonts).unwrap();
        paginate(&boxes, &geometry, &fonts)
    }

    #[test]
    fn single_page() {
        let config = paginate_html("<p>Short text</p>", "");
        assert_eq!(config.pages.len(), 1);
    }

    #[test]
    fn multiple_pages() {
        // Generate enough content to fill multiple pages
        let mut html = String::new();
        for i in 0..80 {
            html.push_str(&format!("<p>Paragraph {} with some text</p>", i));
        }
        let config = paginate_html(&html, "");
        assert!(
            config.pages.len() > 1,
            "Expected multiple pages, got {}",
            config.pages.len()
        );
        let bottom = config.page_height_pt - PAGE_MARGIN_PT;
        for page in &config.pages {
            for b in &page.boxes {
                assert!(b.y >= PAGE_MARGIN_PT - EPSILON);
                assert!(b.y + b.height <= bottom + 1.0, "box overflows page: {}", b.y + b.height);
            }
        }
    }

    #[test]
    fn forced_break_before() {
        let config = paginate_html(
            r#"<p>One</p><div class="page-break"></div><p>Two</p>"#,
            ".page-break { page-break-before: always }",
        );
        assert_eq!(config.pages.len(), 2);
    }

    #[test]
    fn long_text_is_split_between_lines() {
        let words = "word ".repeat(3000);
        let config = paginate_html(&format!("<p>{words}</p>"), "");
        assert!(config.pages.len() > 1);
        let first_lines = config.pages[0].boxes[0].text.as_ref().map_or(0, |t| t.lines.len());
        assert!(first_lines > 10);
    }

    #[test]
    fn heading_moves_with_following_paragraph() {
        let mut html = String::new();
        // 44 lines of filler leave room for the heading but not the body.
        for _ in 0..44 {
            html.push_str("<p>filler</p>");
        }
        html.push_str("<h2>Heading</h2><p>Body</p>");
        let config = paginate_html(&html, "p { margin: 0 0 2pt 0 } h2 { page-break-after: avoid }");
        assert_eq!(config.pages.len(), 2);
        let texts: Vec<String> = config.pages[1]
            .boxes
            .iter()
            .filter_map(|b| b.text.as_ref())
            .flat_map(|t| t.lines.iter().map(|l| l.text.clone()))
            .collect();
        assert_eq!(texts, vec!["Heading", "Body"]);
    }

    #[test]
    fn running_footer_counts_pages() {
        let config = {
            let mut html = String::new();
            for i in 0..80 {
                html.push_str(&format!("<p>Paragraph {i}</p>"));
            }
            let mut config = paginate_html(&html, "");
            let sheet = Stylesheet::parse(
                r#"@page { @bottom-center { content: "Page " counter(page) " of " counter(pages); font-size: 9pt } }"#,
            );
            add_margin_boxes(
                &mut config,
                &sheet.page.margin_boxes,
                &PageGeometry::a4(PAGE_MARGIN_PT),
                &ComputedStyle::default(),
                &FontManager::default(),
            );
            config
        };
        let total = config.pages.len();
        assert!(total > 1);
        let footer = config.pages[1].boxes.last().unwrap();
        let text = footer.text.as_ref().unwrap();
        assert_eq!(text.lines[0].text, format!("Page 2 of {total}"));
        assert_eq!(text.font_size, 9.0);
        assert!(footer.y > config.page_height_pt - PAGE_MARGIN_PT);
    }
}
