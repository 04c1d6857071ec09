//! Layout engine – uses Taffy to compute block / table layout from a styled
//! DOM tree, then converts the result into positioned boxes in document
//! coordinates.

use std::collections::HashMap;
use taffy::prelude::*;

use crate::dom::Tag;
use crate::fonts::{wrap_preformatted, wrap_runs, BuiltinFamily, FontManager, StyledLine};
use crate::layout_config::PageGeometry;
use crate::markup::{push_run, Run};
use crate::render::parse_data_uri;
use crate::style::{self, ComputedStyle, StyledNode, TextDecoration};

// ---------------------------------------------------------------------------
// Intermediate layout tree (pre-pagination)
// ---------------------------------------------------------------------------

/// A positioned box in document coordinates (before page splitting).
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub style: ComputedStyle,
    pub content: BoxContent,
    /// Bullet or number drawn in the gutter of a list item.
    pub list_marker: Option<String>,
    pub children: Vec<PositionedBox>,
    pub page_break_before: bool,
    pub page_break_after: bool,
    pub page_break_inside_avoid: bool,
    pub keep_with_next: bool,
}

#[derive(Debug, Clone)]
pub enum BoxContent {
    None,
    /// Wrapped text, inset by the box's padding and borders.
    Text { lines: Vec<StyledLine> },
    Image { src: String },
}

impl PositionedBox {
    /// Line advance of a text box in points.
    pub fn line_height(&self, fonts: &FontManager) -> f32 {
        fonts.line_height_px(self.style.font_size, self.style.line_height)
    }

    /// True if this box or any descendant forces a page break.
    pub fn has_forced_break(&self) -> bool {
        self.page_break_before
            || self.page_break_after
            || self.children.iter().any(PositionedBox::has_forced_break)
    }
}

fn taffy_err(e: taffy::TaffyError) -> String {
    format!("layout failed: {e}")
}

// ---------------------------------------------------------------------------
// Build Taffy tree from styled nodes
// ---------------------------------------------------------------------------

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontManager,
    node_styles: HashMap<NodeId, ComputedStyle>,
    node_content: HashMap<NodeId, BoxContent>,
    node_markers: HashMap<NodeId, String>,
}

/// Text and `display: inline` elements flow together into one text box.
/// Images are laid out as blocks.
fn is_inline(node: &StyledNode) -> bool {
    match node {
        StyledNode::Text { .. } => true,
        StyledNode::Element { tag, style, .. } => {
            *tag != Tag::Img && style.display == style::Display::Inline
        }
    }
}

fn has_visible_text(runs: &[Run]) -> bool {
    runs.iter()
        .any(|r| r.is_line_break() || !r.text.trim().is_empty())
}

/// Collect emphasis runs from an inline subtree, collapsing whitespace.
/// `block_family` is the family of the enclosing block; inline elements set
/// in Courier inside a proportional block become monospace runs.
fn collect_runs(node: &StyledNode, block_family: BuiltinFamily, runs: &mut Vec<Run>) {
    match node {
        StyledNode::Text { text, style } => {
            let mut collapsed = String::with_capacity(text.len());
            let mut last_space = false;
            for c in text.chars() {
                if c.is_whitespace() && c != '\u{00A0}' {
                    if !last_space {
                        collapsed.push(' ');
                    }
                    last_space = true;
                } else {
                    collapsed.push(c);
                    last_space = false;
                }
            }
            push_run(
                runs,
                Run {
                    text: collapsed,
                    bold: style.bold(),
                    italic: style.italic(),
                    underline: style.text_decoration == TextDecoration::Underline,
                    monospace: style.font_family == BuiltinFamily::Courier
                        && block_family != BuiltinFamily::Courier,
                },
            );
        }
        StyledNode::Element { tag: Tag::Br, .. } => runs.push(Run::line_break()),
        StyledNode::Element { style, .. } if style.display == style::Display::None => {}
        StyledNode::Element { children, .. } => {
            for child in children {
                collect_runs(child, block_family, runs);
            }
        }
    }
}

/// Raw text of a subtree, whitespace preserved.
fn collect_text(node: &StyledNode) -> String {
    match node {
        StyledNode::Text { text, .. } => text.clone(),
        StyledNode::Element { tag: Tag::Br, .. } => "\n".to_string(),
        StyledNode::Element { children, .. } => children.iter().map(collect_text).collect(),
    }
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontManager) -> Self {
        Self {
            taffy: TaffyTree::new(),
            fonts,
            node_styles: HashMap::new(),
            node_content: HashMap::new(),
            node_markers: HashMap::new(),
        }
    }

    /// Build an element; `None` for `display: none`.
    fn build_element(
        &mut self,
        tag: &Tag,
        style: &ComputedStyle,
        children: &[StyledNode],
        attrs: &HashMap<String, String>,
        avail_width: f32,
    ) -> Result<Option<NodeId>, String> {
        if style.display == style::Display::None {
            return Ok(None);
        }
        if *tag == Tag::Img {
            let src = attrs.get("src").map(String::as_str).unwrap_or("");
            return self.build_image(style, src, avail_width).map(Some);
        }

        // Width of the content box, for wrapping.
        let outer = style
            .width
            .resolve(avail_width)
            .unwrap_or(avail_width - style.margin_left - style.margin_right);
        let outer = style
            .max_width
            .resolve(avail_width)
            .map_or(outer, |max| outer.min(max));
        let inner_width = (outer - style.horizontal_chrome()).max(1.0);

        if style.preformatted && !children.is_empty() && children.iter().all(is_inline) {
            let text: String = children.iter().map(collect_text).collect();
            let lines = self.preformatted_lines(&text, style, inner_width);
            return self.text_leaf(tag, style, lines).map(Some);
        }

        // Paragraph-like blocks whose children are all inline become a single
        // wrapped text box carrying the block's own margins and borders.
        if !children.is_empty() && children.iter().all(is_inline) {
            let mut runs = Vec::new();
            for child in children {
                collect_runs(child, style.font_family, &mut runs);
            }
            if has_visible_text(&runs) {
                let lines = wrap_runs(&runs, style.font_size, style.font_family, inner_width, self.fonts);
                return self.text_leaf(tag, style, lines).map(Some);
            }
        }

        // Estimate per-cell width for table rows so that text is wrapped to
        // the right column width at build time.
        let cells = children
            .iter()
            .filter(|c| matches!(c, StyledNode::Element { tag: Tag::Td | Tag::Th, .. }))
            .count();
        let child_width = if *tag == Tag::Tr && cells > 0 {
            (inner_width / cells as f32).max(1.0)
        } else {
            inner_width
        };

        let mut list_counter = attrs
            .get("start")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(1);
        let mut child_nodes = Vec::new();
        let mut inline_group: Vec<&StyledNode> = Vec::new();

        for child in children {
            if is_inline(child) {
                inline_group.push(child);
                continue;
            }
            if let Some(id) = self.build_inline_group(&inline_group, style, inner_width)? {
                child_nodes.push(id);
            }
            inline_group.clear();

            let StyledNode::Element {
                tag: child_tag,
                style: child_style,
                children: grandchildren,
                attrs: child_attrs,
            } = child
            else {
                continue;
            };
            let Some(id) = self.build_element(
                child_tag,
                child_style,
                grandchildren,
                child_attrs,
                child_width,
            )?
            else {
                continue;
            };

            // Record the marker so pagination can draw it in the left gutter.
            if child_style.display == style::Display::ListItem {
                let marker = if *tag == Tag::Ol {
                    let m = format!("{list_counter}. ");
                    list_counter += 1;
                    m
                } else {
                    "\u{2022} ".to_string()
                };
                self.node_markers.insert(id, marker);
            }
            child_nodes.push(id);
        }
        if let Some(id) = self.build_inline_group(&inline_group, style, inner_width)? {
            child_nodes.push(id);
        }

        self.collapse_margins(&child_nodes)?;

        let taffy_style = self.computed_to_taffy(style, tag);
        let node = self
            .taffy
            .new_with_children(taffy_style, &child_nodes)
            .map_err(taffy_err)?;
        self.node_styles.insert(node, style.clone());
        Ok(Some(node))
    }

    /// Anonymous text box for inline content mixed with blocks.
    fn build_inline_group(
        &mut self,
        group: &[&StyledNode],
        parent: &ComputedStyle,
        width: f32,
    ) -> Result<Option<NodeId>, String> {
        if group.is_empty() {
            return Ok(None);
        }
        let style = ComputedStyle::inherit_from(parent);
        let lines = if style.preformatted {
            let text: String = group.iter().map(|n| collect_text(n)).collect();
            if text.trim().is_empty() {
                return Ok(None);
            }
            self.preformatted_lines(&text, &style, width)
        } else {
            let mut runs = Vec::new();
            for node in group {
                collect_runs(node, style.font_family, &mut runs);
            }
            if !has_visible_text(&runs) {
                return Ok(None);
            }
            wrap_runs(&runs, style.font_size, style.font_family, width, self.fonts)
        };
        self.text_leaf(&Tag::Span, &style, lines).map(Some)
    }

    fn preformatted_lines(&self, text: &str, style: &ComputedStyle, width: f32) -> Vec<StyledLine> {
        wrap_preformatted(text, style.font_size, style.font_family, width, self.fonts)
            .into_iter()
            .map(|line| {
                let w = self.fonts.measure_text_width(
                    &line,
                    style.font_size,
                    style.bold(),
                    style.italic(),
                    style.font_family,
                );
                StyledLine::plain(line, w)
            })
            .collect()
    }

    fn text_leaf(
        &mut self,
        tag: &Tag,
        style: &ComputedStyle,
        lines: Vec<StyledLine>,
    ) -> Result<NodeId, String> {
        let line_height = self.fonts.line_height_px(style.font_size, style.line_height);
        let height = lines.len() as f32 * line_height + style.vertical_chrome();

        let mut taffy_style = self.computed_to_taffy(style, tag);
        taffy_style.min_size.height = Dimension::Length(height);

        let node = self.taffy.new_leaf(taffy_style).map_err(taffy_err)?;
        self.node_styles.insert(node, style.clone());
        self.node_content.insert(node, BoxContent::Text { lines });
        Ok(node)
    }

    fn build_image(
        &mut self,
        style: &ComputedStyle,
        src: &str,
        avail_width: f32,
    ) -> Result<NodeId, String> {
        let (width, height) = resolve_image_size(src, style, avail_width);
        let mut taffy_style = self.computed_to_taffy(style, &Tag::Img);
        taffy_style.size = Size {
            width: Dimension::Length(width),
            height: Dimension::Length(height),
        };
        taffy_style.align_self = Some(taffy::AlignItems::Start);

        let node = self.taffy.new_leaf(taffy_style).map_err(taffy_err)?;
        self.node_styles.insert(node, style.clone());
        self.node_content.insert(
            node,
            BoxContent::Image {
                src: src.to_string(),
            },
        );
        Ok(node)
    }

    /// Adjacent vertical margins between siblings collapse to the larger one.
    fn collapse_margins(&mut self, nodes: &[NodeId]) -> Result<(), String> {
        let mut previous_bottom = 0.0f32;
        for &node in nodes {
            let Some(style) = self.node_styles.get(&node) else {
                continue;
            };
            let (top, bottom) = (style.margin_top, style.margin_bottom);
            if previous_bottom > 0.0 && top > 0.0 {
                let mut taffy_style = self.taffy.style(node).map_err(taffy_err)?.clone();
                taffy_style.margin.top =
                    LengthPercentageAuto::Length((top - previous_bottom).max(0.0));
                self.taffy.set_style(node, taffy_style).map_err(taffy_err)?;
            }
            previous_bottom = bottom;
        }
        Ok(())
    }

    fn computed_to_taffy(&self, s: &ComputedStyle, tag: &Tag) -> Style {
        let mut ts = Style {
            margin: Rect {
                top: LengthPercentageAuto::Length(s.margin_top),
                right: LengthPercentageAuto::Length(s.margin_right),
                bottom: LengthPercentageAuto::Length(s.margin_bottom),
                left: LengthPercentageAuto::Length(s.margin_left),
            },
            padding: Rect {
                top: LengthPercentage::Length(s.padding_top),
                right: LengthPercentage::Length(s.padding_right),
                bottom: LengthPercentage::Length(s.padding_bottom),
                left: LengthPercentage::Length(s.padding_left),
            },
            border: Rect {
                top: LengthPercentage::Length(s.border_top_width()),
                right: LengthPercentage::Length(s.border_right_width()),
                bottom: LengthPercentage::Length(s.border_bottom_width()),
                left: LengthPercentage::Length(s.border_left_width()),
            },
            ..Default::default()
        };

        // -----------------------------------------------------------------
        // HTML table model: rows are flex rows of equal-width cells.
        // -----------------------------------------------------------------
        match tag {
            Tag::Tr => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = taffy::FlexDirection::Row;
                ts.align_items = Some(taffy::AlignItems::Stretch);
                ts.size.width = Dimension::Percent(1.0);
                ts.min_size.width = Dimension::Length(0.0);
                return ts;
            }
            Tag::Td | Tag::Th => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = taffy::FlexDirection::Column;
                ts.flex_grow = 1.0;
                ts.flex_shrink = 1.0;
                ts.flex_basis = Dimension::Length(0.0); // equal columns
                ts.min_size.width = Dimension::Length(0.0);
                return ts;
            }
            _ => {}
        }

        match s.display {
            style::Display::Flex => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = taffy::FlexDirection::Row;
            }
            style::Display::None => ts.display = taffy::Display::None,
            // Block-level boxes stack vertically.
            _ => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = taffy::FlexDirection::Column;
            }
        }

        ts.size = Size {
            width: dim_to_taffy(s.width),
            height: dim_to_taffy(s.height),
        };
        ts.min_size.width = Dimension::Length(0.0);
        ts.max_size.width = dim_to_taffy(s.max_width);
        ts.flex_shrink = 0.0;
        ts
    }

    /// Extract positioned boxes after layout computation.
    fn extract(&self, node: NodeId, offset_x: f32, offset_y: f32) -> Result<PositionedBox, String> {
        let layout = self.taffy.layout(node).map_err(taffy_err)?;
        let style = self.node_styles.get(&node).cloned().unwrap_or_default();
        let content = self
            .node_content
            .get(&node)
            .cloned()
            .unwrap_or(BoxContent::None);

        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;

        let children = self
            .taffy
            .children(node)
            .map_err(taffy_err)?
            .iter()
            .map(|&child| self.extract(child, x, y))
            .collect::<Result<Vec<_>, String>>()?;

        Ok(PositionedBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            page_break_before: style.page_break_before,
            page_break_after: style.page_break_after,
            page_break_inside_avoid: style.page_break_inside_avoid,
            keep_with_next: style.keep_with_next,
            style,
            content,
            list_marker: self.node_markers.get(&node).cloned(),
            children,
        })
    }
}

fn dim_to_taffy(d: style::Dimension) -> Dimension {
    match d {
        style::Dimension::Auto => Dimension::Auto,
        style::Dimension::Pt(v) => Dimension::Length(v),
        style::Dimension::Percent(v) => Dimension::Percent(v / 100.0),
    }
}

// ---------------------------------------------------------------------------
// Image intrinsic-size helper
// ---------------------------------------------------------------------------

/// Resolve the drawn size of an image. Auto dimensions come from the decoded
/// data URI (1 px = 1 pt) keeping the aspect ratio; the result never exceeds
/// `avail_width`. Undecodable sources get a zero size.
fn resolve_image_size(src: &str, style: &ComputedStyle, avail_width: f32) -> (f32, f32) {
    let intrinsic = parse_data_uri(src)
        .ok()
        .and_then(|bytes| ::image::load_from_memory(&bytes).ok())
        .map(|img| (img.width() as f32, img.height() as f32))
        .filter(|(w, h)| *w > 0.0 && *h > 0.0);

    let known_w = style.width.resolve(avail_width);
    let known_h = match style.height {
        style::Dimension::Pt(h) => Some(h),
        _ => None,
    };

    let (w, h) = match (known_w, known_h, intrinsic) {
        (Some(w), Some(h), _) => (w, h),
        // Width known → derive height from aspect ratio.
        (Some(w), None, Some((iw, ih))) => (w, (w * ih / iw).max(1.0)),
        // Height known → derive width from aspect ratio.
        (None, Some(h), Some((iw, ih))) => ((h * iw / ih).max(1.0), h),
        (None, None, Some(size)) => size,
        _ => {
            log::warn!("image has no usable size, skipping layout space for it");
            (0.0, 0.0)
        }
    };

    if w > avail_width && w > 0.0 {
        (avail_width, h * avail_width / w)
    } else {
        (w, h)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute layout for a styled `<body>`, returning the top-level positioned
/// boxes in document coordinates (x includes the left page margin, y starts
/// at 0 at the top of the content area).
pub fn compute_layout(
    root: &StyledNode,
    geometry: &PageGeometry,
    fonts: &FontManager,
) -> Result<Vec<PositionedBox>, String> {
    let content_width = geometry.content_width();
    if content_width <= 0.0 {
        return Err(format!("page margins leave no room for content ({content_width} pt)"));
    }
    let mut builder = LayoutBuilder::new(fonts);

    let child_ids: Vec<NodeId> = match root {
        StyledNode::Element {
            tag,
            style,
            children,
            attrs,
        } => builder
            .build_element(tag, style, children, attrs, content_width)?
            .into_iter()
            .collect(),
        StyledNode::Text { style, .. } => builder
            .build_inline_group(&[root], style, content_width)?
            .into_iter()
            .collect(),
    };

    // Wrap everything in a root flex-column container.
    let root_style = Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        size: Size {
            width: Dimension::Length(content_width),
            height: Dimension::Auto,
        },
        ..Default::default()
    };
    let root_id = builder
        .taffy
        .new_with_children(root_style, &child_ids)
        .map_err(taffy_err)?;

    builder
        .taffy
        .compute_layout(
            root_id,
            Size {
                width: AvailableSpace::Definite(content_width),
                height: AvailableSpace::MaxContent,
            },
        )
        .map_err(taffy_err)?;

    let root_box = builder.extract(root_id, geometry.margin[3], 0.0)?;
    log::debug!("layout produced {} top-level box(es)", root_box.children.len());
    Ok(root_box.children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::Stylesheet;
    use crate::dom::parse_html;
    use crate::style::{style_document, Cascade};

    fn layout(html: &str, css: &str) -> Vec<PositionedBox> {
        let cascade = Cascade::new(vec![Stylesheet::parse(css)]);
        let styled = style_document(&parse_html(html), &cascade);
        compute_layout(&styled, &PageGeometry::a4(40.0), &FontManager::default()).unwrap()
    }

    fn texts(pbox: &PositionedBox, out: &mut Vec<String>) {
        if let BoxContent::Text { lines } = &pbox.content {
            out.extend(lines.iter().map(StyledLine::text));
        }
        for child in &pbox.children {
            texts(child, out);
        }
    }

    #[test]
    fn layout_simple_paragraph() {
        let boxes = layout("<p>Hello world</p>", "");
        assert_eq!(boxes.len(), 1, "body is the single top-level box");
        let body = &boxes[0];
        assert!(body.width > 0.0, "Box should have width");
        let p = &body.children[0];
        assert!(p.height > 0.0, "Box should have height");
        assert!(matches!(p.content, BoxContent::Text { .. }));
        assert_eq!(p.x, 40.0);
    }

    #[test]
    fn inline_emphasis_flows_into_one_box() {
        let boxes = layout("<p>Some <strong>bold</strong> and <code>code</code>.</p>", "");
        let p = &boxes[0].children[0];
        let BoxContent::Text { lines } = &p.content else {
            panic!("expected text");
        };
        assert_eq!(lines[0].text(), "Some bold and code.");
        let frags = &lines[0].fragments;
        assert!(frags.iter().any(|f| f.bold));
        assert!(frags.iter().any(|f| f.monospace));
    }

    #[test]
    fn siblings_stack_with_collapsed_margins() {
        let boxes = layout("<p>One</p><p>Two</p>", "p { margin: 10pt 0 }");
        let body = &boxes[0];
        let (a, b) = (&body.children[0], &body.children[1]);
        assert!((b.y - (a.y + a.height) - 10.0).abs() < 0.01);
    }

    #[test]
    fn list_items_get_markers() {
        let boxes = layout("<ol start=\"3\"><li>a</li><li>b</li></ol><ul><li>c</li></ul>", "");
        let body = &boxes[0];
        let markers: Vec<_> = body
            .children
            .iter()
            .flat_map(|list| &list.children)
            .filter_map(|li| li.list_marker.clone())
            .collect();
        assert_eq!(markers, vec!["3. ", "4. ", "\u{2022} "]);
    }

    #[test]
    fn preformatted_keeps_lines() {
        let boxes = layout("<pre><code>fn main() {\n    run();\n}\n</code></pre>", "");
        let mut out = Vec::new();
        texts(&boxes[0], &mut out);
        assert_eq!(out, vec!["fn main() {", "    run();", "}"]);
    }

    #[test]
    fn table_cells_share_the_row() {
        let boxes = layout(
            "<table><thead><tr><th>A</th><th>B</th></tr></thead><tbody><tr><td>1</td><td>2</td></tr></tbody></table>",
            "",
        );
        let mut out = Vec::new();
        texts(&boxes[0], &mut out);
        assert_eq!(out, vec!["A", "B", "1", "2"]);
        let table = &boxes[0].children[0];
        let row = &table.children[0].children[0];
        assert_eq!(row.children.len(), 2);
        assert!(row.children[1].x > row.children[0].x);
    }
}
