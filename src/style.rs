//! Style resolver – cascades user-agent defaults, stylesheet rules and inline
//! `style` attributes into a flat [`ComputedStyle`] consumed by the layout
//! engine.
//!
//! All lengths in a computed style are in points.

use std::collections::HashMap;

use crate::css::{
    parse_box_shorthand, parse_declarations, Color, Declaration, ElementKey, Length, PageRule,
    Stylesheet,
};
use crate::dom::{body_children, DomNode, ElementNode, Tag};
use crate::fonts::BuiltinFamily;

/// Browser-like defaults for the elements a markdown converter emits.
pub const USER_AGENT_CSS: &str = r#"
head, style, title, meta { display: none }
span, a, strong, em, code, br, img { display: inline }
li { display: list-item }
table { display: table; margin: 1em 0 }
tr { display: table-row }
td, th { display: table-cell; padding: 3px 6px }
th { font-weight: bold }
h1 { font-size: 2em; font-weight: bold; margin: 0.67em 0 }
h2 { font-size: 1.5em; font-weight: bold; margin: 0.83em 0 }
h3 { font-size: 1.17em; font-weight: bold; margin: 1em 0 }
h4 { font-weight: bold; margin: 1.33em 0 }
h5 { font-size: 0.83em; font-weight: bold; margin: 1.67em 0 }
h6 { font-size: 0.67em; font-weight: bold; margin: 2.33em 0 }
p { margin: 1em 0 }
ul, ol { margin: 1em 0; padding-left: 40px }
li ul, li ol { margin: 0 }
blockquote { margin: 1em 40px }
pre { white-space: pre; font-family: monospace; margin: 1em 0 }
code { font-family: monospace }
hr { height: 1px; background-color: gray; margin: 0.5em 0 }
strong { font-weight: bold }
em { font-style: italic }
a { color: blue; text-decoration: underline }
"#;

/// Line height used for `line-height: normal`.
pub const NORMAL_LINE_HEIGHT: f32 = 1.2;

/// Fully resolved style for a single element.
#[derive(Debug, Clone)]
pub struct ComputedStyle {
    // Display / sizing
    pub display: Display,
    pub width: Dimension,
    pub height: Dimension,
    pub max_width: Dimension,

    // Spacing (pt)
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub padding_top: f32,
    pub padding_right: f32,
    pub padding_bottom: f32,
    pub padding_left: f32,

    /// Top, right, bottom, left.
    pub borders: [Option<BorderSide>; 4],

    // Typography (inherited)
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub font_family: BuiltinFamily,
    pub color: Color,
    pub text_align: TextAlign,
    /// Multiple of the font size.
    pub line_height: f32,
    pub text_decoration: TextDecoration,
    pub preformatted: bool,

    pub background_color: Color,

    // Page break
    pub page_break_before: bool,
    pub page_break_after: bool,
    pub page_break_inside_avoid: bool,
    /// `page-break-after: avoid` – keep on the same page as the next box.
    pub keep_with_next: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            width: Dimension::Auto,
            height: Dimension::Auto,
            max_width: Dimension::Auto,
            margin_top: 0.0,
            margin_right: 0.0,
            margin_bottom: 0.0,
            margin_left: 0.0,
            padding_top: 0.0,
            padding_right: 0.0,
            padding_bottom: 0.0,
            padding_left: 0.0,
            borders: [None; 4],
            font_size: 12.0,
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            font_family: BuiltinFamily::Helvetica,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: NORMAL_LINE_HEIGHT,
            text_decoration: TextDecoration::None,
            preformatted: false,
            background_color: Color::TRANSPARENT,
            page_break_before: false,
            page_break_after: false,
            page_break_inside_avoid: false,
            keep_with_next: false,
        }
    }
}

impl ComputedStyle {
    /// Start a child's style: inherited properties come from `parent`, box
    /// properties are reset.
    pub fn inherit_from(parent: &ComputedStyle) -> Self {
        Self {
            font_size: parent.font_size,
            font_weight: parent.font_weight,
            font_style: parent.font_style,
            font_family: parent.font_family,
            color: parent.color,
            text_align: parent.text_align,
            line_height: parent.line_height,
            text_decoration: parent.text_decoration,
            preformatted: parent.preformatted,
            ..Self::default()
        }
    }

    pub fn bold(&self) -> bool {
        self.font_weight == FontWeight::Bold
    }

    pub fn italic(&self) -> bool {
        self.font_style == FontStyle::Italic
    }

    pub fn border_top_width(&self) -> f32 {
        self.borders[0].map_or(0.0, |b| b.width)
    }

    pub fn border_right_width(&self) -> f32 {
        self.borders[1].map_or(0.0, |b| b.width)
    }

    pub fn border_bottom_width(&self) -> f32 {
        self.borders[2].map_or(0.0, |b| b.width)
    }

    pub fn border_left_width(&self) -> f32 {
        self.borders[3].map_or(0.0, |b| b.width)
    }

    /// The common border when all four sides are equal.
    pub fn uniform_border(&self) -> Option<BorderSide> {
        let first = self.borders[0]?;
        self.borders.iter().all(|b| *b == Some(first)).then_some(first)
    }

    /// Horizontal space taken by padding and borders.
    pub fn horizontal_chrome(&self) -> f32 {
        self.padding_left + self.padding_right + self.border_left_width() + self.border_right_width()
    }

    /// Vertical space taken by padding and borders.
    pub fn vertical_chrome(&self) -> f32 {
        self.padding_top + self.padding_bottom + self.border_top_width() + self.border_bottom_width()
    }

    fn set_margins(&mut self, [t, r, b, l]: [f32; 4]) {
        self.margin_top = t;
        self.margin_right = r;
        self.margin_bottom = b;
        self.margin_left = l;
    }

    fn set_paddings(&mut self, [t, r, b, l]: [f32; 4]) {
        self.padding_top = t;
        self.padding_right = r;
        self.padding_bottom = b;
        self.padding_left = l;
    }
}

// ---------------------------------------------------------------------------
// Supporting enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Flex,
    Inline,
    ListItem,
    Table,
    TableRow,
    TableCell,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
    Justify,
}

impl TextAlign {
    pub fn as_str(self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
            TextAlign::Justify => "justify",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDecoration {
    None,
    Underline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Pt(f32),
    Percent(f32),
}

impl Dimension {
    /// Resolve against the containing block width.
    pub fn resolve(self, base: f32) -> Option<f32> {
        match self {
            Dimension::Auto => None,
            Dimension::Pt(v) => Some(v),
            Dimension::Percent(p) => Some(base * p / 100.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderSide {
    pub width: f32,
    pub color: Color,
}

// ---------------------------------------------------------------------------
// Cascade
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Origin {
    UserAgent,
    Author,
    Inline,
}

/// Sort key of a matched declaration; the greatest key wins.
type CascadeKey = (bool, Origin, (usize, usize), usize, usize, usize);

/// The ordered set of stylesheets applied to a document.
#[derive(Debug, Clone)]
pub struct Cascade {
    sheets: Vec<(Origin, Stylesheet)>,
}

impl Cascade {
    /// User-agent defaults followed by `author` sheets in order; later sheets
    /// win ties.
    pub fn new(author: Vec<Stylesheet>) -> Self {
        let mut sheets = vec![(Origin::UserAgent, Stylesheet::parse(USER_AGENT_CSS))];
        sheets.extend(author.into_iter().map(|s| (Origin::Author, s)));
        Self { sheets }
    }

    /// `@page` geometry merged across all author sheets.
    pub fn page_rule(&self) -> PageRule {
        let mut page = PageRule::default();
        for (_, sheet) in &self.sheets {
            page.merge(&sheet.page);
        }
        page
    }

    fn matching<'a>(
        &'a self,
        path: &[ElementKey<'_>],
        inline: &'a [Declaration],
    ) -> Vec<&'a Declaration> {
        let mut matched: Vec<(CascadeKey, &Declaration)> = Vec::new();
        for (sheet_idx, (origin, sheet)) in self.sheets.iter().enumerate() {
            for (rule_idx, rule) in sheet.rules.iter().enumerate() {
                let Some(specificity) = rule
                    .selectors
                    .iter()
                    .filter(|s| s.matches(path))
                    .map(|s| s.specificity())
                    .max()
                else {
                    continue;
                };
                for (decl_idx, decl) in rule.declarations.iter().enumerate() {
                    let key = (decl.important, *origin, specificity, sheet_idx, rule_idx, decl_idx);
                    matched.push((key, decl));
                }
            }
        }
        for (decl_idx, decl) in inline.iter().enumerate() {
            let key = (decl.important, Origin::Inline, (0, 0), 0, 0, decl_idx);
            matched.push((key, decl));
        }
        matched.sort_by(|a, b| a.0.cmp(&b.0));
        matched.into_iter().map(|(_, d)| d).collect()
    }

    /// Compute the style of the element at the end of `path`.
    pub fn compute(
        &self,
        element: &ElementNode,
        path: &[ElementKey<'_>],
        parent: &ComputedStyle,
    ) -> ComputedStyle {
        let inline = element.inline_style().map(parse_declarations).unwrap_or_default();
        let declarations = self.matching(path, &inline);
        let mut style = ComputedStyle::inherit_from(parent);
        apply_declarations(&mut style, declarations, parent.font_size);
        style
    }
}

/// Apply declarations in cascade order. `font-size` is resolved first so that
/// `em` lengths in the other declarations use the element's own size.
pub fn apply_declarations<'a>(
    style: &mut ComputedStyle,
    declarations: impl IntoIterator<Item = &'a Declaration>,
    parent_font_size: f32,
) {
    let declarations: Vec<&Declaration> = declarations.into_iter().collect();
    for decl in declarations.iter().filter(|d| d.property == "font-size") {
        if let Some(size) = parse_font_size(&decl.value, parent_font_size) {
            style.font_size = size;
        }
    }
    for decl in declarations {
        apply_property(style, &decl.property, &decl.value);
    }
}

fn parse_font_size(value: &str, parent: f32) -> Option<f32> {
    let v = value.trim().to_ascii_lowercase();
    let keyword = match v.as_str() {
        "xx-small" => Some(7.0),
        "x-small" => Some(7.5),
        "small" => Some(10.0),
        "medium" => Some(12.0),
        "large" => Some(13.5),
        "x-large" => Some(18.0),
        "xx-large" => Some(24.0),
        "smaller" => Some(parent / 1.2),
        "larger" => Some(parent * 1.2),
        _ => None,
    };
    if keyword.is_some() {
        return keyword;
    }
    Length::parse(&v)?.to_pt(parent, parent)
}

fn apply_property(s: &mut ComputedStyle, prop: &str, val: &str) {
    let lower = val.trim().to_ascii_lowercase();
    let val = lower.as_str();
    let fs = s.font_size;
    let length = |v: &str| Length::parse(v).and_then(|l| l.to_pt(fs, 0.0));

    match prop {
        "font-size" => {}
        "display" => {
            s.display = match val {
                "inline" | "inline-block" => Display::Inline,
                "flex" | "inline-flex" => Display::Flex,
                "list-item" => Display::ListItem,
                "table" => Display::Table,
                "table-row" => Display::TableRow,
                "table-cell" => Display::TableCell,
                "none" => Display::None,
                _ => Display::Block,
            }
        }
        "color" => {
            if let Some(c) = Color::parse(val) {
                s.color = c;
            }
        }
        "background-color" | "background" => {
            let color = Color::parse(val).or_else(|| val.split_whitespace().find_map(Color::parse));
            if let Some(c) = color {
                s.background_color = c;
            }
        }
        "font-family" => s.font_family = BuiltinFamily::from_css(val),
        "font-weight" => {
            s.font_weight = match val {
                "bold" | "bolder" | "600" | "700" | "800" | "900" => FontWeight::Bold,
                _ => FontWeight::Normal,
            }
        }
        "font-style" => {
            s.font_style = match val {
                "italic" | "oblique" => FontStyle::Italic,
                _ => FontStyle::Normal,
            }
        }
        "line-height" => {
            if val == "normal" {
                s.line_height = NORMAL_LINE_HEIGHT;
            } else if let Ok(factor) = val.parse::<f32>() {
                s.line_height = factor;
            } else if let Some(l) = Length::parse(val) {
                if let Some(pt) = l.to_pt(fs, fs) {
                    if fs > 0.0 {
                        s.line_height = pt / fs;
                    }
                }
            }
        }
        "text-align" => {
            s.text_align = match val {
                "center" => TextAlign::Center,
                "right" | "end" => TextAlign::Right,
                "justify" => TextAlign::Justify,
                _ => TextAlign::Left,
            }
        }
        "text-decoration" | "text-decoration-line" => {
            s.text_decoration = if val.contains("underline") {
                TextDecoration::Underline
            } else {
                TextDecoration::None
            }
        }
        "white-space" => s.preformatted = matches!(val, "pre" | "pre-wrap" | "pre-line"),
        "margin" => {
            if let Some(m) = parse_box_shorthand(&auto_as_zero(val), fs) {
                s.set_margins(m);
            }
        }
        "margin-top" => s.margin_top = length(val).unwrap_or(0.0),
        "margin-right" => s.margin_right = length(val).unwrap_or(0.0),
        "margin-bottom" => s.margin_bottom = length(val).unwrap_or(0.0),
        "margin-left" => s.margin_left = length(val).unwrap_or(0.0),
        "padding" => {
            if let Some(p) = parse_box_shorthand(val, fs) {
                s.set_paddings(p);
            }
        }
        "padding-top" => s.padding_top = length(val).unwrap_or(0.0),
        "padding-right" => s.padding_right = length(val).unwrap_or(0.0),
        "padding-bottom" => s.padding_bottom = length(val).unwrap_or(0.0),
        "padding-left" => s.padding_left = length(val).unwrap_or(0.0),
        "border" => {
            let side = parse_border(val, s.color, fs);
            s.borders = [side; 4];
        }
        "border-top" => s.borders[0] = parse_border(val, s.color, fs),
        "border-right" => s.borders[1] = parse_border(val, s.color, fs),
        "border-bottom" => s.borders[2] = parse_border(val, s.color, fs),
        "border-left" => s.borders[3] = parse_border(val, s.color, fs),
        "border-width" => {
            if let Some(w) = length(val) {
                for side in s.borders.iter_mut().flatten() {
                    side.width = w;
                }
            }
        }
        "border-color" => {
            if let Some(c) = Color::parse(val) {
                for side in s.borders.iter_mut().flatten() {
                    side.color = c;
                }
            }
        }
        "width" => s.width = parse_dimension(val, fs),
        "height" => s.height = parse_dimension(val, fs),
        "max-width" => s.max_width = parse_dimension(val, fs),
        "page-break-before" | "break-before" => {
            s.page_break_before = matches!(val, "always" | "page" | "left" | "right")
        }
        "page-break-after" | "break-after" => {
            s.page_break_after = matches!(val, "always" | "page" | "left" | "right");
            s.keep_with_next = matches!(val, "avoid" | "avoid-page");
        }
        "page-break-inside" | "break-inside" => {
            s.page_break_inside_avoid = matches!(val, "avoid" | "avoid-page")
        }
        "border-radius" | "box-shadow" | "border-collapse" | "list-style" | "list-style-type"
        | "content" | "orphans" | "widows" => {}
        other => log::debug!("unsupported css property {other}: {val}"),
    }
}

fn auto_as_zero(value: &str) -> String {
    value
        .split_whitespace()
        .map(|p| if p == "auto" { "0" } else { p })
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_dimension(value: &str, font_size: f32) -> Dimension {
    match Length::parse(value) {
        Some(Length::Percent(p)) => Dimension::Percent(p),
        Some(l) => l.to_pt(font_size, 0.0).map_or(Dimension::Auto, Dimension::Pt),
        None => Dimension::Auto,
    }
}

/// Parse a `border` shorthand: width, style and colour in any order.
fn parse_border(value: &str, current_color: Color, font_size: f32) -> Option<BorderSide> {
    let mut width = 1.5;
    let mut color = current_color;
    for token in value.split_whitespace() {
        match token {
            "none" | "hidden" => return None,
            "solid" | "dashed" | "dotted" | "double" | "groove" | "ridge" | "inset" | "outset" => {}
            "thin" => width = 0.75,
            "medium" => width = 2.25,
            "thick" => width = 3.75,
            t => {
                if let Some(w) = Length::parse(t).and_then(|l| l.to_pt(font_size, 0.0)) {
                    width = w;
                } else if let Some(c) = Color::parse(t) {
                    color = c;
                }
            }
        }
    }
    (width > 0.0).then_some(BorderSide { width, color })
}

// ---------------------------------------------------------------------------
// Styled DOM tree
// ---------------------------------------------------------------------------

/// A DOM node annotated with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: Tag,
        style: ComputedStyle,
        children: Vec<StyledNode>,
        /// Original attributes (for images src, etc.)
        attrs: HashMap<String, String>,
    },
    Text {
        text: String,
        style: ComputedStyle,
    },
}

impl StyledNode {
    pub fn style(&self) -> &ComputedStyle {
        match self {
            StyledNode::Element { style, .. } | StyledNode::Text { style, .. } => style,
        }
    }
}

/// Style a whole document and return the styled `<body>`. Documents without
/// `<html>`/`<body>` get them synthesised so body rules still apply.
pub fn style_document(nodes: &[DomNode], cascade: &Cascade) -> StyledNode {
    let html = find_element(nodes, &Tag::Html)
        .map(|e| ElementNode {
            children: Vec::new(),
            ..e.clone()
        })
        .unwrap_or_else(|| ElementNode::new(Tag::Html));
    let mut body = find_element(nodes, &Tag::Body)
        .map(|e| ElementNode {
            children: Vec::new(),
            ..e.clone()
        })
        .unwrap_or_else(|| ElementNode::new(Tag::Body));
    body.children = body_children(nodes);

    let html_classes = html.classes();
    let html_key = ElementKey {
        tag: "html",
        classes: &html_classes,
    };
    let html_style = cascade.compute(&html, &[html_key], &ComputedStyle::default());

    let mut path: Vec<(&str, Vec<&str>)> = vec![("html", html_classes.clone())];
    style_element(&body, &mut path, &html_style, cascade)
}

fn find_element<'a>(nodes: &'a [DomNode], tag: &Tag) -> Option<&'a ElementNode> {
    nodes.iter().find_map(|node| match node {
        DomNode::Element(e) if e.tag == *tag => Some(e),
        DomNode::Element(e) => find_element(&e.children, tag),
        DomNode::Text(_) => None,
    })
}

fn style_element<'a>(
    element: &'a ElementNode,
    path: &mut Vec<(&'a str, Vec<&'a str>)>,
    parent: &ComputedStyle,
    cascade: &Cascade,
) -> StyledNode {
    path.push((element.tag.name(), element.classes()));
    let keys: Vec<ElementKey<'_>> = path
        .iter()
        .map(|(tag, classes)| ElementKey { tag, classes })
        .collect();
    let style = cascade.compute(element, &keys, parent);

    let children = element
        .children
        .iter()
        .filter_map(|child| match child {
            DomNode::Element(e) => Some(style_element(e, path, &style, cascade)),
            DomNode::Text(text) if text.is_empty() => None,
            DomNode::Text(text) => Some(StyledNode::Text {
                text: text.clone(),
                style: ComputedStyle::inherit_from(&style),
            }),
        })
        .collect();
    path.pop();

    StyledNode::Element {
        tag: element.tag.clone(),
        style,
        children,
        attrs: element.attributes.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    fn body(html: &str, css: &str) -> StyledNode {
        let cascade = Cascade::new(vec![Stylesheet::parse(css)]);
        style_document(&parse_html(html), &cascade)
    }

    fn children(node: &StyledNode) -> &[StyledNode] {
        match node {
            StyledNode::Element { children, .. } => children,
            StyledNode::Text { .. } => &[],
        }
    }

    #[test]
    fn user_agent_headings() {
        let root = body("<h1>T</h1>", "");
        let h1 = children(&root)[0].style();
        assert_eq!(h1.font_size, 24.0);
        assert!(h1.bold());
        assert!((h1.margin_top - 24.0 * 0.67).abs() < 0.01);
    }

    #[test]
    fn author_rules_override_defaults_and_inherit() {
        let root = body(
            "<p>x</p>",
            "body { font-family: Arial, sans-serif; color: #333; line-height: 1.6 }
             p { font-size: 11pt }",
        );
        let p = children(&root)[0].style();
        assert_eq!(p.font_family, BuiltinFamily::Helvetica);
        assert_eq!(p.font_size, 11.0);
        assert!((p.line_height - 1.6).abs() < 0.001);
        assert!((p.color.r - 0.2).abs() < 0.01);
    }

    #[test]
    fn specificity_and_order() {
        let root = body(
            r#"<p class="lead">x</p>"#,
            "p.lead { color: red } p { color: blue } p { color: green }",
        );
        let p = children(&root)[0].style();
        assert_eq!(p.color, Color::rgb(1.0, 0.0, 0.0));
    }

    #[test]
    fn inline_style_wins_over_rules() {
        let root = body(
            r#"<div style="font-size: 24px; color: #ff0000">x</div>"#,
            "div { color: blue }",
        );
        let div = children(&root)[0].style();
        assert_eq!(div.font_size, 18.0);
        assert!((div.color.r - 1.0).abs() < 0.01);
    }

    #[test]
    fn em_margins_use_own_font_size() {
        let root = body("<h2>x</h2>", "h2 { font-size: 20pt; margin: 1em 0 }");
        let h2 = children(&root)[0].style();
        assert_eq!(h2.margin_top, 20.0);
        assert_eq!(h2.margin_left, 0.0);
    }

    #[test]
    fn border_sides_and_break_hints() {
        let root = body(
            "<h1>x</h1>",
            "h1 { border-bottom: 2px solid #eee; page-break-after: avoid }",
        );
        let h1 = children(&root)[0].style();
        let bottom = h1.borders[2].unwrap();
        assert_eq!(bottom.width, 1.5);
        assert!(h1.borders[0].is_none());
        assert!(h1.keep_with_next);
        assert!(!h1.page_break_after);
    }

    #[test]
    fn head_is_not_rendered() {
        let root = body(
            "<html><head><title>T</title></head><body><p>x</p></body></html>",
            "",
        );
        assert_eq!(children(&root).len(), 1);
    }

    #[test]
    fn page_rule_is_merged() {
        let cascade = Cascade::new(vec![
            Stylesheet::parse("@page { size: A4; margin: 2cm }"),
            Stylesheet::parse("@page { margin: 1cm }"),
        ]);
        let page = cascade.page_rule();
        assert!(page.size.is_some());
        assert!((page.margin.unwrap()[0] - 28.35).abs() < 0.1);
    }
}
