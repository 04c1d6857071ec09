//! Stylesheet parser – rules, selectors, values, and `@page` geometry.
//!
//! Covers the CSS that report stylesheets actually use: type / class /
//! descendant selectors, plain declarations, `@media print` blocks and an
//! `@page` rule with `size`, `margin` and margin boxes (`@top-center`, …)
//! whose `content` may reference `counter(page)` and `counter(pages)`.

use serde::{Deserialize, Serialize};

use crate::layout_config::{A4_HEIGHT_PT, A4_WIDTH_PT};

/// Points per CSS unit.
const PT_PER_PX: f32 = 0.75;
const PT_PER_IN: f32 = 72.0;
const PT_PER_CM: f32 = 72.0 / 2.54;
const PT_PER_MM: f32 = 72.0 / 25.4;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => Some(Self::rgb(
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            )),
            _ => None,
        }
    }

    /// Parse a CSS colour value. Gradients resolve to their first stop.
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim().to_ascii_lowercase();
        if v.starts_with('#') {
            return Self::from_hex(&v);
        }
        if let Some(args) = function_args(&v, "rgb").or_else(|| function_args(&v, "rgba")) {
            let parts: Vec<f32> = args
                .split(',')
                .filter_map(|p| p.trim().parse::<f32>().ok())
                .collect();
            return match parts.as_slice() {
                [r, g, b] => Some(Self::rgb(r / 255.0, g / 255.0, b / 255.0)),
                [r, g, b, a] => Some(Self {
                    r: r / 255.0,
                    g: g / 255.0,
                    b: b / 255.0,
                    a: *a,
                }),
                _ => None,
            };
        }
        if let Some(args) = function_args(&v, "linear-gradient") {
            return args.split(',').find_map(|stop| {
                let first = stop.split_whitespace().next()?;
                Self::parse(first)
            });
        }
        Self::named(&v)
    }

    fn named(name: &str) -> Option<Self> {
        let c = match name {
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "transparent" => Self::TRANSPARENT,
            "red" => Self::rgb(1.0, 0.0, 0.0),
            "green" => Self::rgb(0.0, 0.502, 0.0),
            "blue" => Self::rgb(0.0, 0.0, 1.0),
            "gray" | "grey" => Self::rgb(0.502, 0.502, 0.502),
            "lightgray" | "lightgrey" => Self::rgb(0.827, 0.827, 0.827),
            "darkblue" => Self::rgb(0.0, 0.0, 0.545),
            "darkgreen" => Self::rgb(0.0, 0.392, 0.0),
            "navy" => Self::rgb(0.0, 0.0, 0.502),
            "orange" => Self::rgb(1.0, 0.647, 0.0),
            "purple" => Self::rgb(0.502, 0.0, 0.502),
            _ => return None,
        };
        Some(c)
    }
}

fn function_args<'a>(value: &'a str, name: &str) -> Option<&'a str> {
    let rest = value.strip_prefix(name)?.trim_start().strip_prefix('(')?;
    rest.rfind(')').map(|end| &rest[..end])
}

/// A CSS length before resolution against a font size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Pt(f32),
    Em(f32),
    Percent(f32),
    Auto,
}

impl Length {
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim().to_ascii_lowercase();
        if v == "auto" {
            return Some(Length::Auto);
        }
        if v == "0" {
            return Some(Length::Pt(0.0));
        }
        let split = v
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
            .unwrap_or(v.len());
        let (num, unit) = v.split_at(split);
        let n: f32 = num.parse().ok()?;
        match unit {
            "pt" => Some(Length::Pt(n)),
            "px" => Some(Length::Pt(n * PT_PER_PX)),
            "in" => Some(Length::Pt(n * PT_PER_IN)),
            "cm" => Some(Length::Pt(n * PT_PER_CM)),
            "mm" => Some(Length::Pt(n * PT_PER_MM)),
            "em" | "rem" => Some(Length::Em(n)),
            "%" => Some(Length::Percent(n)),
            "" => Some(Length::Pt(n * PT_PER_PX)),
            _ => None,
        }
    }

    /// Resolve to points. `Percent` resolves against `percent_base`.
    pub fn to_pt(self, font_size: f32, percent_base: f32) -> Option<f32> {
        match self {
            Length::Pt(v) => Some(v),
            Length::Em(v) => Some(v * font_size),
            Length::Percent(p) => Some(percent_base * p / 100.0),
            Length::Auto => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Rules & selectors
// ---------------------------------------------------------------------------

/// One compound selector: optional type plus classes, e.g. `h1`, `.note`,
/// `p.lead`, `*`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Compound {
    pub tag: Option<String>,
    pub classes: Vec<String>,
}

impl Compound {
    fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split('.');
        let head = parts.next()?;
        let tag = match head {
            "" | "*" => None,
            t if t.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') => {
                Some(t.to_ascii_lowercase())
            }
            _ => return None,
        };
        let classes: Vec<String> = parts.map(str::to_string).collect();
        if classes.iter().any(|c| c.is_empty()) {
            return None;
        }
        Some(Self { tag, classes })
    }

    pub fn matches(&self, tag: &str, classes: &[&str]) -> bool {
        self.tag.as_deref().map_or(true, |t| t == tag)
            && self.classes.iter().all(|c| classes.contains(&c.as_str()))
    }
}

/// A descendant-combinator chain; the last compound is the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub parts: Vec<Compound>,
}

/// Tag name and classes of one element on the ancestor path.
#[derive(Debug, Clone, Copy)]
pub struct ElementKey<'a> {
    pub tag: &'a str,
    pub classes: &'a [&'a str],
}

impl Selector {
    pub fn parse(s: &str) -> Option<Self> {
        // `>` is treated as a descendant combinator.
        let normalized = s.replace('>', " ");
        let parts: Option<Vec<Compound>> = normalized.split_whitespace().map(Compound::parse).collect();
        let parts = parts?;
        (!parts.is_empty()).then_some(Self { parts })
    }

    /// (class count, type count)
    pub fn specificity(&self) -> (usize, usize) {
        self.parts.iter().fold((0, 0), |(c, t), p| {
            (c + p.classes.len(), t + usize::from(p.tag.is_some()))
        })
    }

    /// `path` runs from the root to the element being styled (inclusive).
    pub fn matches(&self, path: &[ElementKey<'_>]) -> bool {
        let Some((subject, ancestors)) = self.parts.split_last() else {
            return false;
        };
        let Some((element, mut above)) = path.split_last() else {
            return false;
        };
        if !subject.matches(element.tag, element.classes) {
            return false;
        }
        for wanted in ancestors.iter().rev() {
            loop {
                let Some((candidate, rest)) = above.split_last() else {
                    return false;
                };
                above = rest;
                if wanted.matches(candidate.tag, candidate.classes) {
                    break;
                }
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub selectors: Vec<Selector>,
    pub declarations: Vec<Declaration>,
}

/// Where a margin box sits on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginPosition {
    TopLeft,
    TopCenter,
    TopRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl MarginPosition {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "top-left" => Some(MarginPosition::TopLeft),
            "top-center" => Some(MarginPosition::TopCenter),
            "top-right" => Some(MarginPosition::TopRight),
            "bottom-left" => Some(MarginPosition::BottomLeft),
            "bottom-center" => Some(MarginPosition::BottomCenter),
            "bottom-right" => Some(MarginPosition::BottomRight),
            _ => None,
        }
    }

    pub fn is_top(self) -> bool {
        matches!(
            self,
            MarginPosition::TopLeft | MarginPosition::TopCenter | MarginPosition::TopRight
        )
    }
}

/// One piece of generated `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentItem {
    Text(String),
    PageNumber,
    PageCount,
}

/// Evaluate generated content for a given page (1-based).
pub fn render_content(items: &[ContentItem], page: usize, pages: usize) -> String {
    items
        .iter()
        .map(|item| match item {
            ContentItem::Text(t) => t.clone(),
            ContentItem::PageNumber => page.to_string(),
            ContentItem::PageCount => pages.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct MarginBox {
    pub position: MarginPosition,
    pub content: Vec<ContentItem>,
    pub declarations: Vec<Declaration>,
}

/// Page geometry collected from `@page` rules.
#[derive(Debug, Clone, Default)]
pub struct PageRule {
    /// Width × height in points.
    pub size: Option<(f32, f32)>,
    /// Top, right, bottom, left in points.
    pub margin: Option<[f32; 4]>,
    pub margin_boxes: Vec<MarginBox>,
}

impl PageRule {
    /// Later rules override earlier ones property by property; margin boxes
    /// at the same position are replaced.
    pub fn merge(&mut self, other: &PageRule) {
        if other.size.is_some() {
            self.size = other.size;
        }
        if other.margin.is_some() {
            self.margin = other.margin;
        }
        for mbox in &other.margin_boxes {
            self.margin_boxes.retain(|m| m.position != mbox.position);
            self.margin_boxes.push(mbox.clone());
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
    pub page: PageRule,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

impl Stylesheet {
    pub fn parse(css: &str) -> Self {
        let mut sheet = Stylesheet::default();
        let css = strip_comments(css);
        parse_block_list(&css, &mut sheet);
        sheet
    }
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Split `css` into `(prelude, body)` pairs at the top nesting level.
/// Statements without a block (`@import …;`) come back with an empty body.
fn top_level_blocks(css: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let bytes = css.as_bytes();
    let mut i = 0;
    let mut start = 0;
    while i < bytes.len() {
        match bytes[i] {
            b';' => {
                out.push((css[start..i].trim(), ""));
                start = i + 1;
            }
            b'{' => {
                let prelude = css[start..i].trim();
                let mut depth = 1;
                let body_start = i + 1;
                i += 1;
                while i < bytes.len() && depth > 0 {
                    match bytes[i] {
                        b'{' => depth += 1,
                        b'}' => depth -= 1,
                        _ => {}
                    }
                    i += 1;
                }
                let body_end = if depth == 0 { i - 1 } else { i };
                out.push((prelude, &css[body_start..body_end]));
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    out
}

fn parse_block_list(css: &str, sheet: &mut Stylesheet) {
    for (prelude, body) in top_level_blocks(css) {
        if prelude.is_empty() {
            continue;
        }
        if let Some(at) = prelude.strip_prefix('@') {
            let name = at.split_whitespace().next().unwrap_or("");
            match name {
                "page" => {
                    let page = parse_page_rule(body);
                    sheet.page.merge(&page);
                }
                "media" => {
                    let query = at["media".len()..].trim().to_ascii_lowercase();
                    if query.is_empty() || query.contains("print") || query.contains("all") {
                        parse_block_list(body, sheet);
                    }
                }
                other => log::warn!("ignoring unsupported at-rule @{other}"),
            }
            continue;
        }
        let selectors: Vec<Selector> = prelude.split(',').filter_map(Selector::parse).collect();
        if selectors.is_empty() {
            log::warn!("ignoring rule with unsupported selector {prelude:?}");
            continue;
        }
        sheet.rules.push(Rule {
            selectors,
            declarations: parse_declarations(body),
        });
    }
}

/// Parse `prop: value; …` into declarations. Also used for `style=""`.
pub fn parse_declarations(body: &str) -> Vec<Declaration> {
    body.split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let mut value = value.trim();
            if prop.is_empty() || value.is_empty() {
                return None;
            }
            let important = value.to_ascii_lowercase().ends_with("!important");
            if important {
                value = value[..value.len() - "!important".len()].trim_end();
            }
            Some(Declaration {
                property: prop,
                value: value.to_string(),
                important,
            })
        })
        .collect()
}

fn parse_page_rule(body: &str) -> PageRule {
    let mut page = PageRule::default();
    let mut plain = String::new();

    for (prelude, inner) in top_level_blocks(body) {
        if let Some(position) = prelude.strip_prefix('@').and_then(MarginPosition::parse) {
            let declarations = parse_declarations(inner);
            let content = declarations
                .iter()
                .rev()
                .find(|d| d.property == "content")
                .map(|d| parse_content(&d.value))
                .unwrap_or_default();
            page.margin_boxes.push(MarginBox {
                position,
                content,
                declarations,
            });
        } else if inner.is_empty() {
            plain.push_str(prelude);
            plain.push(';');
        }
    }
    // Trailing declaration without a semicolon.
    if let Some(tail) = body.rsplit(['}', ';']).next() {
        if !tail.contains('{') {
            plain.push_str(tail);
        }
    }

    for decl in parse_declarations(&plain) {
        match decl.property.as_str() {
            "size" => page.size = parse_page_size(&decl.value),
            "margin" => page.margin = parse_box_shorthand(&decl.value, 0.0),
            _ => {}
        }
    }
    page
}

/// Parse `size:` of an `@page` rule.
pub fn parse_page_size(value: &str) -> Option<(f32, f32)> {
    let v = value.to_ascii_lowercase();
    let words: Vec<&str> = v.split_whitespace().collect();
    let landscape = words.contains(&"landscape");
    let named = words.iter().find_map(|w| match *w {
        "a4" => Some((A4_WIDTH_PT, A4_HEIGHT_PT)),
        "a5" => Some((419.53, 595.28)),
        "a3" => Some((841.89, 1190.55)),
        "letter" => Some((612.0, 792.0)),
        "legal" => Some((612.0, 1008.0)),
        _ => None,
    });
    let (w, h) = match named {
        Some(size) => size,
        None => {
            let lengths: Vec<f32> = words
                .iter()
                .filter_map(|w| Length::parse(w)?.to_pt(12.0, 0.0))
                .collect();
            match lengths.as_slice() {
                [side] => (*side, *side),
                [w, h] => (*w, *h),
                _ => return None,
            }
        }
    };
    Some(if landscape { (h.max(w), h.min(w)) } else { (w, h) })
}

/// Parse a 1–4 value box shorthand (`margin`, `padding`) into
/// `[top, right, bottom, left]` points.
pub fn parse_box_shorthand(value: &str, font_size: f32) -> Option<[f32; 4]> {
    let parts: Vec<f32> = value
        .split_whitespace()
        .map(|p| Length::parse(p).map(|l| l.to_pt(font_size, 0.0).unwrap_or(0.0)))
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [a] => Some([*a, *a, *a, *a]),
        [v, h] => Some([*v, *h, *v, *h]),
        [t, h, b] => Some([*t, *h, *b, *h]),
        [t, r, b, l] => Some([*t, *r, *b, *l]),
        _ => None,
    }
}

/// Parse a `content:` value into literal text and page counters.
pub fn parse_content(value: &str) -> Vec<ContentItem> {
    let mut items = Vec::new();
    let mut rest = value.trim();
    while !rest.is_empty() {
        if let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') {
            let body = &rest[1..];
            let end = body.find(quote).unwrap_or(body.len());
            items.push(ContentItem::Text(body[..end].to_string()));
            rest = body.get(end + 1..).unwrap_or("").trim_start();
        } else if let Some(args) = rest.strip_prefix("counter(") {
            let end = args.find(')').unwrap_or(args.len());
            match args[..end].trim() {
                "page" => items.push(ContentItem::PageNumber),
                "pages" => items.push(ContentItem::PageCount),
                other => log::warn!("unsupported counter {other:?} in content"),
            }
            rest = args.get(end + 1..).unwrap_or("").trim_start();
        } else {
            // Skip an unsupported token.
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            rest = rest[end..].trim_start();
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key<'a>(tag: &'a str, classes: &'a [&'a str]) -> ElementKey<'a> {
        ElementKey { tag, classes }
    }

    #[test]
    fn parses_rules_and_selector_lists() {
        let sheet = Stylesheet::parse("h1, h2 , h3 { color: #2c3e50; border-bottom: 2px solid #eee }");
        assert_eq!(sheet.rules.len(), 1);
        assert_eq!(sheet.rules[0].selectors.len(), 3);
        assert_eq!(sheet.rules[0].declarations.len(), 2);
        assert_eq!(sheet.rules[0].declarations[1].value, "2px solid #eee");
    }

    #[test]
    fn comments_are_stripped() {
        let sheet = Stylesheet::parse("/* a { } */ p { margin: 0 } /* trailing");
        assert_eq!(sheet.rules.len(), 1);
    }

    #[test]
    fn page_rule_with_margin_boxes() {
        let css = r#"
            @page {
                size: A4;
                margin: 2cm;
                @top-center { content: "Report title"; font-size: 10pt; color: #666; }
                @bottom-center { content: "Page " counter(page) " of " counter(pages); }
            }
        "#;
        let sheet = Stylesheet::parse(css);
        let (w, h) = sheet.page.size.unwrap();
        assert!((w - 595.28).abs() < 0.01 && (h - 841.89).abs() < 0.01);
        let margin = sheet.page.margin.unwrap();
        assert!((margin[0] - 56.69).abs() < 0.01);
        assert_eq!(sheet.page.margin_boxes.len(), 2);
        let footer = &sheet.page.margin_boxes[1];
        assert_eq!(footer.position, MarginPosition::BottomCenter);
        assert_eq!(render_content(&footer.content, 3, 7), "Page 3 of 7");
    }

    #[test]
    fn page_rules_merge() {
        let mut base = Stylesheet::parse("@page { size: A4; margin: 1in; @top-center { content: 'x' } }").page;
        let print = Stylesheet::parse("@page { margin: 2cm }").page;
        base.merge(&print);
        assert!(base.size.is_some());
        assert!((base.margin.unwrap()[1] - 56.69).abs() < 0.01);
        assert_eq!(base.margin_boxes.len(), 1);
    }

    #[test]
    fn landscape_page_size() {
        let (w, h) = parse_page_size("A4 landscape").unwrap();
        assert!(w > h);
        assert_eq!(parse_page_size("100mm 50mm").map(|(w, _)| w.round()), Some(283.0));
        assert_eq!(parse_page_size("huge"), None);
    }

    #[test]
    fn lengths() {
        assert_eq!(Length::parse("11pt"), Some(Length::Pt(11.0)));
        assert_eq!(Length::parse("16px"), Some(Length::Pt(12.0)));
        assert_eq!(Length::parse("2.5em"), Some(Length::Em(2.5)));
        assert_eq!(Length::parse("auto"), Some(Length::Auto));
        assert_eq!(Length::parse("wide"), None);
        assert_eq!(Length::Em(2.0).to_pt(10.0, 0.0), Some(20.0));
    }

    #[test]
    fn colours() {
        assert_eq!(Color::parse("#fff"), Some(Color::WHITE));
        assert_eq!(Color::parse("darkblue"), Some(Color::rgb(0.0, 0.0, 0.545)));
        let grad = Color::parse("linear-gradient(to right, #3498db, #9b59b6)").unwrap();
        assert!((grad.b - 0.859).abs() < 0.01);
        let rgba = Color::parse("rgba(0, 0, 0, 0.5)").unwrap();
        assert!((rgba.a - 0.5).abs() < 0.001);
    }

    #[test]
    fn selector_matching() {
        let sel = Selector::parse("pre code").unwrap();
        assert_eq!(sel.specificity(), (0, 2));
        let path = [key("body", &[]), key("pre", &[]), key("code", &["language-rust"])];
        assert!(sel.matches(&path));
        assert!(!sel.matches(&[key("p", &[]), key("code", &[])]));

        let class = Selector::parse(".page-break").unwrap();
        assert!(class.matches(&[key("div", &["page-break"])]));
        assert!(!class.matches(&[key("div", &[])]));
        assert!(Selector::parse("a:hover").is_none());
    }

    #[test]
    fn important_flag() {
        let decls = parse_declarations("color: red !important; margin: 0");
        assert!(decls[0].important);
        assert_eq!(decls[0].value, "red");
        assert!(!decls[1].important);
    }

    #[test]
    fn print_media_is_applied() {
        let sheet = Stylesheet::parse("@media print { p { color: red } } @media screen { p { color: blue } }");
        assert_eq!(sheet.rules.len(), 1);
    }
}
