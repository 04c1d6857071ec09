//! HTML parser – converts an HTML string into a simple DOM tree.
//!
//! The supported subset is what the markdown converter emits plus the
//! document shell around it:
//! - Document: html, head, body, title, meta, style
//! - Block: div, p, h1-h6, ul, ol, li, table, thead, tbody, tr, td, th,
//!   pre, blockquote, hr
//! - Inline: span, a, strong, b, em, i, code, br, img

use std::collections::HashMap;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// The tag name of a supported element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Body,
    Title,
    Meta,
    Style,
    Div,
    P,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Ul,
    Ol,
    Li,
    Table,
    Thead,
    Tbody,
    Tr,
    Td,
    Th,
    Pre,
    Blockquote,
    Hr,
    Span,
    A,
    Strong,
    Em,
    Code,
    Br,
    Img,
    /// Catch-all for unknown tags.
    Unknown(String),
}

impl Tag {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "body" => Tag::Body,
            "title" => Tag::Title,
            "meta" => Tag::Meta,
            "style" => Tag::Style,
            "div" => Tag::Div,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "h4" => Tag::H4,
            "h5" => Tag::H5,
            "h6" => Tag::H6,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "table" => Tag::Table,
            "thead" => Tag::Thead,
            "tbody" => Tag::Tbody,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "pre" => Tag::Pre,
            "blockquote" => Tag::Blockquote,
            "hr" => Tag::Hr,
            "span" => Tag::Span,
            "a" => Tag::A,
            "strong" | "b" => Tag::Strong,
            "em" | "i" => Tag::Em,
            "code" => Tag::Code,
            "br" => Tag::Br,
            "img" => Tag::Img,
            other => Tag::Unknown(other.to_string()),
        }
    }

    /// Lower-case name used for CSS type selectors.
    pub fn name(&self) -> &str {
        match self {
            Tag::Html => "html",
            Tag::Head => "head",
            Tag::Body => "body",
            Tag::Title => "title",
            Tag::Meta => "meta",
            Tag::Style => "style",
            Tag::Div => "div",
            Tag::P => "p",
            Tag::H1 => "h1",
            Tag::H2 => "h2",
            Tag::H3 => "h3",
            Tag::H4 => "h4",
            Tag::H5 => "h5",
            Tag::H6 => "h6",
            Tag::Ul => "ul",
            Tag::Ol => "ol",
            Tag::Li => "li",
            Tag::Table => "table",
            Tag::Thead => "thead",
            Tag::Tbody => "tbody",
            Tag::Tr => "tr",
            Tag::Td => "td",
            Tag::Th => "th",
            Tag::Pre => "pre",
            Tag::Blockquote => "blockquote",
            Tag::Hr => "hr",
            Tag::Span => "span",
            Tag::A => "a",
            Tag::Strong => "strong",
            Tag::Em => "em",
            Tag::Code => "code",
            Tag::Br => "br",
            Tag::Img => "img",
            Tag::Unknown(name) => name,
        }
    }

    /// Elements with no content and no closing tag.
    pub fn is_void(&self) -> bool {
        matches!(self, Tag::Img | Tag::Br | Tag::Hr | Tag::Meta)
    }

    /// Elements whose content is raw text, not markup.
    pub fn is_raw_text(&self) -> bool {
        matches!(self, Tag::Style | Tag::Title)
    }
}

/// A node in our DOM tree.
#[derive(Debug, Clone)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element node carrying tag, attributes, and children.
#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attributes.get("style").map(|s| s.as_str())
    }

    pub fn src(&self) -> Option<&str> {
        self.attributes.get("src").map(|s| s.as_str())
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                DomNode::Text(t) => out.push_str(t),
                DomNode::Element(e) => out.push_str(&e.text_content()),
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Parser – simple recursive descent over HTML
// ---------------------------------------------------------------------------

/// Parse an HTML string into a list of DOM nodes.
///
/// A hand-written parser for the controlled subset above. Closing tags are
/// matched against the open element stack so that stray `</p>` or a missing
/// `</li>` do not swallow the rest of the document.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut parser = Parser::new(html);
    parser.parse_nodes(&mut Vec::new())
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Parse siblings until EOF or a closing tag for an element on `open`.
    fn parse_nodes(&mut self, open: &mut Vec<String>) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        loop {
            if self.eof() {
                break;
            }
            if self.starts_with("</") {
                let name = self.peek_closing_name();
                if open.iter().any(|o| *o == name) {
                    break;
                }
                // Closing tag for nothing we have open: drop it.
                self.skip_past('>');
                continue;
            }
            if let Some(node) = self.parse_node(open) {
                nodes.push(node);
            }
        }
        nodes
    }

    fn parse_node(&mut self, open: &mut Vec<String>) -> Option<DomNode> {
        if self.starts_with("<!--") {
            self.skip_comment();
            return None;
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            self.skip_past('>');
            return None;
        }
        if self.starts_with("<") && self.next_is_tag_start() {
            Some(self.parse_element(open))
        } else {
            self.parse_text()
        }
    }

    fn next_is_tag_start(&self) -> bool {
        self.input[self.pos + 1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
    }

    fn parse_text(&mut self) -> Option<DomNode> {
        let start = self.pos;
        // A lone '<' that doesn't start a tag is text.
        self.advance(1);
        while !self.eof() && !self.starts_with("<") {
            self.advance(1);
        }
        let text = &self.input[start..self.pos];
        Some(DomNode::Text(decode_entities(text)))
    }

    fn parse_element(&mut self, open: &mut Vec<String>) -> DomNode {
        self.advance(1); // '<'
        let tag_name = self.parse_name().to_ascii_lowercase();
        let tag = Tag::parse(&tag_name);
        let mut elem = ElementNode::new(tag.clone());

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let (key, value) = self.parse_attribute();
            if key.is_empty() {
                // Unparseable attribute garbage: skip a character and retry.
                self.advance(1);
                continue;
            }
            elem.attributes.insert(key.to_ascii_lowercase(), value);
        }

        if self.starts_with("/>") {
            self.advance(2);
            return DomNode::Element(elem);
        }
        if self.starts_with(">") {
            self.advance(1);
        }
        if tag.is_void() {
            return DomNode::Element(elem);
        }

        if tag.is_raw_text() {
            let close = format!("</{tag_name}");
            let start = self.pos;
            let end = self.input[start..]
                .to_ascii_lowercase()
                .find(&close)
                .map(|i| start + i)
                .unwrap_or(self.input.len());
            let raw = &self.input[start..end];
            if !raw.is_empty() {
                let text = if tag == Tag::Style {
                    raw.to_string()
                } else {
                    decode_entities(raw)
                };
                elem.children.push(DomNode::Text(text));
            }
            self.pos = end;
            self.consume_closing(&tag_name);
            return DomNode::Element(elem);
        }

        open.push(tag_name.clone());
        elem.children = self.parse_nodes(open);
        open.pop();
        self.consume_closing(&tag_name);

        DomNode::Element(elem)
    }

    /// Consume `</name>` if it is next; leave any other closing tag for an
    /// ancestor.
    fn consume_closing(&mut self, name: &str) {
        if self.starts_with("</") && self.peek_closing_name() == name {
            self.skip_past('>');
        }
    }

    fn peek_closing_name(&self) -> String {
        let rest = &self.input[self.pos + 2..];
        rest.chars()
            .take_while(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
            .collect::<String>()
            .to_ascii_lowercase()
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.advance(1);
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_name();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.advance(1);
        self.skip_whitespace();
        let value = self.parse_attr_value();
        (key, value)
    }

    fn parse_attr_value(&mut self) -> String {
        for quote in ["\"", "'"] {
            if self.starts_with(quote) {
                self.advance(1);
                let start = self.pos;
                while !self.eof() && !self.starts_with(quote) {
                    self.advance(1);
                }
                let val = self.input[start..self.pos].to_string();
                if !self.eof() {
                    self.advance(1);
                }
                return decode_entities(&val);
            }
        }
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_whitespace() || c == '>' {
                break;
            }
            self.advance(1);
        }
        self.input[start..self.pos].to_string()
    }

    fn skip_whitespace(&mut self) {
        while !self.eof() && self.current_char().is_whitespace() {
            self.advance(1);
        }
    }

    fn skip_past(&mut self, c: char) {
        while !self.eof() && self.current_char() != c {
            self.advance(1);
        }
        if !self.eof() {
            self.advance(1);
        }
    }

    fn skip_comment(&mut self) {
        self.advance(4); // <!--
        while !self.eof() && !self.starts_with("-->") {
            self.advance(1);
        }
        if !self.eof() {
            self.advance(3);
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.input[self.pos..].chars().next().unwrap_or('\0')
    }

    fn advance(&mut self, n: usize) {
        // Advance by `n` characters (not bytes).
        for _ in 0..n {
            if let Some(c) = self.input[self.pos..].chars().next() {
                self.pos += c.len_utf8();
            }
        }
    }
}

/// Decode the named and numeric entities that markdown converters emit.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{00A0}'),
        "mdash" => Some('\u{2014}'),
        "ndash" => Some('\u{2013}'),
        "hellip" => Some('\u{2026}'),
        "laquo" => Some('\u{00AB}'),
        "raquo" => Some('\u{00BB}'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience helpers
// ---------------------------------------------------------------------------

/// Find the `<body>` element and return its children, or return all nodes if
/// no `<body>` is present.
pub fn body_children(nodes: &[DomNode]) -> Vec<DomNode> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Body {
                return e.children.clone();
            }
            if e.tag == Tag::Html {
                let inner = body_children(&e.children);
                if !inner.is_empty() {
                    return inner;
                }
            }
        }
    }
    nodes
        .iter()
        .filter(|n| !matches!(n, DomNode::Element(e) if e.tag == Tag::Head))
        .cloned()
        .collect()
}

/// Collect the text of every `<style>` element, in document order.
pub fn collect_stylesheets(nodes: &[DomNode]) -> Vec<String> {
    let mut out = Vec::new();
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Style {
                out.push(e.text_content());
            } else {
                out.extend(collect_stylesheets(&e.children));
            }
        }
    }
    out
}

/// Text of the first `<title>` element.
pub fn document_title(nodes: &[DomNode]) -> Option<String> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Title {
                let t = e.text_content().trim().to_string();
                return (!t.is_empty()).then_some(t);
            }
            if let Some(t) = document_title(&e.children) {
                return Some(t);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: &DomNode) -> &ElementNode {
        match node {
            DomNode::Element(e) => e,
            DomNode::Text(t) => panic!("Expected element, got text {t:?}"),
        }
    }

    #[test]
    fn parse_simple_div() {
        let nodes = parse_html(r#"<div class="note wide"><p>Hello</p></div>"#);
        assert_eq!(nodes.len(), 1);
        let e = element(&nodes[0]);
        assert_eq!(e.tag, Tag::Div);
        assert_eq!(e.classes(), vec!["note", "wide"]);
        assert_eq!(e.children.len(), 1);
    }

    #[test]
    fn void_elements_have_no_children() {
        let nodes = parse_html("<p>a<br>b</p><hr><p>c</p>");
        assert_eq!(nodes.len(), 3);
        let p = element(&nodes[0]);
        assert_eq!(p.children.len(), 3);
        assert_eq!(element(&nodes[1]).tag, Tag::Hr);
    }

    #[test]
    fn inline_emphasis_is_parsed() {
        let nodes = parse_html("<p>Hello <strong>world</strong> and <em>more</em></p>");
        let p = element(&nodes[0]);
        assert_eq!(p.children.len(), 4);
        assert_eq!(element(&p.children[1]).tag, Tag::Strong);
        assert_eq!(element(&p.children[3]).tag, Tag::Em);
    }

    #[test]
    fn unsupported_tags_are_kept_by_name() {
        let nodes = parse_html("<p>a <del>b</del></p>");
        let p = element(&nodes[0]);
        assert_eq!(element(&p.children[1]).tag, Tag::Unknown("del".to_string()));
        assert_eq!(element(&p.children[1]).tag.name(), "del");
    }

    #[test]
    fn code_block_keeps_entities_decoded() {
        let nodes = parse_html("<pre><code class=\"language-rust\">if a &lt; b &amp;&amp; c {}\n</code></pre>");
        let pre = element(&nodes[0]);
        assert_eq!(pre.tag, Tag::Pre);
        assert_eq!(pre.text_content(), "if a < b && c {}\n");
    }

    #[test]
    fn style_and_title_are_raw_text() {
        let html = "<html><head><title>Report &amp; notes</title><style>p > b { color: red; }</style></head><body><p>x</p></body></html>";
        let dom = parse_html(html);
        assert_eq!(collect_stylesheets(&dom), vec!["p > b { color: red; }".to_string()]);
        assert_eq!(document_title(&dom).as_deref(), Some("Report & notes"));
        let body = body_children(&dom);
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn stray_closing_tag_is_ignored() {
        let nodes = parse_html("<div><p>one</span></p><p>two</p></div>");
        let div = element(&nodes[0]);
        assert_eq!(div.children.len(), 2);
    }

    #[test]
    fn lone_less_than_is_text() {
        let nodes = parse_html("<p>a < b</p>");
        assert_eq!(element(&nodes[0]).text_content(), "a < b");
    }

    #[test]
    fn entity_decoding() {
        assert_eq!(decode_entities("&#8212; &#x41; &bogus; &"), "\u{2014} A &bogus; &");
    }

    #[test]
    fn parse_table() {
        let html = "<table><thead><tr><th>Name</th></tr></thead><tbody><tr><td>Alice</td></tr></tbody></table>";
        let nodes = parse_html(html);
        let table = element(&nodes[0]);
        assert_eq!(table.tag, Tag::Table);
        assert_eq!(table.children.len(), 2);
    }
}
