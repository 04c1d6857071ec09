//! Line classifier for the direct-layout route.
//!
//! Each stripped markdown line maps to exactly one [`Block`] using a fixed,
//! order-sensitive set of prefix/suffix tests. The first matching test wins.

use serde::{Deserialize, Serialize};

/// Glyph prepended to list items.
pub const BULLET: &str = "\u{2022} ";

/// Number of underscores drawn for a horizontal rule.
pub const RULE_WIDTH_CHARS: usize = 50;

/// What a markdown line turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    Title,
    Heading2,
    Heading3,
    Paragraph,
    BoldParagraph,
    ItalicParagraph,
    ListItem,
    Rule,
    BlankSpacer,
    SkippedCodeLine,
}

/// One classified line. `text` is paragraph markup, ready for the layout
/// engine: emphasis is expressed as `<b>`/`<i>` tags and plain paragraphs are
/// entity-escaped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    pub text: String,
}

impl Block {
    fn new(kind: BlockKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    fn empty(kind: BlockKind) -> Self {
        Self::new(kind, String::new())
    }
}

/// How lines between two triple-backtick markers are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FenceMode {
    /// Only the marker lines are dropped; the lines between them are
    /// classified like any other line.
    #[default]
    MarkerOnly,
    /// Track whether the scan is inside a fence and drop every line from the
    /// opening marker through the closing one.
    Toggle,
}

/// Classify a single line that has already been stripped of surrounding
/// whitespace. Total: every input yields a block.
pub fn classify_line(line: &str) -> Block {
    if line.is_empty() {
        return Block::empty(BlockKind::BlankSpacer);
    }
    if let Some(rest) = line.strip_prefix("# ") {
        return Block::new(BlockKind::Title, rest.trim());
    }
    if let Some(rest) = line.strip_prefix("## ") {
        return Block::new(BlockKind::Heading2, rest.trim());
    }
    if let Some(rest) = line.strip_prefix("### ") {
        return Block::new(BlockKind::Heading3, rest.trim());
    }
    if is_fence_marker(line) {
        return Block::empty(BlockKind::SkippedCodeLine);
    }
    if line.len() >= 4 && line.starts_with("**") && line.ends_with("**") {
        let inner = &line[2..line.len() - 2];
        return Block::new(BlockKind::BoldParagraph, format!("<b>{inner}</b>"));
    }
    if let Some(rest) = line.strip_prefix('*') {
        return Block::new(BlockKind::ItalicParagraph, format!("<i>{rest}</i>"));
    }
    if let Some(rest) = line.strip_prefix("- ") {
        return Block::new(BlockKind::ListItem, format!("{BULLET}{rest}"));
    }
    if line.starts_with("---") {
        return Block::new(BlockKind::Rule, "_".repeat(RULE_WIDTH_CHARS));
    }
    Block::new(BlockKind::Paragraph, escape_markup(line))
}

fn is_fence_marker(line: &str) -> bool {
    line.starts_with("```")
}

/// Escape the three characters that are significant in paragraph markup.
/// `&` goes first so that the entities produced for `<` and `>` are not
/// escaped a second time.
pub fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Stateful scanner over the lines of a document.
#[derive(Debug, Default)]
pub struct LineClassifier {
    mode: FenceMode,
    in_fence: bool,
}

impl LineClassifier {
    pub fn new(mode: FenceMode) -> Self {
        Self {
            mode,
            in_fence: false,
        }
    }

    /// Classify one raw (unstripped) line.
    pub fn classify(&mut self, raw: &str) -> Block {
        let line = raw.trim();
        if self.mode == FenceMode::Toggle {
            if is_fence_marker(line) {
                self.in_fence = !self.in_fence;
                return Block::empty(BlockKind::SkippedCodeLine);
            }
            if self.in_fence {
                return Block::empty(BlockKind::SkippedCodeLine);
            }
        }
        classify_line(line)
    }

    pub fn in_fence(&self) -> bool {
        self.in_fence
    }
}

/// Classify every line of `content`. Lines are split on `\n` only, so a
/// trailing newline yields a final blank block.
pub fn classify_document(content: &str, mode: FenceMode) -> Vec<Block> {
    let mut classifier = LineClassifier::new(mode);
    content
        .split('\n')
        .map(|line| classifier.classify(line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_strips_marker() {
        let block = classify_line("# Design review");
        assert_eq!(block.kind, BlockKind::Title);
        assert_eq!(block.text, "Design review");
    }

    #[test]
    fn heading_levels() {
        assert_eq!(classify_line("## Colours").kind, BlockKind::Heading2);
        assert_eq!(classify_line("### Fonts").kind, BlockKind::Heading3);
        assert_eq!(classify_line("### Fonts").text, "Fonts");
        // Four hashes fall through to a plain paragraph.
        assert_eq!(classify_line("#### Deep").kind, BlockKind::Paragraph);
    }

    #[test]
    fn fence_marker_is_skipped() {
        assert_eq!(classify_line("```rust").kind, BlockKind::SkippedCodeLine);
        assert_eq!(classify_line("```").kind, BlockKind::SkippedCodeLine);
    }

    #[test]
    fn bold_needs_both_markers() {
        let block = classify_line("**Summary**");
        assert_eq!(block.kind, BlockKind::BoldParagraph);
        assert_eq!(block.text, "<b>Summary</b>");

        // Too short to hold two markers: falls to italic.
        assert_eq!(classify_line("***").kind, BlockKind::ItalicParagraph);
        // Opening marker without closing one.
        assert_eq!(classify_line("**Open").kind, BlockKind::ItalicParagraph);
    }

    #[test]
    fn italic_keeps_text_after_first_star() {
        let block = classify_line("*note*");
        assert_eq!(block.kind, BlockKind::ItalicParagraph);
        assert_eq!(block.text, "<i>note*</i>");
    }

    #[test]
    fn list_item_gets_bullet() {
        let block = classify_line("- first point");
        assert_eq!(block.kind, BlockKind::ListItem);
        assert_eq!(block.text, "\u{2022} first point");
    }

    #[test]
    fn rule_ignores_trailing_characters() {
        for line in ["---", "----------", "---x"] {
            let block = classify_line(line);
            assert_eq!(block.kind, BlockKind::Rule, "line {line:?}");
            assert_eq!(block.text, "_".repeat(RULE_WIDTH_CHARS));
        }
    }

    #[test]
    fn paragraph_is_escaped_once_per_ampersand() {
        let block = classify_line("Tom & Jerry & <friends>");
        assert_eq!(block.kind, BlockKind::Paragraph);
        assert_eq!(block.text, "Tom &amp; Jerry &amp; &lt;friends&gt;");
        assert_eq!(block.text.matches("&amp;").count(), 2);
    }

    #[test]
    fn blank_line() {
        assert_eq!(classify_line("").kind, BlockKind::BlankSpacer);
        let mut c = LineClassifier::default();
        assert_eq!(c.classify("   \t").kind, BlockKind::BlankSpacer);
    }

    #[test]
    fn marker_only_mode_renders_fence_interior() {
        let blocks = classify_document("```\nlet x = 1;\n```", FenceMode::MarkerOnly);
        let kinds: Vec<_> = blocks.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockKind::SkippedCodeLine,
                BlockKind::Paragraph,
                BlockKind::SkippedCodeLine
            ]
        );
    }

    #[test]
    fn toggle_mode_drops_fence_interior() {
        let mut c = LineClassifier::new(FenceMode::Toggle);
        assert_eq!(c.classify("```").kind, BlockKind::SkippedCodeLine);
        assert!(c.in_fence());
        assert_eq!(c.classify("# not a title").kind, BlockKind::SkippedCodeLine);
        assert_eq!(c.classify("```").kind, BlockKind::SkippedCodeLine);
        assert!(!c.in_fence());
        assert_eq!(c.classify("# Title").kind, BlockKind::Title);
    }

    #[test]
    fn trailing_newline_yields_blank() {
        let blocks = classify_document("# T\n", FenceMode::default());
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].kind, BlockKind::BlankSpacer);
    }
}
