//! Story assembly for the direct-layout route: classified lines become an
//! ordered list of flowables.

use serde::{Deserialize, Serialize};

use crate::classify::{Block, BlockKind, FenceMode, LineClassifier};

/// Vertical gap after a blank line.
pub const BLANK_SPACER: f32 = 6.0;
/// Vertical gap after the document title.
pub const TITLE_SPACER: f32 = 12.0;
/// Vertical gap on each side of a horizontal rule.
pub const RULE_SPACER: f32 = 20.0;

/// Paragraph style a flowable is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleName {
    Title,
    Heading,
    Subheading,
    Normal,
}

/// One element of the story handed to the document builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Flowable {
    Paragraph { markup: String, style: StyleName },
    Spacer { height: f32 },
}

impl Flowable {
    pub fn paragraph(markup: impl Into<String>, style: StyleName) -> Self {
        Flowable::Paragraph {
            markup: markup.into(),
            style,
        }
    }

    pub fn spacer(height: f32) -> Self {
        Flowable::Spacer { height }
    }
}

/// Appends flowables for each line of a document, in input order.
#[derive(Debug, Default)]
pub struct StoryBuilder {
    classifier: LineClassifier,
    story: Vec<Flowable>,
}

impl StoryBuilder {
    pub fn new(mode: FenceMode) -> Self {
        Self {
            classifier: LineClassifier::new(mode),
            story: Vec::new(),
        }
    }

    /// Classify one raw line and append its flowables.
    pub fn push_line(&mut self, raw: &str) {
        let block = self.classifier.classify(raw);
        self.push_block(block);
    }

    pub fn push_block(&mut self, block: Block) {
        let Block { kind, text } = block;
        match kind {
            BlockKind::BlankSpacer => self.story.push(Flowable::spacer(BLANK_SPACER)),
            BlockKind::Title => {
                self.story.push(Flowable::paragraph(text, StyleName::Title));
                self.story.push(Flowable::spacer(TITLE_SPACER));
            }
            BlockKind::Heading2 => self.story.push(Flowable::paragraph(text, StyleName::Heading)),
            BlockKind::Heading3 => self
                .story
                .push(Flowable::paragraph(text, StyleName::Subheading)),
            BlockKind::SkippedCodeLine => {}
            BlockKind::Paragraph
            | BlockKind::BoldParagraph
            | BlockKind::ItalicParagraph
            | BlockKind::ListItem => self.story.push(Flowable::paragraph(text, StyleName::Normal)),
            BlockKind::Rule => {
                self.story.push(Flowable::spacer(RULE_SPACER));
                self.story.push(Flowable::paragraph(text, StyleName::Normal));
                self.story.push(Flowable::spacer(RULE_SPACER));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.story.len()
    }

    pub fn is_empty(&self) -> bool {
        self.story.is_empty()
    }

    pub fn finish(self) -> Vec<Flowable> {
        self.story
    }
}

/// Build the story for a whole document. Lines are split on `\n`.
pub fn build_story(content: &str, mode: FenceMode) -> Vec<Flowable> {
    let mut builder = StoryBuilder::new(mode);
    for line in content.split('\n') {
        builder.push_line(line);
    }
    log::debug!("story holds {} flowables", builder.len());
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_then_body() {
        let story = build_story("# Title\nBody text", FenceMode::MarkerOnly);
        assert_eq!(
            story,
            vec![
                Flowable::paragraph("Title", StyleName::Title),
                Flowable::spacer(TITLE_SPACER),
                Flowable::paragraph("Body text", StyleName::Normal),
            ]
        );
    }

    #[test]
    fn blank_line_is_only_a_spacer() {
        let story = build_story("   ", FenceMode::MarkerOnly);
        assert_eq!(story, vec![Flowable::spacer(BLANK_SPACER)]);
    }

    #[test]
    fn rule_is_surrounded_by_spacers() {
        let story = build_story("-----", FenceMode::MarkerOnly);
        assert_eq!(story.len(), 3);
        assert_eq!(story[0], Flowable::spacer(RULE_SPACER));
        assert_eq!(
            story[1],
            Flowable::paragraph("_".repeat(50), StyleName::Normal)
        );
        assert_eq!(story[2], Flowable::spacer(RULE_SPACER));
    }

    #[test]
    fn heading_levels_pick_styles() {
        let story = build_story("## A\n### B", FenceMode::MarkerOnly);
        assert_eq!(
            story,
            vec![
                Flowable::paragraph("A", StyleName::Heading),
                Flowable::paragraph("B", StyleName::Subheading),
            ]
        );
    }

    #[test]
    fn fence_interior_kept_by_default() {
        let content = "```\nlet x = a < b;\n```";
        let story = build_story(content, FenceMode::MarkerOnly);
        assert_eq!(
            story,
            vec![Flowable::paragraph("let x = a &lt; b;", StyleName::Normal)]
        );

        let skipped = build_story(content, FenceMode::Toggle);
        assert!(skipped.is_empty());
    }
}
