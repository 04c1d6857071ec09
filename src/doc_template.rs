//! Direct-layout document builder: flows a story of paragraphs and spacers
//! into a fixed frame, page after page.

use crate::css::Color;
use crate::error::ReportError;
use crate::fonts::{wrap_runs, BuiltinFamily, FontManager, StyledLine};
use crate::layout_config::{LayoutBox, LayoutConfig, PageGeometry, PageLayout};
use crate::markup::parse_markup;
use crate::render::render_pdf;
use crate::story::{Flowable, StyleName};
use crate::style::TextAlign;
use crate::typeset::{place_lines, TextStyle};

/// Margin on every side of the frame, in points.
pub const FRAME_MARGIN_PT: f32 = 72.0;

/// How a paragraph is drawn.
#[derive(Debug, Clone)]
pub struct ParagraphStyle {
    pub family: BuiltinFamily,
    pub font_size: f32,
    /// Baseline-to-baseline distance in points.
    pub leading: f32,
    pub bold: bool,
    pub color: Color,
    pub align: TextAlign,
    pub space_before: f32,
    pub space_after: f32,
}

impl ParagraphStyle {
    fn body() -> Self {
        Self {
            family: BuiltinFamily::Helvetica,
            font_size: 10.0,
            leading: 12.0,
            bold: false,
            color: Color::BLACK,
            align: TextAlign::Left,
            space_before: 0.0,
            space_after: 0.0,
        }
    }

    fn text_style(&self) -> TextStyle {
        TextStyle {
            family: self.family,
            font_size: self.font_size,
            line_height: self.leading,
            color: self.color.to_array(),
            align: self.align,
        }
    }
}

/// The four paragraph styles a story refers to.
#[derive(Debug, Clone)]
pub struct StyleSet {
    pub title: ParagraphStyle,
    pub heading: ParagraphStyle,
    pub subheading: ParagraphStyle,
    pub normal: ParagraphStyle,
}

impl Default for StyleSet {
    fn default() -> Self {
        let dark_blue = Color::rgb(0.0, 0.0, 0.545);
        let dark_green = Color::rgb(0.0, 0.392, 0.0);
        Self {
            title: ParagraphStyle {
                font_size: 20.0,
                leading: 22.0,
                bold: true,
                color: dark_blue,
                align: TextAlign::Center,
                space_after: 30.0,
                ..ParagraphStyle::body()
            },
            heading: ParagraphStyle {
                font_size: 16.0,
                leading: 24.0,
                bold: true,
                color: dark_blue,
                space_before: 12.0,
                space_after: 12.0,
                ..ParagraphStyle::body()
            },
            subheading: ParagraphStyle {
                font_size: 14.0,
                leading: 18.0,
                bold: true,
                color: dark_green,
                space_before: 8.0,
                space_after: 8.0,
                ..ParagraphStyle::body()
            },
            normal: ParagraphStyle {
                font_size: 11.0,
                align: TextAlign::Justify,
                space_after: 6.0,
                ..ParagraphStyle::body()
            },
        }
    }
}

impl StyleSet {
    pub fn get(&self, name: StyleName) -> &ParagraphStyle {
        match name {
            StyleName::Title => &self.title,
            StyleName::Heading => &self.heading,
            StyleName::Subheading => &self.subheading,
            StyleName::Normal => &self.normal,
        }
    }
}

/// Page template with a single frame inset by fixed margins.
#[derive(Clone)]
pub struct DocTemplate {
    pub title: String,
    pub geometry: PageGeometry,
    pub styles: StyleSet,
    pub fonts: FontManager,
}

impl Default for DocTemplate {
    fn default() -> Self {
        Self {
            title: "untitled".to_string(),
            geometry: PageGeometry::a4(FRAME_MARGIN_PT),
            styles: StyleSet::default(),
            fonts: FontManager::default(),
        }
    }
}

impl DocTemplate {
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Lay the story out into pages. Fails on the first paragraph whose
    /// markup does not parse.
    pub fn build(&self, story: &[Flowable]) -> Result<LayoutConfig, ReportError> {
        let mut frame = Frame::new(&self.geometry);
        for flowable in story {
            match flowable {
                Flowable::Spacer { height } => frame.add_space(*height),
                Flowable::Paragraph { markup, style } => {
                    let style = self.styles.get(*style);
                    let mut runs = parse_markup(markup)?;
                    if style.bold {
                        runs.iter_mut().for_each(|r| r.bold = true);
                    }
                    let lines = wrap_runs(
                        &runs,
                        style.font_size,
                        style.family,
                        frame.width(),
                        &self.fonts,
                    );
                    frame.add_paragraph(&lines, style, &self.fonts);
                }
            }
        }

        let mut config = LayoutConfig::for_page(&self.geometry);
        config.title = self.title.clone();
        config.pages = frame.finish();
        log::debug!(
            "laid out {} flowables on {} page(s)",
            story.len(),
            config.pages.len()
        );
        Ok(config)
    }

    /// Lay the story out and render it.
    pub fn build_pdf(&self, story: &[Flowable]) -> Result<(Vec<u8>, LayoutConfig), ReportError> {
        let config = self.build(story)?;
        let bytes = render_pdf(&config).map_err(ReportError::Render)?;
        Ok((bytes, config))
    }
}

/// Cursor over the frame of the current page.
struct Frame {
    geometry: PageGeometry,
    pages: Vec<PageLayout>,
    boxes: Vec<LayoutBox>,
    /// Distance already consumed from the top of the frame.
    used: f32,
    /// Nothing drawn or skipped on this page yet.
    at_top: bool,
}

impl Frame {
    fn new(geometry: &PageGeometry) -> Self {
        Self {
            geometry: *geometry,
            pages: Vec::new(),
            boxes: Vec::new(),
            used: 0.0,
            at_top: true,
        }
    }

    fn width(&self) -> f32 {
        self.geometry.content_width()
    }

    fn remaining(&self) -> f32 {
        self.geometry.content_height() - self.used
    }

    fn new_page(&mut self) {
        self.pages.push(PageLayout {
            page_index: self.pages.len(),
            boxes: std::mem::take(&mut self.boxes),
        });
        self.used = 0.0;
        self.at_top = true;
    }

    /// A spacer that does not fit ends the page and is discarded.
    fn add_space(&mut self, height: f32) {
        if height > self.remaining() {
            self.new_page();
            return;
        }
        self.used += height;
        self.at_top = false;
    }

    fn add_paragraph(&mut self, lines: &[StyledLine], style: &ParagraphStyle, fonts: &FontManager) {
        if lines.is_empty() {
            return;
        }
        let mut rest = lines;
        let mut space_before = style.space_before;
        loop {
            if self.at_top {
                space_before = 0.0;
            }
            let room = self.remaining() - space_before;
            let fit = ((room / style.leading).floor().max(0.0) as usize).min(rest.len());
            if fit == 0 && !self.at_top {
                self.new_page();
                continue;
            }
            // A line taller than an empty frame is drawn anyway.
            let fit = fit.max(1);
            self.used += space_before;
            self.place(&rest[..fit], style, fonts);
            rest = &rest[fit..];
            if rest.is_empty() {
                self.used = (self.used + style.space_after).min(self.geometry.content_height());
                return;
            }
            self.new_page();
        }
    }

    fn place(&mut self, lines: &[StyledLine], style: &ParagraphStyle, fonts: &FontManager) {
        let height = lines.len() as f32 * style.leading;
        let x = self.geometry.margin[3];
        let y = self.geometry.margin[0] + self.used;
        let width = self.width();
        let mut lbox = LayoutBox::new(x, y, width, height);
        place_lines(&mut lbox, lines, &style.text_style(), (0.0, 0.0), width, fonts);
        self.boxes.push(lbox);
        self.used += height;
        self.at_top = false;
    }

    fn finish(mut self) -> Vec<PageLayout> {
        if !self.boxes.is_empty() || self.pages.is_empty() {
            self.new_page();
        }
        self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FenceMode;
    use crate::story::build_story;

    fn boxes_on(config: &LayoutConfig, page: usize) -> &[LayoutBox] {
        &config.pages[page].boxes
    }

    #[test]
    fn title_is_centered_and_dark_blue() {
        let config = DocTemplate::default()
            .build(&build_story("# Title\nBody text", FenceMode::MarkerOnly))
            .unwrap();
        assert_eq!(config.pages.len(), 1);
        let boxes = boxes_on(&config, 0);
        assert_eq!(boxes.len(), 2);

        let title = boxes[0].text.as_ref().unwrap();
        assert_eq!(title.font_size, 20.0);
        assert!(title.bold);
        assert_eq!(title.text_align, "center");
        assert!(title.lines[0].x_offset > 0.0);
        assert!((title.color[2] - 0.545).abs() < 1e-3);

        // Title at the frame top, then 22pt leading + 30pt space-after + 12pt spacer.
        assert_eq!(boxes[0].y, 72.0);
        assert!((boxes[1].y - (72.0 + 22.0 + 30.0 + 12.0)).abs() < 1e-3);
    }

    #[test]
    fn space_before_dropped_at_frame_top() {
        let config = DocTemplate::default()
            .build(&[Flowable::paragraph("Heading", StyleName::Heading)])
            .unwrap();
        assert_eq!(boxes_on(&config, 0)[0].y, 72.0);

        let config = DocTemplate::default()
            .build(&[
                Flowable::paragraph("a", StyleName::Normal),
                Flowable::paragraph("Heading", StyleName::Heading),
            ])
            .unwrap();
        // 12pt leading + 6pt space-after + 12pt space-before.
        assert!((boxes_on(&config, 0)[1].y - (72.0 + 12.0 + 6.0 + 12.0)).abs() < 1e-3);
    }

    #[test]
    fn overflow_starts_new_page() {
        let story: Vec<Flowable> = (0..60)
            .map(|i| Flowable::paragraph(format!("line {i}"), StyleName::Normal))
            .collect();
        let config = DocTemplate::default().build(&story).unwrap();
        // 18pt per paragraph in a 697.89pt frame; the 39th line still fits
        // without its space-after.
        assert_eq!(config.pages.len(), 2);
        assert_eq!(boxes_on(&config, 0).len(), 39);
        assert_eq!(boxes_on(&config, 1)[0].y, 72.0);
    }

    #[test]
    fn long_paragraph_splits_across_pages() {
        let text = "word ".repeat(4000);
        let config = DocTemplate::default()
            .build(&[Flowable::paragraph(text.trim(), StyleName::Normal)])
            .unwrap();
        assert!(config.pages.len() > 1);
        let first = &boxes_on(&config, 0)[0];
        assert!(first.y + first.height <= 841.89 - 72.0 + 1e-3);
    }

    #[test]
    fn bad_markup_fails_the_build() {
        let err = DocTemplate::default()
            .build(&[Flowable::paragraph("<i>unclosed", StyleName::Normal)])
            .unwrap_err();
        assert!(matches!(err, ReportError::Markup(_)));
    }

    #[test]
    fn ampersands_in_unescaped_lines_are_literal() {
        let config = DocTemplate::default()
            .build(&build_story("# Q&A\n- R & D\n**R&D**\n*Tom & Jerry*", FenceMode::MarkerOnly))
            .unwrap();
        assert_eq!(
            config.text_lines(),
            vec!["Q&A", "\u{2022} R & D", "R&D", "Tom & Jerry*"]
        );
    }

    #[test]
    fn empty_story_has_one_blank_page() {
        let config = DocTemplate::default().build(&[]).unwrap();
        assert_eq!(config.pages.len(), 1);
        assert!(config.pages[0].boxes.is_empty());
    }
}
