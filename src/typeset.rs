//! Typesetting – places wrapped [`StyledLine`]s inside a layout box.
//!
//! A [`TextContent`] carries a single font, so lines whose fragments all
//! share one font become text lines of the box itself. Mixed-emphasis lines
//! become one child box per fragment, and justified lines one child box per
//! word.

use crate::fonts::{BuiltinFamily, FontManager, Fragment, StyledLine};
use crate::layout_config::{LayoutBox, TextContent, TextLine};
use crate::style::{ComputedStyle, TextAlign};

/// Paragraph-level text attributes.
#[derive(Debug, Clone)]
pub struct TextStyle {
    pub family: BuiltinFamily,
    pub font_size: f32,
    /// Line advance in points.
    pub line_height: f32,
    pub color: [f32; 4],
    pub align: TextAlign,
}

impl TextStyle {
    pub fn from_computed(style: &ComputedStyle, fonts: &FontManager) -> Self {
        Self {
            family: style.font_family,
            font_size: style.font_size,
            line_height: fonts.line_height_px(style.font_size, style.line_height),
            color: style.color.to_array(),
            align: style.text_align,
        }
    }

    fn content(&self, lines: Vec<TextLine>, fragment: Option<&Fragment>) -> TextContent {
        let (bold, italic, underline, family) = match fragment {
            Some(f) => (f.bold, f.italic, f.underline, f.family(self.family)),
            None => (false, false, false, self.family),
        };
        TextContent {
            lines,
            font_family: family.name().to_string(),
            font_size: self.font_size,
            bold,
            italic,
            color: self.color,
            line_height: self.line_height,
            text_align: self.align.as_str().to_string(),
            underline,
            list_marker: None,
        }
    }

    /// Text content with no lines, used to carry a list marker.
    pub fn empty_content(&self) -> TextContent {
        self.content(Vec::new(), None)
    }
}

/// Place `lines` in `target`, starting at `inset` (x, y) from the box's
/// top-left corner and aligned within `width`.
pub fn place_lines(
    target: &mut LayoutBox,
    lines: &[StyledLine],
    style: &TextStyle,
    inset: (f32, f32),
    width: f32,
    fonts: &FontManager,
) {
    let (dx, dy) = inset;
    let justify = style.align == TextAlign::Justify;
    let spread = |line: &StyledLine| justify && !line.ends_paragraph && gap_count(line) > 0;

    if !lines.iter().any(spread) {
        if let Some(fragment) = uniform_font(lines) {
            let text_lines = lines
                .iter()
                .enumerate()
                .map(|(i, line)| TextLine {
                    text: line.text(),
                    x_offset: dx + align_offset(line, style.align, width),
                    y_offset: dy + i as f32 * style.line_height,
                    width: line.width,
                })
                .collect();
            target.text = Some(style.content(text_lines, fragment));
            return;
        }
    }

    for (i, line) in lines.iter().enumerate() {
        let top = target.y + dy + i as f32 * style.line_height;
        let mut x = target.x + dx + align_offset(line, style.align, width);
        if spread(line) {
            let extra = ((width - line.width) / gap_count(line) as f32).max(0.0);
            place_words(target, line, style, x, top, extra, fonts);
            continue;
        }
        for fragment in &line.fragments {
            let child = fragment_box(style, fragment, &fragment.text, x, top, fragment.width);
            target.children.push(child);
            x += fragment.width;
        }
    }
}

/// `Some(None)` when there is no text at all, `Some(Some(f))` when every
/// fragment uses the same font as `f`, `None` when fonts are mixed.
fn uniform_font(lines: &[StyledLine]) -> Option<Option<&Fragment>> {
    let mut fragments = lines.iter().flat_map(|l| &l.fragments);
    let Some(first) = fragments.next() else {
        return Some(None);
    };
    fragments
        .all(|f| {
            f.bold == first.bold
                && f.italic == first.italic
                && f.underline == first.underline
                && f.monospace == first.monospace
        })
        .then_some(Some(first))
}

fn align_offset(line: &StyledLine, align: TextAlign, width: f32) -> f32 {
    let slack = (width - line.width).max(0.0);
    match align {
        TextAlign::Left | TextAlign::Justify => 0.0,
        TextAlign::Center => slack / 2.0,
        TextAlign::Right => slack,
    }
}

/// Number of inter-word spaces on a line.
fn gap_count(line: &StyledLine) -> usize {
    line.fragments
        .iter()
        .map(|f| f.text.split(' ').count() - 1)
        .sum()
}

fn place_words(
    target: &mut LayoutBox,
    line: &StyledLine,
    style: &TextStyle,
    mut x: f32,
    top: f32,
    extra: f32,
    fonts: &FontManager,
) {
    for fragment in &line.fragments {
        let family = fragment.family(style.family);
        let measure = |t: &str| {
            fonts.measure_text_width(t, style.font_size, fragment.bold, fragment.italic, family)
        };
        let space = measure(" ");
        for (i, word) in fragment.text.split(' ').enumerate() {
            if i > 0 {
                x += space + extra;
            }
            if word.is_empty() {
                continue;
            }
            let w = measure(word);
            target.children.push(fragment_box(style, fragment, word, x, top, w));
            x += w;
        }
    }
}

fn fragment_box(
    style: &TextStyle,
    fragment: &Fragment,
    text: &str,
    x: f32,
    top: f32,
    width: f32,
) -> LayoutBox {
    let mut lbox = LayoutBox::new(x, top, width, style.line_height);
    let line = TextLine {
        text: text.to_string(),
        x_offset: 0.0,
        y_offset: 0.0,
        width,
    };
    lbox.text = Some(style.content(vec![line], Some(fragment)));
    lbox
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::wrap_runs;
    use crate::markup::parse_markup;

    fn style(align: TextAlign) -> TextStyle {
        TextStyle {
            family: BuiltinFamily::Helvetica,
            font_size: 10.0,
            line_height: 12.0,
            color: [0.0, 0.0, 0.0, 1.0],
            align,
        }
    }

    fn lines(markup: &str, width: f32) -> Vec<StyledLine> {
        let runs = parse_markup(markup).unwrap();
        wrap_runs(&runs, 10.0, BuiltinFamily::Helvetica, width, &FontManager::default())
    }

    #[test]
    fn uniform_text_stays_on_the_box() {
        let mut lbox = LayoutBox::new(72.0, 100.0, 200.0, 24.0);
        let fonts = FontManager::default();
        place_lines(&mut lbox, &lines("Title", 200.0), &style(TextAlign::Center), (0.0, 0.0), 200.0, &fonts);
        let text = lbox.text.unwrap();
        assert_eq!(text.lines.len(), 1);
        // "Title" is 25pt wide at 10pt Helvetica.
        assert!((text.lines[0].x_offset - 87.5).abs() < 0.01);
        assert!(lbox.children.is_empty());
    }

    #[test]
    fn mixed_emphasis_becomes_fragments() {
        let mut lbox = LayoutBox::new(0.0, 0.0, 300.0, 12.0);
        let fonts = FontManager::default();
        place_lines(&mut lbox, &lines("a <b>b</b> c", 300.0), &style(TextAlign::Left), (0.0, 0.0), 300.0, &fonts);
        assert!(lbox.text.is_none());
        assert_eq!(lbox.children.len(), 3);
        assert!(lbox.children[1].text.as_ref().unwrap().bold);
        assert!(lbox.children[1].x > lbox.children[0].x);
    }

    #[test]
    fn justified_lines_fill_the_width() {
        let mut lbox = LayoutBox::new(0.0, 0.0, 60.0, 36.0);
        let fonts = FontManager::default();
        let wrapped = lines("aa bb cc dd ee ff", 60.0);
        assert!(wrapped.len() > 1);
        place_lines(&mut lbox, &wrapped, &style(TextAlign::Justify), (0.0, 0.0), 60.0, &fonts);
        let first_line: Vec<&LayoutBox> = lbox.children.iter().filter(|c| c.y == 0.0).collect();
        let last = first_line.last().unwrap();
        assert!((last.x + last.width - 60.0).abs() < 0.01);
    }
}
