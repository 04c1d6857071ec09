//! Font metrics and text measurement using `ttf-parser`.
//!
//! The PDF renderer only draws the three builtin PDF families, so measurement
//! defaults to per-family average advances. A real TTF can be loaded for a
//! family to get exact glyph advances.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::markup::Run;

/// The builtin PDF font families the renderer can draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BuiltinFamily {
    #[default]
    Helvetica,
    Times,
    Courier,
}

impl BuiltinFamily {
    /// Resolve a CSS `font-family` list to the first family we can draw.
    /// Unknown names are skipped; an empty match falls back to Helvetica.
    pub fn from_css(list: &str) -> Self {
        for name in list.split(',') {
            let name = name.trim().trim_matches(|c| c == '\'' || c == '"');
            match name.to_ascii_lowercase().as_str() {
                "arial" | "helvetica" | "sans-serif" | "liberation sans" | "verdana" => {
                    return BuiltinFamily::Helvetica
                }
                "times" | "times new roman" | "serif" | "georgia" => return BuiltinFamily::Times,
                "courier" | "courier new" | "monospace" | "consolas" | "menlo" => {
                    return BuiltinFamily::Courier
                }
                _ => {}
            }
        }
        BuiltinFamily::Helvetica
    }

    /// Name stored in the layout config and matched by the renderer.
    pub fn name(self) -> &'static str {
        match self {
            BuiltinFamily::Helvetica => "Helvetica",
            BuiltinFamily::Times => "Times",
            BuiltinFamily::Courier => "Courier",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "Times" => BuiltinFamily::Times,
            "Courier" => BuiltinFamily::Courier,
            _ => BuiltinFamily::Helvetica,
        }
    }

    /// Average advance as a fraction of the font size.
    fn average_advance(self, bold: bool) -> f32 {
        match (self, bold) {
            (BuiltinFamily::Courier, _) => 0.6,
            (BuiltinFamily::Helvetica, false) => 0.5,
            (BuiltinFamily::Helvetica, true) => 0.55,
            (BuiltinFamily::Times, false) => 0.45,
            (BuiltinFamily::Times, true) => 0.5,
        }
    }
}

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
    pub line_gap: f32,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: BuiltinFamily,
    pub bold: bool,
    pub italic: bool,
}

/// Font configuration for a conversion: which families have real metrics.
#[derive(Clone, Default)]
pub struct FontManager {
    fonts: HashMap<FontKey, FontData>,
}

impl FontManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TTF/OTF font from bytes and use its advances for `family`.
    pub fn load_font(
        &mut self,
        family: BuiltinFamily,
        bold: bool,
        italic: bool,
        bytes: Vec<u8>,
    ) -> Result<(), String> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| format!("Failed to parse font: {e}"))?;

        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            line_gap: face.line_gap() as f32,
            bytes,
        };
        log::debug!(
            "loaded metrics for {} (bold={bold}, italic={italic}, upem={})",
            family.name(),
            data.units_per_em
        );
        self.fonts.insert(
            FontKey {
                family,
                bold,
                italic,
            },
            data,
        );
        Ok(())
    }

    fn get(&self, key: &FontKey) -> Option<&FontData> {
        self.fonts.get(key).or_else(|| {
            // Fall back to the regular face of the same family.
            self.fonts.get(&FontKey {
                family: key.family,
                bold: false,
                italic: false,
            })
        })
    }

    pub fn has_real_metrics(&self, family: BuiltinFamily) -> bool {
        self.fonts.keys().any(|k| k.family == family)
    }

    /// Measure the width of a string at a given font size (in pt).
    /// With real font bytes we sum glyph advances; otherwise we use the
    /// family's average character width.
    pub fn measure_text_width(
        &self,
        text: &str,
        font_size: f32,
        bold: bool,
        italic: bool,
        family: BuiltinFamily,
    ) -> f32 {
        let key = FontKey {
            family,
            bold,
            italic,
        };
        let heuristic = |t: &str| t.chars().count() as f32 * font_size * family.average_advance(bold);

        let Some(data) = self.get(&key) else {
            return heuristic(text);
        };

        match ttf_parser::Face::parse(&data.bytes, 0) {
            Ok(face) => {
                let scale = font_size / data.units_per_em;
                text.chars()
                    .map(|ch| match face.glyph_index(ch) {
                        Some(gid) => face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                        None => font_size * 0.5,
                    })
                    .sum()
            }
            Err(_) => heuristic(text),
        }
    }

    /// Measure the line height in pt.
    pub fn line_height_px(&self, font_size: f32, line_height_factor: f32) -> f32 {
        font_size * line_height_factor
    }
}

/// Wrap preformatted text, keeping interior whitespace: each source line is
/// only broken where it overflows, at the last space before the overflow.
pub fn wrap_preformatted(
    text: &str,
    font_size: f32,
    family: BuiltinFamily,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    let mut lines = Vec::new();
    for source in text.trim_end_matches('\n').split('\n') {
        let mut rest = source.trim_end().to_string();
        loop {
            let width = fonts.measure_text_width(&rest, font_size, false, false, family);
            if width <= max_width || rest.chars().count() <= 1 {
                lines.push(rest);
                break;
            }
            let fit = fit_chars(&rest, font_size, family, max_width, fonts).max(1);
            let head: String = rest.chars().take(fit).collect();
            let cut = match head.rfind(' ') {
                Some(i) if i > 0 => i + 1,
                _ => head.len(),
            };
            lines.push(rest[..cut].trim_end().to_string());
            rest = rest[cut..].to_string();
        }
    }
    lines
}

fn fit_chars(
    text: &str,
    font_size: f32,
    family: BuiltinFamily,
    max_width: f32,
    fonts: &FontManager,
) -> usize {
    let mut width = 0.0;
    for (count, ch) in text.chars().enumerate() {
        let mut buf = [0u8; 4];
        width += fonts.measure_text_width(ch.encode_utf8(&mut buf), font_size, false, false, family);
        if width > max_width {
            return count;
        }
    }
    text.chars().count()
}

/// A piece of a wrapped line with uniform emphasis.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub monospace: bool,
    pub width: f32,
}

impl Fragment {
    /// Family this fragment is drawn with, given the paragraph's family.
    pub fn family(&self, base: BuiltinFamily) -> BuiltinFamily {
        if self.monospace {
            BuiltinFamily::Courier
        } else {
            base
        }
    }

    fn same_style(&self, run: &Run) -> bool {
        self.bold == run.bold
            && self.italic == run.italic
            && self.underline == run.underline
            && self.monospace == run.monospace
    }
}

/// A wrapped line of styled fragments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyledLine {
    pub fragments: Vec<Fragment>,
    pub width: f32,
    /// True for the last line of a paragraph or a line ended by `<br/>`.
    pub ends_paragraph: bool,
}

impl StyledLine {
    /// A single unstyled fragment, used for preformatted text.
    pub fn plain(text: String, width: f32) -> Self {
        Self {
            fragments: vec![Fragment {
                text,
                bold: false,
                italic: false,
                underline: false,
                monospace: false,
                width,
            }],
            width,
            ends_paragraph: true,
        }
    }

    pub fn text(&self) -> String {
        self.fragments.iter().map(|f| f.text.as_str()).collect()
    }
}

/// Word-wrap emphasis runs to fit within `max_width`.
pub fn wrap_runs(
    runs: &[Run],
    font_size: f32,
    family: BuiltinFamily,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<StyledLine> {
    let mut lines: Vec<StyledLine> = Vec::new();
    let mut line = StyledLine::default();
    let mut pending_space = false;

    for run in runs {
        if run.is_line_break() {
            line.ends_paragraph = true;
            lines.push(std::mem::take(&mut line));
            pending_space = false;
            continue;
        }
        let run_family = if run.monospace {
            BuiltinFamily::Courier
        } else {
            family
        };
        let measure =
            |t: &str| fonts.measure_text_width(t, font_size, run.bold, run.italic, run_family);

        for (i, word) in run.text.split(' ').enumerate() {
            if i > 0 {
                pending_space = true;
            }
            if word.is_empty() {
                continue;
            }
            let space = if pending_space && !line.fragments.is_empty() {
                measure(" ")
            } else {
                0.0
            };
            let word_w = measure(word);

            if line.width + space + word_w > max_width && !line.fragments.is_empty() {
                lines.push(std::mem::take(&mut line));
                push_fragment(&mut line, run, word, word_w, false);
            } else {
                push_fragment(&mut line, run, word, word_w + space, space > 0.0);
            }
            pending_space = false;
        }
    }

    if !line.fragments.is_empty() || lines.is_empty() {
        lines.push(line);
    }
    if let Some(last) = lines.last_mut() {
        last.ends_paragraph = true;
    }
    lines
}

fn push_fragment(line: &mut StyledLine, run: &Run, word: &str, width: f32, leading_space: bool) {
    let text = if leading_space {
        format!(" {word}")
    } else {
        word.to_string()
    };
    line.width += width;
    match line.fragments.last_mut() {
        Some(last) if last.same_style(run) => {
            last.text.push_str(&text);
            last.width += width;
        }
        _ => line.fragments.push(Fragment {
            text,
            bold: run.bold,
            italic: run.italic,
            underline: run.underline,
            monospace: run.monospace,
            width,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_markup;

    #[test]
    fn heuristic_text_width() {
        let mgr = FontManager::default();
        let w = mgr.measure_text_width("Hello", 16.0, false, false, BuiltinFamily::Helvetica);
        // 5 chars × 16 × 0.5 = 40
        assert!((w - 40.0).abs() < 0.1);
        let mono = mgr.measure_text_width("Hello", 10.0, true, false, BuiltinFamily::Courier);
        assert!((mono - 30.0).abs() < 0.1);
    }

    #[test]
    fn css_family_resolution() {
        assert_eq!(
            BuiltinFamily::from_css("'Arial', sans-serif"),
            BuiltinFamily::Helvetica
        );
        assert_eq!(
            BuiltinFamily::from_css("'Courier New', monospace"),
            BuiltinFamily::Courier
        );
        assert_eq!(BuiltinFamily::from_css("Georgia"), BuiltinFamily::Times);
        assert_eq!(BuiltinFamily::from_css("Comic Sans"), BuiltinFamily::Helvetica);
    }

    #[test]
    fn garbage_font_is_rejected() {
        let mut mgr = FontManager::new();
        assert!(mgr
            .load_font(BuiltinFamily::Helvetica, false, false, vec![0, 1, 2, 3])
            .is_err());
        assert!(!mgr.has_real_metrics(BuiltinFamily::Helvetica));
    }

    #[test]
    fn preformatted_keeps_indentation() {
        let mgr = FontManager::default();
        let lines = wrap_preformatted("fn main() {\n    run();\n}\n", 10.0, BuiltinFamily::Courier, 500.0, &mgr);
        assert_eq!(lines, vec!["fn main() {", "    run();", "}"]);
    }

    #[test]
    fn runs_wrap_and_keep_emphasis() {
        let mgr = FontManager::default();
        let runs = parse_markup("plain <b>bold words here</b> end").unwrap();
        // 10pt Helvetica: 5pt per regular char, so ~12 chars per line.
        let lines = wrap_runs(&runs, 10.0, BuiltinFamily::Helvetica, 60.0, &mgr);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.width <= 60.0 || l.fragments.len() == 1));
        assert!(lines.iter().flat_map(|l| &l.fragments).any(|f| f.bold));
        assert!(lines.last().unwrap().ends_paragraph);
        let joined: String = lines.iter().map(StyledLine::text).collect::<Vec<_>>().join(" ");
        assert_eq!(joined, "plain bold words here end");
    }
}
