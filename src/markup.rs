//! Paragraph markup – the small tag language carried by flow paragraphs.
//!
//! Supported: `<b>`, `<i>`, `<u>`, `<code>` (nestable), `<br/>`, and the entities
//! `&amp; &lt; &gt; &quot; &apos; &#NN; &#xNN;`. An `&` that does not start one
//! of those entities is literal text. Any other tag is rejected so that
//! malformed input surfaces as a build error instead of garbled output.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("unknown tag <{tag}> at byte {pos}")]
    UnknownTag { tag: String, pos: usize },
    #[error("closing tag </{tag}> at byte {pos} does not match any open tag")]
    UnexpectedClose { tag: String, pos: usize },
    #[error("tag <{0}> is never closed")]
    Unclosed(String),
    #[error("unterminated tag starting at byte {0}")]
    UnterminatedTag(usize),
}

/// A span of text with uniform emphasis. A run whose text is `"\n"` is a
/// forced line break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub monospace: bool,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
            underline: false,
            monospace: false,
        }
    }

    pub fn line_break() -> Self {
        Self::plain("\n")
    }

    pub fn is_line_break(&self) -> bool {
        self.text == "\n"
    }

    /// True when both runs draw with the same font and decoration.
    pub fn same_style(&self, other: &Run) -> bool {
        self.bold == other.bold
            && self.italic == other.italic
            && self.underline == other.underline
            && self.monospace == other.monospace
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emphasis {
    Bold,
    Italic,
    Underline,
    Monospace,
}

impl Emphasis {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "b" | "strong" => Some(Emphasis::Bold),
            "i" | "em" => Some(Emphasis::Italic),
            "u" => Some(Emphasis::Underline),
            "code" | "tt" => Some(Emphasis::Monospace),
            _ => None,
        }
    }
}

/// Parse markup into emphasis runs. Adjacent text with identical emphasis is
/// merged into one run.
pub fn parse_markup(input: &str) -> Result<Vec<Run>, MarkupError> {
    let mut runs: Vec<Run> = Vec::new();
    let mut stack: Vec<(Emphasis, String)> = Vec::new();
    let mut text = String::new();
    let mut pos = 0usize;

    while pos < input.len() {
        let rest = &input[pos..];
        if rest.starts_with('<') {
            flush(&mut runs, &mut text, &stack);
            let end = rest.find('>').ok_or(MarkupError::UnterminatedTag(pos))?;
            let inner = rest[1..end].trim();
            let tag_pos = pos;
            pos += end + 1;

            if let Some(name) = inner.strip_prefix('/') {
                let name = name.trim().to_ascii_lowercase();
                let emphasis = Emphasis::from_tag(&name).ok_or_else(|| MarkupError::UnknownTag {
                    tag: name.clone(),
                    pos: tag_pos,
                })?;
                match stack.last() {
                    Some((open, _)) if *open == emphasis => {
                        stack.pop();
                    }
                    _ => {
                        return Err(MarkupError::UnexpectedClose {
                            tag: name,
                            pos: tag_pos,
                        })
                    }
                }
                continue;
            }

            let self_closing = inner.ends_with('/');
            let name = inner
                .trim_end_matches('/')
                .split_whitespace()
                .next()
                .unwrap_or("")
                .to_ascii_lowercase();
            if name == "br" {
                runs.push(Run::line_break());
                continue;
            }
            let emphasis = Emphasis::from_tag(&name).ok_or_else(|| MarkupError::UnknownTag {
                tag: name.clone(),
                pos: tag_pos,
            })?;
            if !self_closing {
                stack.push((emphasis, name));
            }
        } else if rest.starts_with('&') {
            match decode_entity(rest) {
                Some((ch, consumed)) => {
                    text.push(ch);
                    pos += consumed;
                }
                None => {
                    text.push('&');
                    pos += 1;
                }
            }
        } else {
            // Advance to the next significant character.
            let next = rest.find(['<', '&']).unwrap_or(rest.len());
            text.push_str(&rest[..next]);
            pos += next;
        }
    }

    flush(&mut runs, &mut text, &stack);
    if let Some((_, name)) = stack.pop() {
        return Err(MarkupError::Unclosed(name));
    }
    Ok(runs)
}

fn flush(runs: &mut Vec<Run>, text: &mut String, stack: &[(Emphasis, String)]) {
    if text.is_empty() {
        return;
    }
    let active = |wanted: Emphasis| stack.iter().any(|(e, _)| *e == wanted);
    let run = Run {
        text: std::mem::take(text),
        bold: active(Emphasis::Bold),
        italic: active(Emphasis::Italic),
        underline: active(Emphasis::Underline),
        monospace: active(Emphasis::Monospace),
    };
    push_run(runs, run);
}

/// Append `run`, merging it into the previous run when the styles match.
pub fn push_run(runs: &mut Vec<Run>, run: Run) {
    if run.text.is_empty() {
        return;
    }
    match runs.last_mut() {
        Some(last) if !last.is_line_break() && !run.is_line_break() && last.same_style(&run) => {
            last.text.push_str(&run.text);
        }
        _ => runs.push(run),
    }
}

/// Decode the entity at the start of `s`; returns the character and the
/// number of bytes consumed, or `None` when `s` does not start with one.
fn decode_entity(s: &str) -> Option<(char, usize)> {
    let end = s
        .char_indices()
        .take(12)
        .find(|&(_, c)| c == ';')
        .map(|(i, _)| i)?;
    let name = &s[1..end];
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" | "#39" => '\'',
        "nbsp" => '\u{00A0}',
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or(name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok()
            } else {
                None
            };
            code.and_then(char::from_u32)?
        }
    };
    Some((ch, end + 1))
}

/// Plain text of a run list, with line breaks as `\n`.
pub fn plain_text(runs: &[Run]) -> String {
    runs.iter().map(|r| r.text.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_one_run() {
        let runs = parse_markup("Hello world").unwrap();
        assert_eq!(runs.len(), 1);
        assert!(!runs[0].bold);
        assert_eq!(runs[0].text, "Hello world");
    }

    #[test]
    fn emphasis_runs() {
        let runs = parse_markup("a <b>bold <i>both</i></b> tail").unwrap();
        let shape: Vec<_> = runs
            .iter()
            .map(|r| (r.text.as_str(), r.bold, r.italic))
            .collect();
        assert_eq!(
            shape,
            vec![
                ("a ", false, false),
                ("bold ", true, false),
                ("both", true, true),
                (" tail", false, false),
            ]
        );
    }

    #[test]
    fn entities_decode() {
        let runs = parse_markup("Tom &amp; Jerry &lt;3 &#8364;").unwrap();
        assert_eq!(plain_text(&runs), "Tom & Jerry <3 \u{20AC}");
    }

    #[test]
    fn unknown_tag_is_error() {
        let err = parse_markup("x < y and <z>").unwrap_err();
        assert!(matches!(err, MarkupError::UnknownTag { .. }), "{err:?}");
    }

    #[test]
    fn unbalanced_tags_are_errors() {
        assert_eq!(
            parse_markup("<b>open").unwrap_err(),
            MarkupError::Unclosed("b".to_string())
        );
        assert!(matches!(
            parse_markup("<b>x</i>").unwrap_err(),
            MarkupError::UnexpectedClose { .. }
        ));
        assert!(matches!(
            parse_markup("broken <b").unwrap_err(),
            MarkupError::UnterminatedTag(7)
        ));
    }

    #[test]
    fn bare_ampersand_is_literal() {
        for (input, expected) in [
            ("R & D", "R & D"),
            ("Q&A", "Q&A"),
            ("AT&T;", "AT&T;"),
            ("&bogus; &#xZZ;", "&bogus; &#xZZ;"),
            ("trailing &", "trailing &"),
            ("&amp;&", "&&"),
        ] {
            assert_eq!(plain_text(&parse_markup(input).unwrap()), expected, "{input}");
        }
    }

    #[test]
    fn ampersand_inside_emphasis() {
        let runs = parse_markup("<b>R&D</b> and <i>Tom & Jerry</i>").unwrap();
        let shape: Vec<_> = runs
            .iter()
            .map(|r| (r.text.as_str(), r.bold, r.italic))
            .collect();
        assert_eq!(
            shape,
            vec![("R&D", true, false), (" and ", false, false), ("Tom & Jerry", false, true)]
        );
    }

    #[test]
    fn code_is_monospace() {
        let runs = parse_markup("run <code>cargo doc</code> now").unwrap();
        assert_eq!(runs.len(), 3);
        assert!(runs[1].monospace);
        assert!(!runs[2].monospace);
    }

    #[test]
    fn line_break() {
        let runs = parse_markup("one<br/>two").unwrap();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[1].text, "\n");
    }
}
