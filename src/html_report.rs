//! HTML route: markdown → HTML fragment → styled document → PDF.

use pulldown_cmark::{html, Options, Parser};

use crate::error::ReportError;
use crate::layout_config::LayoutConfig;
use crate::pipeline::{compute_layout_config, PipelineConfig};
use crate::render::render_pdf;

/// Title used in `<title>` and in the running page header.
pub const DEFAULT_TITLE: &str = "Photographer website design analysis";

/// Screen-like presentation embedded in the document's `<style>` element.
/// The `@page` rule carries the running header and the page counter.
pub const DOCUMENT_STYLESHEET: &str = r#"
body {
    font-family: 'Arial', sans-serif;
    line-height: 1.6;
    color: #333;
    max-width: 800px;
    margin: 0 auto;
    padding: 20px;
}

h1, h2, h3 {
    color: #2c3e50;
    border-bottom: 2px solid #eee;
    padding-bottom: 10px;
}

h1 {
    font-size: 2.5em;
    text-align: center;
}

h2 {
    font-size: 1.8em;
    color: #34495e;
}

h3 {
    font-size: 1.4em;
    color: #7f8c8d;
}

code {
    background-color: #f8f9fa;
    padding: 2px 4px;
    border-radius: 3px;
    font-family: 'Courier New', monospace;
}

pre {
    background-color: #f8f9fa;
    padding: 15px;
    border-radius: 5px;
    overflow-x: auto;
}

blockquote {
    border-left: 4px solid #3498db;
    margin: 0;
    padding-left: 20px;
    font-style: italic;
}

.highlight {
    background-color: #fff3cd;
    padding: 10px;
    border-radius: 5px;
    margin: 10px 0;
}

hr {
    border: none;
    height: 2px;
    background: linear-gradient(to right, #3498db, #9b59b6);
    margin: 30px 0;
}

@page {
    size: A4;
    margin: 2cm;
    @top-center {
        content: "Photographer website design analysis";
        font-size: 10pt;
        color: #666;
    }
    @bottom-center {
        content: counter(page);
        font-size: 10pt;
        color: #666;
    }
}
"#;

/// Page geometry and pagination rules applied on top of the document styles.
pub const PRINT_STYLESHEET: &str = r#"
@page {
    size: A4;
    margin: 2cm;
}

body {
    font-size: 11pt;
}

h1 {
    font-size: 24pt;
    page-break-after: avoid;
}

h2 {
    font-size: 18pt;
    page-break-after: avoid;
    margin-top: 20pt;
}

h3 {
    font-size: 14pt;
    page-break-after: avoid;
}

.page-break {
    page-break-before: always;
}
"#;

/// Immutable presentation settings for one report.
#[derive(Debug, Clone)]
pub struct ReportStyle {
    pub title: String,
    pub lang: String,
    pub stylesheet: &'static str,
    pub print_stylesheet: &'static str,
}

impl Default for ReportStyle {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            lang: "en".to_string(),
            stylesheet: DOCUMENT_STYLESHEET,
            print_stylesheet: PRINT_STYLESHEET,
        }
    }
}

impl ReportStyle {
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// PDF bytes plus the frozen layout they were drawn from.
#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub layout: LayoutConfig,
}

impl RenderedPdf {
    pub fn page_count(&self) -> usize {
        self.layout.pages.len()
    }
}

/// Convert markdown to an HTML fragment with tables enabled.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Wrap an HTML fragment in a complete page carrying the embedded styles.
pub fn assemble_document(fragment: &str, style: &ReportStyle) -> String {
    let title = escape_html(&style.title);
    let header = if style.title != DEFAULT_TITLE {
        // The running header repeats the title; swap in the custom one.
        let quoted = css_string_text(&style.title);
        format!(
            "\n<style>@page {{ @top-center {{ content: \"{quoted}\"; font-size: 10pt; color: #666; }} }}</style>"
        )
    } else {
        String::new()
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<style>{stylesheet}</style>{header}
</head>
<body>
{fragment}
</body>
</html>
"#,
        lang = escape_html(&style.lang),
        stylesheet = style.stylesheet,
    )
}

/// Text safe inside a double-quoted `content` string of an inline `<style>`
/// element. The stylesheet parser has no escapes, so characters that could
/// end the string, declaration, block or element are dropped.
fn css_string_text(text: &str) -> String {
    let mut out: String = text
        .chars()
        .filter(|c| !matches!(c, '"' | '\\' | '<' | '>' | '{' | '}' | ';') && !c.is_control())
        .collect();
    // No comment may open inside the string.
    while out.contains("/*") {
        out = out.replace("/*", "/");
    }
    out
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render markdown to PDF with the default A4 pipeline configuration.
pub fn render_report(markdown: &str, style: &ReportStyle) -> Result<RenderedPdf, ReportError> {
    render_report_with(markdown, style, &PipelineConfig::default())
}

/// Render markdown to PDF. The print stylesheet is cascaded after the
/// document's own styles.
pub fn render_report_with(
    markdown: &str,
    style: &ReportStyle,
    config: &PipelineConfig,
) -> Result<RenderedPdf, ReportError> {
    let fragment = markdown_to_html(markdown);
    let document = assemble_document(&fragment, style);
    log::debug!(
        "assembled {} bytes of HTML from {} bytes of markdown",
        document.len(),
        markdown.len()
    );

    let layout = compute_layout_config(&document, config, &[style.print_stylesheet])
        .map_err(ReportError::Layout)?;
    let bytes = render_pdf(&layout).map_err(ReportError::Render)?;
    log::debug!("rendered {} page(s), {} bytes", layout.pages.len(), bytes.len());
    Ok(RenderedPdf { bytes, layout })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_tables_and_fences() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |\n\n```\ncode\n```\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
        assert!(html.contains("<pre><code>code\n</code></pre>"));
    }

    #[test]
    fn document_wraps_fragment() {
        let doc = assemble_document("<p>x</p>", &ReportStyle::default());
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<html lang=\"en\">"));
        assert!(doc.contains(&format!("<title>{DEFAULT_TITLE}</title>")));
        assert!(doc.contains("counter(page)"));
        assert!(doc.contains("<body>\n<p>x</p>\n</body>"));
    }

    #[test]
    fn custom_title_replaces_running_header() {
        let doc = assemble_document("", &ReportStyle::with_title("Q3 <review>"));
        assert!(doc.contains("<title>Q3 &lt;review&gt;</title>"));
        assert!(doc.contains("content: \"Q3 review\""));
    }

    #[test]
    fn title_cannot_break_out_of_the_header_rule() {
        let title = "Q3 </style>{x}; \"a\" /*c*/";
        let style = ReportStyle::with_title(title);
        let doc = assemble_document("<p>Body text.</p>", &style);
        assert!(doc.contains("content: \"Q3 /stylex a /c*/\"; font-size: 10pt"));
        assert_eq!(doc.matches("</style>").count(), 2);
        assert_eq!(css_string_text("a/{*b"), "a/b");

        let pdf = render_report("Body text.\n", &style).unwrap();
        let texts = pdf.layout.text_lines();
        assert!(texts.iter().any(|t| t == "Q3 /stylex a /c*/"), "{texts:?}");
        assert!(texts.iter().any(|t| t == "Body text."));
        assert!(!texts.iter().any(|t| t == DEFAULT_TITLE));
        assert_eq!(pdf.layout.title, title);
    }

    #[test]
    fn strikethrough_stays_literal() {
        let html = markdown_to_html("~~gone~~");
        assert_eq!(html, "<p>~~gone~~</p>\n");
    }

    #[test]
    fn report_has_header_and_page_number() {
        let pdf = render_report("# Report\n\nSome text.\n", &ReportStyle::default()).unwrap();
        assert_eq!(&pdf.bytes[0..5], b"%PDF-");
        assert_eq!(pdf.page_count(), 1);
        let texts = pdf.layout.text_lines();
        assert!(texts.iter().any(|t| t == DEFAULT_TITLE));
        assert!(texts.iter().any(|t| t == "1"));
        assert!(texts.iter().any(|t| t == "Report"));
        assert_eq!(pdf.layout.title, DEFAULT_TITLE);
    }

    #[test]
    fn print_stylesheet_sets_body_size() {
        let pdf = render_report("plain paragraph", &ReportStyle::default()).unwrap();
        let mut sizes = Vec::new();
        pdf.layout.visit_boxes(&mut |b| {
            if let Some(t) = &b.text {
                if t.lines.iter().any(|l| l.text == "plain paragraph") {
                    sizes.push(t.font_size);
                }
            }
        });
        assert_eq!(sizes, vec![11.0]);
    }
}
