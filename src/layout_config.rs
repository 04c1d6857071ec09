//! Layout config – the intermediate representation between layout computation
//! and PDF rendering. Both the HTML route and the direct-layout route freeze
//! their output into this structure, which encodes exactly what goes on each
//! page.

use serde::{Deserialize, Serialize};

/// A4: 210mm × 297mm = 595.28 × 841.89 points
pub const A4_WIDTH_PT: f32 = 595.28;
pub const A4_HEIGHT_PT: f32 = 841.89;

/// Page size and margins in points. Margins are top, right, bottom, left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: [f32; 4],
}

impl PageGeometry {
    pub fn a4(margin: f32) -> Self {
        Self {
            width: A4_WIDTH_PT,
            height: A4_HEIGHT_PT,
            margin: [margin; 4],
        }
    }

    pub fn content_width(&self) -> f32 {
        self.width - self.margin[1] - self.margin[3]
    }

    pub fn content_height(&self) -> f32 {
        self.height - self.margin[0] - self.margin[2]
    }

    /// Swap width and height; margins stay on their edges.
    pub fn rotated(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
            margin: self.margin,
        }
    }
}

/// A complete document layout ready for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Document title embedded in the PDF metadata.
    #[serde(default = "LayoutConfig::default_title")]
    pub title: String,
    /// Width of each page in PDF points (1 pt = 1/72 inch).
    pub page_width_pt: f32,
    /// Height of each page in PDF points.
    pub page_height_pt: f32,
    /// Ordered list of pages.
    pub pages: Vec<PageLayout>,
}

/// One page of content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    pub boxes: Vec<LayoutBox>,
}

/// A positioned rectangle with optional content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutBox {
    /// Position relative to page top-left, in points.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    /// Visual styling
    pub background_color: Option<[f32; 4]>,
    pub border: Option<BorderStyle>,
    /// Single-edge rules (heading underlines, blockquote bars).
    #[serde(default)]
    pub rules: Vec<EdgeRule>,

    /// Content (mutually exclusive in practice)
    pub text: Option<TextContent>,
    pub image: Option<ImageContent>,

    /// Children (nested boxes)
    pub children: Vec<LayoutBox>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderStyle {
    pub width: f32,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRule {
    pub edge: Edge,
    pub width: f32,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    /// Pre-wrapped lines of text.
    pub lines: Vec<TextLine>,
    /// Builtin family name: "Helvetica", "Times" or "Courier".
    pub font_family: String,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: [f32; 4],
    pub line_height: f32,
    pub text_align: String,
    pub underline: bool,
    /// List bullet/number prefix (e.g. "• " or "1. ")
    pub list_marker: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    /// X offset within the layout box (for alignment)
    pub x_offset: f32,
    /// Y offset from the top of the text content area
    pub y_offset: f32,
    /// Measured width of the line; 0 when unknown.
    #[serde(default)]
    pub width: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageContent {
    pub src: String,
    pub width: f32,
    pub height: f32,
}

impl LayoutConfig {
    /// Create an empty A4 layout config.
    pub fn a4() -> Self {
        Self {
            title: Self::default_title(),
            page_width_pt: A4_WIDTH_PT,
            page_height_pt: A4_HEIGHT_PT,
            pages: Vec::new(),
        }
    }

    /// Create an empty layout config for the given page size.
    pub fn for_page(geometry: &PageGeometry) -> Self {
        Self {
            page_width_pt: geometry.width,
            page_height_pt: geometry.height,
            ..Self::a4()
        }
    }

    fn default_title() -> String {
        "md-report output".to_string()
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Visit every box on every page, depth first.
    pub fn visit_boxes(&self, f: &mut dyn FnMut(&LayoutBox)) {
        fn walk(lbox: &LayoutBox, f: &mut dyn FnMut(&LayoutBox)) {
            f(lbox);
            for child in &lbox.children {
                walk(child, f);
            }
        }
        for page in &self.pages {
            for lbox in &page.boxes {
                walk(lbox, f);
            }
        }
    }

    /// All text lines of the document in drawing order, one string per line.
    pub fn text_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.visit_boxes(&mut |b| {
            if let Some(text) = &b.text {
                out.extend(text.lines.iter().map(|l| l.text.clone()));
            }
        });
        out
    }
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            background_color: None,
            border: None,
            rules: Vec::new(),
            text: None,
            image: None,
            children: Vec::new(),
        }
    }
}
