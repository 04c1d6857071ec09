//! # md-report-pdf – markdown report → PDF
//!
//! Two independent routes render the same markdown report:
//!
//! **HTML route** ([`html_report`]): markdown → HTML fragment → styled
//! document, then the in-crate HTML/CSS engine:
//!
//! 1. **Parse** – HTML string → DOM tree ([`dom`])
//! 2. **Style** – cascade stylesheets into computed styles ([`css`], [`style`])
//! 3. **Layout** – compute flexbox layout with Taffy ([`layout`])
//! 4. **Paginate** – split into pages, add running headers ([`pagination`])
//! 5. **Render** – emit PDF bytes via printpdf ([`render`])
//!
//! **Direct route** ([`classify`], [`story`], [`doc_template`]): each line is
//! classified, turned into paragraphs and spacers, and flowed into a fixed
//! frame.
//!
//! Both routes produce a serialisable [`layout_config::LayoutConfig`] and
//! share the renderer, the font metrics and the conversion driver
//! ([`convert`]).

pub mod classify;
pub mod cli;
pub mod convert;
pub mod css;
pub mod doc_template;
pub mod dom;
pub mod error;
pub mod fonts;
pub mod html_report;
pub mod layout;
pub mod layout_config;
pub mod markup;
pub mod pagination;
pub mod pipeline;
pub mod render;
pub mod story;
pub mod style;
pub mod typeset;

// Re-exports for convenience
pub use classify::{classify_line, Block, BlockKind, FenceMode};
pub use convert::{ConversionAttempt, ConversionOutcome, ReportPaths};
pub use doc_template::DocTemplate;
pub use error::ReportError;
pub use html_report::{render_report, ReportStyle};
pub use pipeline::{generate_pdf, PageOrientation, PipelineConfig};
pub use story::{build_story, Flowable};
