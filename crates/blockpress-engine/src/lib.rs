//! # blockpress-engine
//!
//! Renders block documents into safe article markup.
//!
//! The pipeline is convert ([`render`]) → sanitize ([`sanitize`]) →
//! highlight ([`highlight`]), with [`runner`] adding run panels for
//! executable code blocks when the caller allows it.
//!
//! ```
//! use blockpress_engine::{BlockDocument, RenderOptions, render_article};
//!
//! let document = BlockDocument::from_json_str(
//!     r#"{"blocks": [{"type": "paragraph", "data": {"text": "Hi<script>x()</script>"}}]}"#,
//! )?;
//! let article = render_article(Some(&document), &RenderOptions::default());
//! assert_eq!(article.html, "<p>Hi</p>");
//! # Ok::<(), blockpress_engine::DocumentError>(())
//! ```

pub mod highlight;
pub mod model;
pub mod options;
pub mod render;
pub mod runner;
pub mod sanitize;

pub use blockpress_script::{ExecutionReport, Level, Limits, LogEntry, MAX_CALL_DEPTH, Outcome};
pub use model::{Block, BlockDocument, BlockKind, DocumentError};
pub use options::RenderOptions;
pub use render::{
    Article, ExecutableSource, NO_CONTENT_PLACEHOLDER, RenderedBlock, render_article,
    render_article_json, render_blocks, render_markup,
};
pub use runner::{PanelState, RunPanel, RunSurface, RunnerError, render_panel};
pub use sanitize::sanitize;
