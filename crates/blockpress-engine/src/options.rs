use blockpress_script::Limits;

/// Caller-supplied switches for [`render_article`](crate::render_article)
/// and the run surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Instrument executable code blocks with run panels.
    pub allow_execution: bool,
    /// CSS length for the article container, e.g. `"720px"`.
    pub max_width: Option<String>,
    /// Run snippets that write markup (`<iframe`, `<html`, `document.write`)
    /// as soon as the surface is built.
    pub auto_run_markup_snippets: bool,
    /// Add syntax-highlighting spans to code blocks.
    pub highlight: bool,
    pub limits: Limits,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            allow_execution: false,
            max_width: None,
            auto_run_markup_snippets: false,
            highlight: true,
            limits: Limits::default(),
        }
    }
}

impl RenderOptions {
    pub fn with_execution(mut self) -> Self {
        self.allow_execution = true;
        self
    }

    pub fn with_max_width(mut self, max_width: impl Into<String>) -> Self {
        self.max_width = Some(max_width.into());
        self
    }
}
