//! Run panels for executable code blocks.
//!
//! A [`RunSurface`] is owned by whatever displays the article. It holds one
//! [`RunPanel`] per executable block, keyed by block index, and drives each
//! through `Idle → Running → Finished`. Every run evaluates in a fresh
//! sandbox with its own console sink, so panels never see each other's
//! output.

use std::collections::BTreeMap;

use blockpress_script::{ExecutionReport, Limits, evaluate};

use crate::options::RenderOptions;
use crate::render::Article;

/// Snippets containing any of these are run on load when
/// [`RenderOptions::auto_run_markup_snippets`] is set.
const MARKUP_SNIPPET_MARKERS: &[&str] = &["<iframe", "<html", "document.write"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunnerError {
    #[error("block {0} is already running")]
    AlreadyRunning(usize),
    #[error("block {0} has no executable code")]
    NotExecutable(usize),
    #[error("block {0} is not running")]
    NotRunning(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PanelState {
    #[default]
    Idle,
    Running,
    Finished(ExecutionReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPanel {
    pub index: usize,
    pub source: String,
    pub state: PanelState,
}

impl RunPanel {
    pub fn report(&self) -> Option<&ExecutionReport> {
        match &self.state {
            PanelState::Finished(report) => Some(report),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == PanelState::Running
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSurface {
    panels: BTreeMap<usize, RunPanel>,
    limits: Limits,
}

impl RunSurface {
    /// Register the executable blocks of `article`. Without
    /// `allow_execution` the surface stays empty.
    pub fn from_article(article: &Article, options: &RenderOptions) -> Self {
        let mut surface = Self {
            panels: BTreeMap::new(),
            limits: options.limits.clone(),
        };
        if !options.allow_execution {
            return surface;
        }

        for (block, executable) in article.executable_blocks() {
            surface.panels.insert(
                block.index,
                RunPanel {
                    index: block.index,
                    source: executable.source.clone(),
                    state: PanelState::Idle,
                },
            );
        }

        if options.auto_run_markup_snippets {
            let auto: Vec<usize> = surface
                .panels
                .values()
                .filter(|panel| writes_markup(&panel.source))
                .map(|panel| panel.index)
                .collect();
            for index in auto {
                log::info!("auto-running markup snippet in block {index}");
                if let Err(err) = surface.trigger(index) {
                    log::warn!("auto-run failed: {err}");
                }
            }
        }

        log::debug!("run surface with {} panels", surface.panels.len());
        surface
    }

    /// Run block `index` to completion and return its report.
    ///
    /// Any previous report for the block is discarded first.
    pub fn trigger(&mut self, index: usize) -> Result<&ExecutionReport, RunnerError> {
        let source = self.begin(index)?;
        let report = evaluate(&source, &self.limits);
        self.complete(index, report)
    }

    /// Move block `index` to `Running` and hand out its source.
    pub(crate) fn begin(&mut self, index: usize) -> Result<String, RunnerError> {
        let panel = self
            .panels
            .get_mut(&index)
            .ok_or(RunnerError::NotExecutable(index))?;
        if panel.is_running() {
            return Err(RunnerError::AlreadyRunning(index));
        }
        panel.state = PanelState::Running;
        Ok(panel.source.clone())
    }

    /// Store the report of a run started with [`begin`](Self::begin).
    pub(crate) fn complete(
        &mut self,
        index: usize,
        report: ExecutionReport,
    ) -> Result<&ExecutionReport, RunnerError> {
        let panel = self
            .panels
            .get_mut(&index)
            .ok_or(RunnerError::NotExecutable(index))?;
        if !panel.is_running() {
            return Err(RunnerError::NotRunning(index));
        }
        panel.state = PanelState::Finished(report);
        match &panel.state {
            PanelState::Finished(report) => Ok(report),
            _ => Err(RunnerError::NotRunning(index)),
        }
    }

    pub fn panel(&self, index: usize) -> Option<&RunPanel> {
        self.panels.get(&index)
    }

    /// Panels in block order.
    pub fn panels(&self) -> impl Iterator<Item = &RunPanel> {
        self.panels.values()
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }
}

fn writes_markup(source: &str) -> bool {
    MARKUP_SNIPPET_MARKERS
        .iter()
        .any(|marker| source.contains(marker))
}

/// Result markup for the panel of block `index`.
pub fn render_panel(index: usize, report: &ExecutionReport) -> String {
    let mut out = format!(r#"<div class="code-result" data-block="{index}">"#);
    for entry in &report.entries {
        out.push_str(&format!(
            r#"<div class="log-entry log-{}">{}</div>"#,
            entry.level,
            html_escape::encode_text(&entry.message)
        ));
    }
    if let Some(value) = &report.value {
        out.push_str(&format!(
            r#"<div class="result-value">{}</div>"#,
            html_escape::encode_text(value)
        ));
    }
    out.push_str("</div>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, BlockDocument};
    use crate::render::render_article;
    use blockpress_script::{Level, LogEntry, Outcome};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn code(source: &str) -> Block {
        Block::from_value(json!({"type": "code", "data": {"code": source, "language": "javascript"}}))
    }

    fn surface(blocks: Vec<Block>, options: &RenderOptions) -> RunSurface {
        let article = render_article(Some(&BlockDocument::new(blocks)), options);
        RunSurface::from_article(&article, options)
    }

    fn allowed() -> RenderOptions {
        RenderOptions::default().with_execution()
    }

    #[test]
    fn panels_follow_executable_blocks() {
        let python = Block::from_value(
            json!({"type": "code", "data": {"code": "print(1)", "language": "python"}}),
        );
        let surface = surface(vec![code("1"), python, code("2")], &allowed());
        assert_eq!(
            surface.panels().map(|p| p.index).collect::<Vec<_>>(),
            vec![0, 2]
        );
        assert!(surface.panels().all(|p| p.state == PanelState::Idle));
    }

    #[test]
    fn no_panels_without_permission() {
        let surface = surface(vec![code("1")], &RenderOptions::default());
        assert!(surface.is_empty());
    }

    #[test]
    fn trigger_records_a_report() {
        let mut surface = surface(vec![code("console.log('hi'); 42")], &allowed());
        let report = surface.trigger(0).expect("runs");
        assert_eq!(report.entries, vec![LogEntry::new(Level::Log, "hi")]);
        assert_eq!(report.value.as_deref(), Some("42"));
        let panel = surface.panel(0).expect("panel");
        assert!(panel.report().is_some());
        assert!(!panel.is_running());
    }

    #[test]
    fn retrigger_replaces_the_report() {
        let mut surface = surface(
            vec![code("var n = (typeof n === 'undefined') ? 1 : n + 1; console.log(n)")],
            &allowed(),
        );
        surface.trigger(0).expect("first run");
        let second = surface.trigger(0).expect("second run");
        assert_eq!(second.entries, vec![LogEntry::new(Level::Log, "1")]);
    }

    #[test]
    fn running_blocks_reject_triggers() {
        let mut surface = surface(vec![code("1")], &allowed());
        assert_eq!(surface.begin(0), Ok("1".to_string()));
        assert_eq!(surface.trigger(0), Err(RunnerError::AlreadyRunning(0)));

        let report = evaluate("2", surface.limits());
        let stored = surface.complete(0, report).expect("completes");
        assert_eq!(stored.value.as_deref(), Some("2"));
        assert_eq!(
            surface.complete(0, evaluate("3", &Limits::default())),
            Err(RunnerError::NotRunning(0))
        );
    }

    #[test]
    fn unknown_index_is_not_executable() {
        let mut surface = surface(vec![code("1")], &allowed());
        assert_eq!(surface.trigger(5), Err(RunnerError::NotExecutable(5)));
    }

    #[test]
    fn failures_stay_inside_the_panel() {
        let mut surface = surface(vec![code("throw new Error('boom')")], &allowed());
        let report = surface.trigger(0).expect("trigger itself succeeds");
        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(
            report.failure().map(|e| e.message.as_str()),
            Some("Error: boom")
        );
    }

    #[test]
    fn markup_snippets_auto_run_only_when_enabled() {
        let blocks = || {
            vec![
                code("console.log('<iframe src=x>')"),
                code("console.log('plain')"),
            ]
        };
        let off = surface(blocks(), &allowed());
        assert!(off.panels().all(|p| p.state == PanelState::Idle));

        let mut options = allowed();
        options.auto_run_markup_snippets = true;
        let on = surface(blocks(), &options);
        assert!(on.panel(0).and_then(RunPanel::report).is_some());
        assert_eq!(on.panel(1).map(|p| &p.state), Some(&PanelState::Idle));
    }

    #[test]
    fn panel_markup_escapes_everything() {
        let report = evaluate(
            "console.warn('<b>careful</b>'); '<i>'",
            &Limits::default(),
        );
        insta::assert_snapshot!(render_panel(3, &report), @r#"<div class="code-result" data-block="3"><div class="log-entry log-warn">&lt;b&gt;careful&lt;/b&gt;</div><div class="result-value">"&lt;i&gt;"</div></div>"#);
    }
}
