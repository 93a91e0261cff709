use blockpress_engine::{Article, RunSurface};
use dioxus::prelude::*;

use super::{ResultPanel, RunButton};

/// The sanitized article, one element per block, with a Run button and
/// result panel under every executable block.
#[component]
pub fn ArticleView(article: Article, surface: Signal<RunSurface>) -> Element {
    let max_width = article.max_width.as_ref().map(|w| format!("max-width: {w}"));

    if article.blocks.is_empty() {
        return rsx! {
            div { class: "block-document", dangerous_inner_html: "{article.html}" }
        };
    }

    rsx! {
        div {
            class: "block-document",
            style: max_width,
            for block in article.blocks.iter() {
                div {
                    key: "{block.index}",
                    class: "block block-{block.kind}",
                    div { dangerous_inner_html: "{block.html}" }
                    if let Some(panel) = surface.read().panel(block.index).cloned() {
                        RunButton {
                            index: panel.index,
                            on_run: move |index: usize| {
                                let mut surface = surface;
                                if let Err(e) = surface.write().trigger(index) {
                                    log::warn!("{e}");
                                }
                            },
                        }
                        if let Some(report) = panel.report() {
                            ResultPanel { index: panel.index, report: report.clone() }
                        }
                    }
                }
            }
        }
    }
}
