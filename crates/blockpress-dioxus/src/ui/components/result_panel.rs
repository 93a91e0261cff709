use blockpress_engine::ExecutionReport;
use dioxus::prelude::*;

/// Output of the latest run of block `index`. Text is rendered as text, so
/// nothing a script prints can become markup.
#[component]
pub fn ResultPanel(index: usize, report: ExecutionReport) -> Element {
    rsx! {
        div {
            class: "code-result",
            "data-block": "{index}",
            for (i, entry) in report.entries.iter().enumerate() {
                div {
                    key: "{i}",
                    class: "log-entry log-{entry.level}",
                    "{entry.message}"
                }
            }
            if let Some(value) = &report.value {
                div { class: "result-value", "{value}" }
            }
        }
    }
}
