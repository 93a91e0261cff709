use dioxus::prelude::*;

#[component]
pub fn RunButton(index: usize, on_run: EventHandler<usize>) -> Element {
    rsx! {
        button {
            class: "run-button",
            onclick: move |_| on_run.call(index),
            "Run"
        }
    }
}
