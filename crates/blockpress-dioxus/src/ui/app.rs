use blockpress_engine::{Article, RenderOptions, RunSurface};
use dioxus::prelude::*;

const ARTICLE_CSS: &str = include_str!("../assets/article.css");

/// Root view: the rendered article plus the run surface it owns.
#[component]
pub fn App(article: Article, options: RenderOptions) -> Element {
    let surface = use_signal({
        let article = article.clone();
        move || RunSurface::from_article(&article, &options)
    });

    rsx! {
        style { {ARTICLE_CSS} }
        div {
            class: "app-container",
            super::components::ArticleView { article, surface }
        }
    }
}
