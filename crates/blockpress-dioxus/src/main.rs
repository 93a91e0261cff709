use blockpress_config::Config;
use blockpress_dioxus::ui::{App, components::ErrorScreen};
use blockpress_engine::{Article, BlockDocument, RenderOptions, render_article};
use dioxus::prelude::*;
use std::env;
use std::path::PathBuf;
use std::process;

/// What the window shows, decided before launch.
#[derive(Clone)]
enum Startup {
    Ready {
        article: Article,
        options: RenderOptions,
    },
    Failed {
        title: String,
        message: String,
        details: Option<String>,
    },
}

fn load_options() -> Result<RenderOptions, Startup> {
    match Config::load() {
        Ok(Some(config)) => {
            log::info!("Loaded config from {}", Config::config_path().display());
            Ok(config.render_options())
        }
        Ok(None) => {
            log::info!("No config file found, using defaults");
            Ok(RenderOptions::default())
        }
        Err(e) => Err(Startup::Failed {
            title: "Config Error".to_string(),
            message: "Failed to load configuration".to_string(),
            details: Some(e.to_string()),
        }),
    }
}

fn startup(document_path: PathBuf) -> Startup {
    let options = match load_options() {
        Ok(options) => options,
        Err(failed) => return failed,
    };

    let document_path = Config::expand_path(&document_path).unwrap_or(document_path);
    let json = match std::fs::read_to_string(&document_path) {
        Ok(json) => json,
        Err(e) => {
            return Startup::Failed {
                title: "Document Error".to_string(),
                message: "Failed to read the article".to_string(),
                details: Some(format!("{}: {e}", document_path.display())),
            };
        }
    };

    let document = match BlockDocument::from_json_str(&json) {
        Ok(document) => Some(document),
        Err(e) => {
            log::warn!("{}: {e}", document_path.display());
            None
        }
    };
    let article = render_article(document.as_ref(), &options);
    log::info!(
        "Rendered {} with {} blocks",
        document_path.display(),
        article.blocks.len()
    );
    Startup::Ready { article, options }
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("blockpress starting up!");

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        let program_name = args
            .first()
            .cloned()
            .unwrap_or_else(|| "blockpress-dioxus".to_string());
        eprintln!("Usage: {program_name} <document.json>");
        process::exit(1);
    }

    let state = startup(PathBuf::from(&args[1]));

    dioxus::LaunchBuilder::desktop()
        .with_cfg(make_window_config())
        .with_context(state)
        .launch(app_root);
}

fn app_root() -> Element {
    match use_context::<Startup>() {
        Startup::Ready { article, options } => rsx! {
            App { article, options }
        },
        Startup::Failed {
            title,
            message,
            details,
        } => rsx! {
            ErrorScreen { title, message, details }
        },
    }
}

fn make_window_config() -> dioxus::desktop::Config {
    use dioxus::desktop::{Config, WindowBuilder};

    let window = WindowBuilder::new()
        .with_title("blockpress")
        .with_always_on_top(false);

    Config::default().with_window(window)
}
