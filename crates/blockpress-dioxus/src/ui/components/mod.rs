mod article_view;
mod error_screen;
mod result_panel;
mod run_button;

pub use article_view::ArticleView;
pub use error_screen::ErrorScreen;
pub use result_panel::ResultPanel;
pub use run_button::RunButton;
