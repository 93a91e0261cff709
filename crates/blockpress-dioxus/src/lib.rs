//! Desktop display surface for blockpress articles.

pub mod ui;

pub use ui::App;
