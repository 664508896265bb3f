//! Result presentation: terminal text, Markdown, JSON and CSV export.

pub mod export;
pub mod generator;

pub use export::{default_export_path, export_csv};
pub use generator::*;
