pub mod python;
pub mod types;

use anyhow::Result;
use std::path::Path;

pub use types::{DetectIn, DetectOut, PageText, PageTextOut, RawTable};

/// The two external capabilities: a PDF text layer and table geometry detection.
pub trait Engine {
    fn page_text(&self, input: &Path, max_pages: u32) -> Result<PageTextOut>;
    fn detect_tables(&self, req: &DetectIn) -> Result<Vec<RawTable>>;
}
