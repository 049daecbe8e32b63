use crate::params::Flavor;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageTextIn {
    pub input_pdf: String,
    pub max_pages: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageTextOut {
    pub page_count: u32,
    #[serde(default)]
    pub pages: Vec<PageText>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Text layer of one page; `error` is set when that page alone failed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageText {
    pub page: u32,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectIn {
    pub input_pdf: String,
    pub flavor: Flavor,
    pub pages: String,
    #[serde(default)]
    pub table_areas: Vec<String>,
    #[serde(default)]
    pub row_tol: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectOut {
    pub ok: bool,
    #[serde(default)]
    pub tables: Vec<RawTable>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub traceback: Option<String>,
}

/// A table as reported by the geometry engine. Cells are left as raw JSON
/// values; text coercion happens on our side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTable {
    pub page: serde_json::Value,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub whitespace: Option<f64>,
    #[serde(default)]
    pub header: Vec<serde_json::Value>,
    #[serde(default)]
    pub rows: Vec<Vec<serde_json::Value>>,
}
