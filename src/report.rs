use crate::{billing::BillingPeriod, params::Flavor};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// The single document written to stdout per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub source_pdf: String,
    pub full_path: String,
    pub billing_period_start: Option<String>,
    pub billing_period_end: Option<String>,
    pub tables: Vec<DetectedTable>,
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn new(input: &Path) -> Self {
        Self {
            source_pdf: input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            full_path: input.display().to_string(),
            billing_period_start: None,
            billing_period_end: None,
            tables: Vec::new(),
            error: None,
        }
    }

    pub fn set_billing_period(&mut self, period: Option<&BillingPeriod>) {
        self.billing_period_start = period.map(|p| p.start_iso());
        self.billing_period_end = period.map(|p| p.end_iso());
    }

    /// First error wins.
    pub fn record_error(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        if self.error.is_some() {
            debug!("error already recorded; not overwriting with: {msg}");
            return;
        }
        self.error = Some(msg);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedTable {
    pub index: usize,
    pub page: PageId,
    pub accuracy: Option<f64>,
    pub whitespace: Option<f64>,
    pub flavor: Flavor,
    /// Row 0 holds the column labels.
    pub data: Vec<Vec<String>>,
}

/// Page identifier exactly as the detector reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageId {
    Number(u64),
    Text(String),
}

impl From<&serde_json::Value> for PageId {
    fn from(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Number(n) => match n.as_u64() {
                Some(n) => PageId::Number(n),
                None => PageId::Text(n.to_string()),
            },
            other => PageId::Text(cell_text(other)),
        }
    }
}

/// Text form of a detector cell. Strings pass through, null becomes empty,
/// everything else uses its JSON rendering.
pub fn cell_text(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Emitted instead of an ExtractionResult when the run fails outside the
/// extraction attempt itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FatalReport {
    pub error: String,
    pub tables: Vec<DetectedTable>,
}

impl FatalReport {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            tables: Vec::new(),
        }
    }
}
