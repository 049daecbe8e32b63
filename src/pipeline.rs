use crate::{
    billing,
    config::Config,
    detect::{self, DetectParams},
    engine::Engine,
    report::ExtractionResult,
    util::truncate_lines,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct ExtractRequest {
    pub pdf_path: PathBuf,
    pub detect: DetectParams,
}

/// Drives the billing-period scan and table detection once each and folds
/// both into one [`ExtractionResult`].
pub struct Extractor<E: Engine> {
    cfg: Config,
    engine: E,
}

impl<E: Engine> Extractor<E> {
    pub fn new(cfg: &Config, engine: E) -> Self {
        Self {
            cfg: cfg.clone(),
            engine,
        }
    }

    /// Never fails: every error is converted into the result's `error` field.
    pub fn run(&self, req: &ExtractRequest) -> ExtractionResult {
        let started = Instant::now();
        let mut result = ExtractionResult::new(&req.pdf_path);

        if let Err(err) = self.populate(&mut result, req) {
            record_unexpected(&mut result, &err, self.cfg.errors.trace_max_lines);
        }

        info!(
            "done in {:?}: tables={} period={:?}..{:?} error={}",
            started.elapsed(),
            result.tables.len(),
            result.billing_period_start,
            result.billing_period_end,
            result.error.is_some()
        );
        result
    }

    fn populate(&self, result: &mut ExtractionResult, req: &ExtractRequest) -> Result<()> {
        let input = req.pdf_path.as_path();

        if let Some(msg) = input_problem(&self.cfg, input)? {
            error!("{msg}");
            result.record_error(msg);
            return Ok(());
        }

        match billing::find_billing_period(&self.engine, input, self.cfg.billing.max_pages) {
            Ok(period) => result.set_billing_period(period.as_ref()),
            Err(err) => {
                warn!("billing period ignored: {err:#}");
                result.set_billing_period(None);
            }
        }

        let detection = detect::detect_tables(&self.engine, input, &req.detect);
        if detection.fell_back {
            info!("tables come from the stream fallback");
        }
        result.tables = detection.tables;
        if let Some(err) = detection.error {
            result.record_error(err);
        }

        Ok(())
    }
}

/// Checks the input without any engine. `Some` carries the finished result
/// for an input that must not reach detection (missing, URL, unreadable
/// path); `None` means extraction should go ahead.
pub fn screen_input(cfg: &Config, req: &ExtractRequest) -> Option<ExtractionResult> {
    let mut result = ExtractionResult::new(&req.pdf_path);
    match input_problem(cfg, &req.pdf_path) {
        Ok(None) => return None,
        Ok(Some(msg)) => {
            error!("{msg}");
            result.record_error(msg);
        }
        Err(err) => record_unexpected(&mut result, &err, cfg.errors.trace_max_lines),
    }
    Some(result)
}

/// Input errors short-circuit the run. `Err` only when the filesystem
/// cannot answer the question at all.
fn input_problem(cfg: &Config, input: &Path) -> Result<Option<String>> {
    let input_str = input.display().to_string();
    if cfg.security.reject_url_inputs && looks_like_url(&input_str) {
        return Ok(Some(format!("URL inputs are disabled: {input_str}")));
    }
    let exists = input
        .try_exists()
        .with_context(|| format!("checking input path: {input_str}"))?;
    if !exists {
        return Ok(Some(format!("input PDF not found: {input_str}")));
    }
    if !input.extension().is_some_and(|e| e.eq_ignore_ascii_case("pdf")) {
        warn!("input has no .pdf extension; trying anyway: {input_str}");
    }
    Ok(None)
}

fn record_unexpected(result: &mut ExtractionResult, err: &anyhow::Error, max_lines: usize) {
    let trace = format!("{err:?}");
    error!("unexpected error: {trace}");
    result.record_error(unexpected_error_message(err, max_lines));
}

/// `unexpected error: <chain>` followed by the first `max_lines` lines of the
/// full error rendering.
fn unexpected_error_message(err: &anyhow::Error, max_lines: usize) -> String {
    format!(
        "unexpected error: {err:#}\n{}",
        truncate_lines(&format!("{err:?}"), max_lines)
    )
}

fn looks_like_url(s: &str) -> bool {
    let s = s.to_ascii_lowercase();
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://")
}
