//! Table detection with a single stream retry after a clean empty lattice pass.

use crate::{
    engine::{DetectIn, Engine, RawTable},
    params::{parse_row_tol, Flavor, PageSelector, TableArea},
    report::{cell_text, DetectedTable, PageId},
};
use anyhow::Result;
use std::path::Path;
use tracing::{error, info, warn};

/// What the caller asked detection to do.
#[derive(Debug, Clone, Default)]
pub struct DetectParams {
    pub flavor: Flavor,
    pub pages: PageSelector,
    pub table_areas: Vec<TableArea>,
    /// Raw `--row-tol` value; validated here, never fatal.
    pub row_tol: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TableDetection {
    pub tables: Vec<DetectedTable>,
    pub error: Option<String>,
    /// Set when the stream retry ran.
    pub fell_back: bool,
}

/// Scope and options of one detection pass.
#[derive(Debug, Clone)]
pub struct PassOptions<'a> {
    pub pages: &'a PageSelector,
    pub table_areas: &'a [TableArea],
    pub row_tol: Option<i32>,
}

/// Runs one pass with `flavor` and tags every table it returns with it.
pub fn detect_pass(
    engine: &dyn Engine,
    input: &Path,
    flavor: Flavor,
    opts: &PassOptions<'_>,
) -> Result<Vec<DetectedTable>> {
    let req = DetectIn {
        input_pdf: input.display().to_string(),
        flavor,
        pages: opts.pages.to_string(),
        table_areas: opts.table_areas.iter().map(|a| a.to_string()).collect(),
        row_tol: opts.row_tol,
    };
    info!(
        "detecting tables flavor={flavor} pages={} areas={} row_tol={:?}",
        req.pages,
        req.table_areas.len(),
        req.row_tol
    );
    let raw = engine.detect_tables(&req)?;
    info!("{flavor} pass found {} table(s)", raw.len());
    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(index, t)| to_detected(index, flavor, t))
        .collect())
}

fn to_detected(index: usize, flavor: Flavor, raw: RawTable) -> DetectedTable {
    let header: Vec<String> = raw.header.iter().map(cell_text).collect();
    let mut data = Vec::with_capacity(raw.rows.len() + 1);
    data.push(header);
    data.extend(
        raw.rows
            .iter()
            .map(|row| row.iter().map(cell_text).collect::<Vec<_>>()),
    );
    DetectedTable {
        index,
        page: PageId::from(&raw.page),
        accuracy: raw.accuracy,
        whitespace: raw.whitespace,
        flavor,
        data,
    }
}

/// Primary pass with the requested flavor; a lattice pass that succeeds with
/// zero tables is retried once as stream over the same pages and areas.
/// Errors never trigger the retry and never escape: they land in
/// [`TableDetection::error`].
pub fn detect_tables(engine: &dyn Engine, input: &Path, params: &DetectParams) -> TableDetection {
    let mut out = TableDetection::default();

    let row_tol = parse_row_tol(params.row_tol.as_deref());
    if row_tol.is_some() && params.flavor == Flavor::Lattice {
        warn!("row_tol only applies to stream; ignored for the lattice pass");
    }

    let primary = PassOptions {
        pages: &params.pages,
        table_areas: &params.table_areas,
        row_tol: row_tol.filter(|_| params.flavor == Flavor::Stream),
    };

    match detect_pass(engine, input, params.flavor, &primary) {
        Ok(tables) if !tables.is_empty() => out.tables = tables,
        Ok(_) if params.flavor == Flavor::Lattice => {
            warn!("lattice found no tables; retrying with stream");
            out.fell_back = true;
            let fallback = PassOptions { row_tol, ..primary };
            match detect_pass(engine, input, Flavor::Stream, &fallback) {
                Ok(tables) => out.tables = tables,
                Err(err) => {
                    error!("stream fallback failed: {err:?}");
                    out.error = Some(format!("stream fallback failed: {err:#}"));
                }
            }
        }
        Ok(_) => info!("{} found no tables", params.flavor),
        Err(err) => {
            error!("table detection ({}) failed: {err:?}", params.flavor);
            out.error = Some(format!(
                "table detection ({}) failed: {err:#}",
                params.flavor
            ));
        }
    }

    out
}
