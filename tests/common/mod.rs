#![allow(dead_code)]

use anyhow::{anyhow, Result};
use invoice_tables::engine::{DetectIn, Engine, PageText, PageTextOut, RawTable};
use invoice_tables::params::Flavor;
use serde_json::json;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// Shared view of the requests a [`FakeEngine`] received; clone it before the
/// engine moves into an `Extractor`.
pub type CallLog<T> = Rc<RefCell<Vec<T>>>;

/// Scripted engine that records every request it sees.
#[derive(Default)]
pub struct FakeEngine {
    pub page_count: u32,
    pub pages: Vec<PageText>,
    pub open_error: Option<String>,
    pub lattice: Scripted,
    pub stream: Scripted,
    pub text_calls: CallLog<u32>,
    pub detect_calls: CallLog<DetectIn>,
}

#[derive(Default, Clone)]
pub enum Scripted {
    #[default]
    Empty,
    Tables(Vec<RawTable>),
    Fail(String),
}

impl FakeEngine {
    pub fn with_text(pages: &[&str]) -> Self {
        Self {
            page_count: pages.len() as u32,
            pages: pages
                .iter()
                .enumerate()
                .map(|(i, t)| PageText {
                    page: i as u32 + 1,
                    text: Some((*t).to_string()),
                    error: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn detected_flavors(&self) -> Vec<Flavor> {
        flavors(&self.detect_calls)
    }
}

impl Engine for FakeEngine {
    fn page_text(&self, _input: &Path, max_pages: u32) -> Result<PageTextOut> {
        self.text_calls.borrow_mut().push(max_pages);
        if let Some(err) = &self.open_error {
            return Err(anyhow!("{err}"));
        }
        Ok(PageTextOut {
            page_count: self.page_count,
            pages: self
                .pages
                .iter()
                .filter(|p| p.page <= max_pages)
                .cloned()
                .collect(),
            error: None,
        })
    }

    fn detect_tables(&self, req: &DetectIn) -> Result<Vec<RawTable>> {
        self.detect_calls.borrow_mut().push(req.clone());
        let script = match req.flavor {
            Flavor::Lattice => &self.lattice,
            Flavor::Stream => &self.stream,
        };
        match script {
            Scripted::Empty => Ok(Vec::new()),
            Scripted::Tables(t) => Ok(t.clone()),
            Scripted::Fail(msg) => Err(anyhow!("{msg}")),
        }
    }
}

pub fn flavors(calls: &CallLog<DetectIn>) -> Vec<Flavor> {
    calls.borrow().iter().map(|c| c.flavor).collect()
}

pub fn raw_table(page: &str, rows: Vec<Vec<serde_json::Value>>) -> RawTable {
    RawTable {
        page: json!(page),
        accuracy: Some(99.5),
        whitespace: Some(12.0),
        header: (0..rows.first().map_or(0, Vec::len)).map(|i| json!(i)).collect(),
        rows,
    }
}
