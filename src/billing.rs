//! Billing-period lookup in the text layer of the first few pages.

use crate::{engine::Engine, util::normalize_page_text};
use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use time::{macros::format_description, Date};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub start: Date,
    pub end: Date,
    /// 1-based page the phrase was found on.
    pub page: u32,
}

impl BillingPeriod {
    pub fn start_iso(&self) -> String {
        iso_date(self.start)
    }

    pub fn end_iso(&self) -> String {
        iso_date(self.end)
    }
}

fn iso_date(d: Date) -> String {
    d.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| d.to_string())
}

const BILLING_PHRASE: &str =
    r"(?i)Abrechnung\s+von\s+([0-9]{2}\.[0-9]{2}\.[0-9]{4})\s+bis\s+([0-9]{2}\.[0-9]{2}\.[0-9]{4})";

/// Parses a `DD.MM.YYYY` date.
pub fn parse_german_date(raw: &str) -> Result<Date> {
    Date::parse(raw, format_description!("[day].[month].[year]"))
        .with_context(|| format!("invalid calendar date {raw:?}"))
}

/// Matcher for "Abrechnung von DD.MM.YYYY bis DD.MM.YYYY".
pub struct PhraseMatcher {
    re: Regex,
}

impl PhraseMatcher {
    pub fn new() -> Result<Self> {
        let re = Regex::new(BILLING_PHRASE).with_context(|| "compiling billing phrase")?;
        Ok(Self { re })
    }

    /// First phrase in `text`. `Ok(None)` when there is none; `Err` when the
    /// phrase is there but a date is not a real date.
    pub fn find(&self, text: &str) -> Result<Option<(Date, Date)>> {
        let Some(caps) = self.re.captures(text) else {
            return Ok(None);
        };
        let start = parse_german_date(&caps[1])?;
        let end = parse_german_date(&caps[2])?;
        Ok(Some((start, end)))
    }
}

/// Scans up to `max_pages` pages of `input` for the billing phrase.
///
/// Unreadable documents and unreadable pages degrade to "not found". The only
/// error returned is a matched phrase carrying an impossible date.
pub fn find_billing_period(
    engine: &dyn Engine,
    input: &Path,
    max_pages: u32,
) -> Result<Option<BillingPeriod>> {
    if max_pages == 0 {
        return Ok(None);
    }

    let doc = match engine.page_text(input, max_pages) {
        Ok(doc) => doc,
        Err(err) => {
            warn!("could not read text layer for billing period: {err:#}");
            return Ok(None);
        }
    };

    let pages_to_check = max_pages.min(doc.page_count);
    if pages_to_check == 0 {
        debug!("document has no pages; skipping billing period scan");
        return Ok(None);
    }

    let matcher = PhraseMatcher::new()?;
    let mut pages = doc.pages;
    pages.sort_by_key(|p| p.page);

    for page in pages.iter().filter(|p| p.page >= 1 && p.page <= pages_to_check) {
        if let Some(err) = page.error.as_deref() {
            warn!("text extraction failed on page {}: {err}", page.page);
            continue;
        }
        let Some(raw) = page.text.as_deref().filter(|t| !t.trim().is_empty()) else {
            debug!("page {} has no text layer", page.page);
            continue;
        };

        let text = normalize_page_text(raw);
        if let Some((start, end)) = matcher
            .find(&text)
            .with_context(|| format!("billing phrase on page {}", page.page))?
        {
            info!("billing period {start}..{end} found on page {}", page.page);
            return Ok(Some(BillingPeriod {
                start,
                end,
                page: page.page,
            }));
        }
    }

    debug!("no billing phrase in the first {pages_to_check} page(s)");
    Ok(None)
}
