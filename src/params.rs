use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Table detection strategy understood by the geometry engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    /// Ruling-line (grid) detection.
    #[default]
    Lattice,
    /// Whitespace/column-alignment detection.
    Stream,
}

impl Flavor {
    pub fn as_str(self) -> &'static str {
        match self {
            Flavor::Lattice => "lattice",
            Flavor::Stream => "stream",
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rectangle on a page in PDF points, origin bottom-left.
/// Always stored with (x1, y1) bottom-left and (x2, y2) top-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableArea {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl TableArea {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }
}

impl FromStr for TableArea {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let coords = s
            .split(',')
            .map(|part| {
                let part = part.trim();
                let v: f32 = part
                    .parse()
                    .with_context(|| format!("invalid coordinate {part:?} in table area {s:?}"))?;
                if !v.is_finite() {
                    bail!("non-finite coordinate {part:?} in table area {s:?}");
                }
                Ok(v)
            })
            .collect::<Result<Vec<_>>>()?;

        match coords.as_slice() {
            [x1, y1, x2, y2] => Ok(TableArea::new(*x1, *y1, *x2, *y2)),
            _ => Err(anyhow!(
                "table area must be x1,y1,x2,y2 (got {} values): {s:?}",
                coords.len()
            )),
        }
    }
}

impl fmt::Display for TableArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2},{:.2},{:.2},{:.2}", self.x1, self.y1, self.x2, self.y2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEnd {
    Page(u32),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpan {
    pub start_page: u32, // 1-based inclusive
    pub end: PageEnd,
}

/// Which pages a detection pass should look at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSelector {
    #[default]
    All,
    Spans(Vec<PageSpan>),
}

impl FromStr for PageSelector {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(PageSelector::All);
        }
        if trimmed.is_empty() {
            bail!("empty page selector");
        }

        let mut spans = Vec::new();
        for item in trimmed.split(',') {
            let item = item.trim();
            let span = match item.split_once('-') {
                Some((a, b)) => {
                    let start_page = parse_page(a, s)?;
                    let end = if b.trim().eq_ignore_ascii_case("end") {
                        PageEnd::End
                    } else {
                        let end_page = parse_page(b, s)?;
                        if end_page < start_page {
                            bail!("descending page range {item:?} in {s:?}");
                        }
                        PageEnd::Page(end_page)
                    };
                    PageSpan { start_page, end }
                }
                None => {
                    let p = parse_page(item, s)?;
                    PageSpan {
                        start_page: p,
                        end: PageEnd::Page(p),
                    }
                }
            };
            spans.push(span);
        }
        Ok(PageSelector::Spans(spans))
    }
}

fn parse_page(raw: &str, selector: &str) -> Result<u32> {
    let raw = raw.trim();
    let page: u32 = raw
        .parse()
        .with_context(|| format!("invalid page {raw:?} in selector {selector:?}"))?;
    if page == 0 {
        bail!("pages are 1-based, got 0 in selector {selector:?}");
    }
    Ok(page)
}

impl fmt::Display for PageSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSelector::All => f.write_str("all"),
            PageSelector::Spans(spans) => {
                for (i, span) in spans.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    match span.end {
                        PageEnd::Page(end) if end == span.start_page => {
                            write!(f, "{}", span.start_page)?
                        }
                        PageEnd::Page(end) => write!(f, "{}-{}", span.start_page, end)?,
                        PageEnd::End => write!(f, "{}-end", span.start_page)?,
                    }
                }
                Ok(())
            }
        }
    }
}

/// Parses the raw `--row-tol` value. Blank means absent; anything that is
/// not an integer is dropped with a warning.
pub fn parse_row_tol(raw: Option<&str>) -> Option<i32> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<i32>() {
        Ok(v) => Some(v),
        Err(err) => {
            warn!("invalid row_tol {raw:?} ({err}); ignoring");
            None
        }
    }
}
