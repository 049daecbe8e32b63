use crate::{
    config::Config,
    detect::DetectParams,
    engine::python::PythonEngine,
    params::{Flavor, PageSelector, TableArea},
    pipeline::{self, ExtractRequest, Extractor},
    report::FatalReport,
    util::ensure_dir,
};
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::ffi::OsString;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_CONFIG: &str = "invoice-tables.toml";
const TABLE_AREAS: &str = "--table-areas";

#[derive(Parser, Debug)]
#[command(name = "invoice-tables")]
#[command(version, about = "Extract the billing period and tables from an invoice PDF as JSON")]
pub struct Args {
    /// Input PDF.
    #[arg(long)]
    pub pdf_path: PathBuf,

    /// Primary detection strategy; an empty lattice result is retried as stream.
    #[arg(long, value_enum, default_value_t = Flavor::Lattice)]
    pub flavor: Flavor,

    /// Row tolerance for stream detection. Non-integers are ignored.
    #[arg(long, allow_hyphen_values = true)]
    pub row_tol: Option<String>,

    /// Areas to search, each "x1,y1,x2,y2" in PDF points (origin bottom-left).
    #[arg(long, num_args = 0..)]
    pub table_areas: Vec<TableArea>,

    /// Pages to search: "all", "1", "1,3", "1-3,5", "2-end".
    #[arg(long, default_value = "all")]
    pub page: PageSelector,

    /// Path to config TOML. If omitted, uses ./invoice-tables.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Args {
    /// Parses `argv` after [`attach_area_values`].
    pub fn try_parse_argv<I, T>(argv: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(attach_area_values(argv))
    }

    pub fn extract_request(&self) -> ExtractRequest {
        ExtractRequest {
            pdf_path: self.pdf_path.clone(),
            detect: DetectParams {
                flavor: self.flavor,
                pages: self.page.clone(),
                table_areas: self.table_areas.clone(),
                row_tol: self.row_tol.clone(),
            },
        }
    }
}

/// Runs one extraction and prints its result. `Err` means no result was
/// printed and the caller owes stdout a [`FatalReport`].
pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    let _guard = init_logging(&args, &cfg)?;
    debug!(?args, "arguments");

    let req = args.extract_request();
    let result = match pipeline::screen_input(&cfg, &req) {
        Some(rejected) => rejected,
        None => {
            let engine = PythonEngine::new(&cfg)?;
            let extractor = Extractor::new(&cfg, engine);
            panic::catch_unwind(AssertUnwindSafe(|| extractor.run(&req))).map_err(|payload| {
                anyhow!("panic during extraction: {}", panic_message(&*payload))
            })?
        }
    };

    info!("writing result for {}", result.source_pdf);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Prints the minimal error document to stdout.
pub fn emit_fatal(message: &str) {
    let report = FatalReport::new(format!("fatal error: {message}"));
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(_) => println!("{{\"error\": \"fatal error\", \"tables\": []}}"),
    }
}

/// Rewrites every value in a `--table-areas` run into `--table-areas=<value>`
/// so that areas starting with a hyphen (`-5,0,100,100`) are not read as
/// flags. clap ends an occurrence after an attached value, so the whole run
/// is rewritten, not only the hyphenated entries.
pub fn attach_area_values<I, T>(argv: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut out = Vec::new();
    let mut in_areas = false;
    let mut rest = argv.into_iter().map(Into::into);
    while let Some(arg) = rest.next() {
        let Some(s) = arg.to_str() else {
            out.push(arg);
            continue;
        };
        if s == "--" {
            out.push(arg);
            out.extend(rest);
            break;
        }
        if s == TABLE_AREAS || s.starts_with("--table-areas=") {
            in_areas = true;
        } else if in_areas && (is_negative_area(s) || !s.starts_with('-')) {
            out.push(OsString::from(format!("{TABLE_AREAS}={s}")));
            continue;
        } else if s.starts_with('-') {
            in_areas = false;
        }
        out.push(arg);
    }
    out
}

fn is_negative_area(s: &str) -> bool {
    s.strip_prefix('-')
        .and_then(|r| r.chars().next())
        .is_some_and(|c| c.is_ascii_digit() || c == '.')
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from(DEFAULT_CONFIG);
    default.exists().then_some(default)
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the result document only.
    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if cfg.logging.write_to_file && !cfg.logging.file_path.is_empty() {
        let path = Path::new(&cfg.logging.file_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_host_contract() {
        let args = Args::try_parse_from(["invoice-tables", "--pdf-path", "a.pdf"]).unwrap();
        assert_eq!(args.flavor, Flavor::Lattice);
        assert_eq!(args.page, PageSelector::All);
        assert!(args.table_areas.is_empty());
        assert!(args.row_tol.is_none());
    }

    #[test]
    fn parses_full_invocation() {
        let args = Args::try_parse_from([
            "invoice-tables",
            "--pdf-path",
            "r.pdf",
            "--flavor",
            "stream",
            "--row-tol",
            "abc",
            "--table-areas",
            "10,700,580,100",
            "0,0,100,100",
            "--page",
            "1-3,5",
        ])
        .unwrap();
        let req = args.extract_request();
        assert_eq!(req.detect.flavor, Flavor::Stream);
        assert_eq!(req.detect.row_tol.as_deref(), Some("abc"));
        assert_eq!(req.detect.table_areas.len(), 2);
        assert_eq!(req.detect.pages.to_string(), "1-3,5");
    }

    #[test]
    fn rejects_malformed_invocations() {
        assert!(Args::try_parse_from(["invoice-tables"]).is_err());
        assert!(
            Args::try_parse_from(["invoice-tables", "--pdf-path", "a.pdf", "--flavor", "grid"])
                .is_err()
        );
        assert!(
            Args::try_parse_from(["invoice-tables", "--pdf-path", "a.pdf", "--page", "0"]).is_err()
        );
        assert!(
            Args::try_parse_from(["invoice-tables", "--pdf-path", "a.pdf", "--table-areas", "1,2"])
                .is_err()
        );
    }

    #[test]
    fn negative_areas_parse_before_later_flags() {
        let args = Args::try_parse_argv([
            "invoice-tables",
            "--pdf-path",
            "r.pdf",
            "--table-areas",
            "-5,0,100,100",
            "10,700,580,100",
            "-.5,-1,20,20",
            "--page",
            "2",
            "--row-tol",
            "-3",
        ])
        .unwrap();
        assert_eq!(
            args.table_areas,
            vec![
                TableArea::new(-5.0, 0.0, 100.0, 100.0),
                TableArea::new(10.0, 100.0, 580.0, 700.0),
                TableArea::new(-0.5, -1.0, 20.0, 20.0),
            ]
        );
        assert_eq!(args.page.to_string(), "2");
        assert_eq!(args.row_tol.as_deref(), Some("-3"));
    }

    #[test]
    fn hyphen_values_outside_areas_are_left_alone() {
        let argv = attach_area_values(["invoice-tables", "--row-tol", "-3", "--", "-1,2,3,4"]);
        assert_eq!(argv, ["invoice-tables", "--row-tol", "-3", "--", "-1,2,3,4"].map(OsString::from));
        assert!(Args::try_parse_argv(["invoice-tables", "--pdf-path", "a.pdf", "--table-areas", "-x"])
            .is_err());
    }

    #[test]
    fn panic_payloads_render() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
    }
}
