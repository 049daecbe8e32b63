use super::{types::*, Engine};
use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

const PAGE_TEXT_SCRIPT: &str = "pdf_text.py";
const DETECT_SCRIPT: &str = "camelot_detect.py";

/// Runs the bridge scripts under `paths.scripts_dir` with a Python
/// interpreter, one process per call, JSON in on stdin and out on stdout.
pub struct PythonEngine {
    cfg: Config,
    scripts_dir: PathBuf,
    python_exe: PathBuf,
}

impl PythonEngine {
    pub fn new(cfg: &Config) -> Result<Self> {
        let scripts_dir = resolve_scripts_dir(&cfg.paths.scripts_dir)?;
        if cfg.security.pin_scripts_dir {
            let cwd = std::env::current_dir().with_context(|| "current_dir")?;
            let canon = scripts_dir
                .canonicalize()
                .with_context(|| format!("canonicalize scripts_dir: {}", scripts_dir.display()))?;
            if !canon.starts_with(&cwd) {
                return Err(anyhow!(
                    "scripts_dir is outside cwd while pin_scripts_dir=true: {}",
                    canon.display()
                ));
            }
        }
        for script in [PAGE_TEXT_SCRIPT, DETECT_SCRIPT] {
            let path = scripts_dir.join(script);
            if !path.exists() {
                return Err(anyhow!("missing script: {}", path.display()));
            }
        }
        let python_exe = resolve_python_exe(&cfg.python.python_exe);
        debug!(
            "python engine exe={} scripts={}",
            python_exe.display(),
            scripts_dir.display()
        );
        Ok(Self {
            cfg: cfg.clone(),
            scripts_dir,
            python_exe,
        })
    }

    fn script(&self, name: &str) -> PathBuf {
        self.scripts_dir.join(name)
    }

    fn timeout(&self) -> Option<u64> {
        if self.cfg.python.timeout_seconds > 0 {
            Some(self.cfg.python.timeout_seconds)
        } else {
            None
        }
    }

    fn run_json<I: serde::Serialize, O: for<'de> serde::Deserialize<'de>>(
        &self,
        script: &Path,
        input: &I,
        timeout_seconds: Option<u64>,
    ) -> Result<O> {
        debug!(
            "python run {} timeout={:?}",
            script.display(),
            timeout_seconds
        );
        let mut cmd = Command::new(&self.python_exe);
        cmd.arg(script);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        for (k, v) in &self.cfg.python.env {
            cmd.env(k, v);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning python: {}", script.display()))?;

        {
            let mut stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
            let bytes = serde_json::to_vec(input)?;
            use std::io::Write;
            stdin.write_all(&bytes)?;
            stdin.flush().ok();
        }

        let output = if let Some(secs) = timeout_seconds {
            wait_with_timeout(&mut child, Duration::from_secs(secs))?
        } else {
            child
                .wait_with_output()
                .with_context(|| "waiting for python")?
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "python script failed ({}): {}\n{}",
                output.status,
                script.display(),
                stderr.trim()
            ));
        }

        if self.cfg.debug.relay_python_stderr && !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("python stderr {}: {}", script.display(), stderr.trim());
        }

        let out: O = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("parsing python JSON output: {}", script.display()))?;
        Ok(out)
    }
}

fn resolve_scripts_dir(raw: &str) -> Result<PathBuf> {
    let configured = expand_tilde(raw.trim());
    if configured.is_absolute() || configured.is_dir() {
        return Ok(configured);
    }
    let exe = std::env::current_exe().with_context(|| "current_exe")?;
    if let Some(exe_dir) = exe.parent() {
        let beside_exe = exe_dir.join(&configured);
        if beside_exe.is_dir() {
            return Ok(beside_exe);
        }
    }
    Err(anyhow!(
        "scripts_dir not found in working directory or next to {}: {}",
        exe.display(),
        configured.display()
    ))
}

fn resolve_python_exe(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        if let Ok(env_val) = std::env::var("INVOICE_TABLES_PYTHON") {
            let p = expand_tilde(&env_val);
            if p.exists() {
                return p;
            }
            warn!("INVOICE_TABLES_PYTHON points to a missing file: {env_val}");
        }
        return PathBuf::from("python3");
    }
    expand_tilde(raw)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

impl Engine for PythonEngine {
    fn page_text(&self, input: &Path, max_pages: u32) -> Result<PageTextOut> {
        let script = self.script(PAGE_TEXT_SCRIPT);
        let req = PageTextIn {
            input_pdf: input.display().to_string(),
            max_pages,
        };
        let out: PageTextOut = self.run_json(&script, &req, self.timeout())?;
        if let Some(err) = out.error.as_deref() {
            return Err(anyhow!("pdf_text error: {err}"));
        }
        Ok(out)
    }

    fn detect_tables(&self, req: &DetectIn) -> Result<Vec<RawTable>> {
        let script = self.script(DETECT_SCRIPT);
        let out: DetectOut = self.run_json(&script, req, self.timeout())?;
        if !out.ok {
            if let Some(tb) = out.traceback.as_deref() {
                error!("camelot ({}) traceback:\n{}", req.flavor, tb.trim_end());
            }
            let msg = out
                .error
                .unwrap_or_else(|| format!("camelot ({}) failed", req.flavor));
            return Err(anyhow!(msg));
        }
        Ok(out.tables)
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output> {
    // Drain pipes while waiting; camelot/pdfminer can be chatty enough to
    // fill the stderr buffer and block the child.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            let stdout = stdout_thread
                .join()
                .map_err(|_| anyhow!("stdout reader thread panicked"))??;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if start.elapsed() > timeout {
            warn!("python process timed out after {:?}", timeout);
            let _ = child.kill();
            child.wait().with_context(|| "wait after kill")?;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            let _ = stdout_thread.join();
            return Err(anyhow!(
                "python process exceeded timeout ({:?}); stderr: {}",
                timeout,
                String::from_utf8_lossy(&stderr)
            ));
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}
