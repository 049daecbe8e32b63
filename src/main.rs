use clap::error::ErrorKind;
use invoice_tables::cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = match cli::Args::try_parse_argv(std::env::args_os()) {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprint!("{err}");
            let rendered = err.to_string();
            let first = rendered.lines().next().unwrap_or_default();
            cli::emit_fatal(first.trim_start_matches("error: "));
            return ExitCode::from(2);
        }
    };

    // Logging may not be up yet, so fatal errors go straight to stderr.
    if let Err(err) = cli::dispatch(args) {
        eprintln!("fatal: {err:?}");
        cli::emit_fatal(&format!("{err:#}"));
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
