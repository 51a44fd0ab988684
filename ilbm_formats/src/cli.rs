//! Helpers shared by the command-line tools.

use clap::Parser;

/// Parse arguments, exiting with status 1 on usage errors rather than clap's 2.
/// `--help` and `--version` still exit 0.
pub fn parse_args<T: Parser>() -> T {
    match T::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            // Nowhere left to report a failed print; the exit status still carries it.
            let _ = err.print();
            std::process::exit(code);
        }
    }
}

/// Log at `info` unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();
}
