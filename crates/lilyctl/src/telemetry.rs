//! tracing-subscriber setup.

use tracing_subscriber::EnvFilter;

/// Filter directives: `RUST_LOG` wins, then `--verbose`, then the config.
pub fn filter_directives(rust_log: Option<&str>, verbose: bool, configured: &str) -> String {
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(env) => env.to_string(),
        None if verbose => "debug".to_string(),
        None => match configured.trim() {
            "" => "info".to_string(),
            level => level.to_string(),
        },
    }
}

pub fn init(verbose: bool, configured: &str) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directives = filter_directives(rust_log.as_deref(), verbose, configured);
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        eprintln!("invalid log filter `{directives}`: {e}; using info");
        EnvFilter::new("info")
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
