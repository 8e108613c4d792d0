use tracing_subscriber::EnvFilter;

const QUIET_TARGETS: &[&str] = &["hyper=warn", "reqwest=warn", "aws_config=warn", "aws_smithy_runtime=warn"];

/// Installs the global subscriber. `RUST_LOG` wins over `level` when set.
pub fn setup_logger(level: &str) {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    for directive in QUIET_TARGETS {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_ansi(true)
        .compact()
        .with_env_filter(filter)
        .try_init();
}
