use crate::config::Config;

/// Installs the global `tracing` subscriber with the default [`Config`].
pub fn init() {
    init_with(&Config::default());
}

/// Installs the global `tracing` subscriber using `config` for the filter.
///
/// Only the first call in a process takes effect; later calls are ignored so
/// that a host and the plugins it loads can all call this safely.
pub fn init_with(config: &Config) {
    let result = tracing_subscriber::fmt()
        .with_env_filter(config.log_filter())
        .try_init();

    if result.is_err() {
        tracing::trace!("tracing subscriber already installed, keeping the existing one");
    }
}
