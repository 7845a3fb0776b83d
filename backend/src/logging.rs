use crate::config::LoggingConfig;
use env_logger::Env;

/// Installs `env_logger` as the `log` backend. `RUST_LOG` wins over the configured
/// filter. Calling this more than once is harmless; later calls are ignored.
pub fn init(config: &LoggingConfig) {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(config.filter.as_str()))
        .try_init();
}
