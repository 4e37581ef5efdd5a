use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` uses `env_logger` filter syntax, e.g.
/// `"lumen_engine=debug,wgpu_core=warn"`. When unset, `RUST_LOG` is consulted,
/// then `default_level` applies.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub default_level: log::LevelFilter,
    pub write_style: env_logger::WriteStyle,
    /// Caps the chatty GPU crates (`wgpu_core`, `wgpu_hal`, `naga`) at `warn`
    /// unless the filter names them explicitly.
    pub quiet_gpu_backend: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            default_level: log::LevelFilter::Info,
            write_style: env_logger::WriteStyle::Auto,
            quiet_gpu_backend: true,
        }
    }
}

const GPU_CRATES: [&str; 3] = ["wgpu_core", "wgpu_hal", "naga"];

static INIT: Once = Once::new();

/// Installs the global `env_logger` backend.
///
/// Only the first call has any effect; call it early in `main`.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        let filter = config
            .env_filter
            .or_else(|| std::env::var("RUST_LOG").ok());

        match &filter {
            Some(f) => {
                builder.parse_filters(f);
            }
            None => {
                builder.filter_level(config.default_level);
            }
        }

        if config.quiet_gpu_backend {
            for name in GPU_CRATES {
                let named = filter.as_deref().is_some_and(|f| f.contains(name));
                if !named {
                    builder.filter_module(name, log::LevelFilter::Warn);
                }
            }
        }

        builder.write_style(config.write_style);
        builder.init();

        log::debug!("logging initialized (filter: {:?})", filter);
    });
}
