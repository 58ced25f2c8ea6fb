use cfg_if::cfg_if;
pub use log::{debug, error, info, trace, warn};

cfg_if! {
    if #[cfg(feature = "logger_env")] {
        use env_logger;

        const DEFAULT_LOG_LEVEL: &str = "info";

        /// Initializes the `env_logger` backend, honoring `RUST_LOG`.
        pub fn logger_init() {
            env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or(DEFAULT_LOG_LEVEL),
            )
            .try_init()
            .ok();
        }
    } else {
        /// No logging backend compiled in; the `log` facade stays silent
        /// unless the embedding application installs one.
        pub fn logger_init() {}
    }
}
