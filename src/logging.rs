use env_logger::Env;

/// Default filter is `info`; `RUST_LOG` overrides it.
pub fn init() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}
