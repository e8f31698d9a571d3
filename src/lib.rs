pub mod cli;
pub mod codec;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod gcf;
pub mod platform;
pub mod serial_platform;

pub mod logging {
    use env_logger::Env;
    use log::LevelFilter;

    pub fn initialize_logger(filter: LevelFilter) {
        env_logger::Builder::from_env(Env::default().default_filter_or(filter.as_str()))
            .format_target(false)
            .init();
    }
}
