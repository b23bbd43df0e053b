use clap::{Parser, ValueEnum};
use log::LevelFilter;

/// Log level options for command-line argument.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Off => LevelFilter::Off,
        }
    }
}

/// Common command-line arguments for Prism applications.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct EngineArgs {
    /// Set the log verbosity level
    #[arg(short = 'l', long = "log-level", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Number of frames to render before exiting
    #[arg(short = 'f', long = "frames", default_value_t = 3)]
    pub frames: u64,

    /// Default texture width used when compiling render graphs
    #[arg(long = "width", default_value_t = 1920)]
    pub width: u32,

    /// Default texture height used when compiling render graphs
    #[arg(long = "height", default_value_t = 1080)]
    pub height: u32,

    /// Maximum number of live resources the headless backend hands out
    #[arg(long = "max-resources")]
    pub max_resources: Option<usize>,

    /// Disable resource aliasing between non-overlapping lifetimes
    #[arg(long = "no-aliasing")]
    pub no_aliasing: bool,

    /// Serve profiling scopes over puffin http
    #[arg(long = "profile")]
    pub profile: bool,

    /// Additional positional arguments passed to the application
    #[arg(trailing_var_arg = true)]
    pub args: Vec<String>,
}

impl EngineArgs {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
