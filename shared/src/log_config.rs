use core::fmt;
use std::fmt::Display;

use clap_verbosity_flag::{InfoLevel, LevelFilter, Verbosity};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(clap::ValueEnum, Clone, Debug, Copy)]
pub enum LogFormat {
    Json,
    Text,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_lowercase())
    }
}

#[derive(clap::Parser, Clone)]
pub struct LogConfig {
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    #[clap(long, env, default_value_t = LogFormat::Text, help = "Logging format")]
    pub log_format: LogFormat,

    #[clap(
        long,
        env,
        help = "Extra filter directives, e.g. `chain=debug,snapshot=trace`"
    )]
    pub log_filter: Option<String>,
}

impl LogConfig {
    fn max_level(&self) -> Option<Level> {
        match self.verbosity.log_level_filter() {
            LevelFilter::Off => None,
            LevelFilter::Error => Some(Level::ERROR),
            LevelFilter::Warn => Some(Level::WARN),
            LevelFilter::Info => Some(Level::INFO),
            LevelFilter::Debug => Some(Level::DEBUG),
            LevelFilter::Trace => Some(Level::TRACE),
        }
    }

    fn env_filter(&self, level: Level) -> EnvFilter {
        let mut directives = level.to_string().to_lowercase();
        if let Some(extra) = &self.log_filter {
            directives.push(',');
            directives.push_str(extra);
        }
        EnvFilter::new(directives)
    }

    pub fn init(&self) {
        let Some(log_level) = self.max_level() else {
            return;
        };
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(self.env_filter(log_level))
            .with_target(true);

        match self.log_format {
            LogFormat::Text => subscriber.init(),
            LogFormat::Json => subscriber.json().flatten_event(true).init(),
        };
    }
}
