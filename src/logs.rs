use std::path::PathBuf;

use anyhow::{bail, Result};
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config;
use serde::{Deserialize, Serialize};

use crate::config::{CommonConfig, PathSet};
use crate::dirs;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogsConfig {
    #[serde(default = "LogTarget::default")]
    pub target: LogTarget,

    #[serde(default = "LogLevel::default")]
    pub level: LogLevel,

    #[serde(default = "LogsConfig::default_file_archive")]
    pub file_archive: u32,

    #[serde(default = "LogsConfig::default_file_max_size_mib")]
    pub file_max_size_mib: u64,

    #[serde(skip)]
    logs_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    #[default]
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Also prints every SQL statement and every authorization decision.
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }
}

impl CommonConfig for LogsConfig {
    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        if self.target != LogTarget::File {
            return Ok(());
        }

        if self.file_archive == 0 {
            bail!("logs.file_archive must be greater than 0");
        }
        if self.file_max_size_mib == 0 {
            bail!("logs.file_max_size_mib must be greater than 0");
        }

        self.logs_dir = ps.data_dir.join("logs");
        dirs::ensure_dir_exists(&self.logs_dir)?;

        Ok(())
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        LogsConfig {
            target: LogTarget::default(),
            level: LogLevel::default(),
            file_archive: LogsConfig::default_file_archive(),
            file_max_size_mib: LogsConfig::default_file_max_size_mib(),
            logs_dir: PathBuf::new(),
        }
    }
}

impl LogsConfig {
    pub fn init(&self, name: &str) -> Result<()> {
        let level_filter = LevelFilter::from(self.level);
        let encoder = || Box::new(PatternEncoder::new(LOG_PATTERN));

        let (appender_name, appender): (&str, Box<dyn log4rs::append::Append>) = match self.target
        {
            LogTarget::Stdout => {
                let stdout = ConsoleAppender::builder().encoder(encoder()).build();
                ("stdout", Box::new(stdout))
            }
            LogTarget::Stderr => {
                let stderr = ConsoleAppender::builder()
                    .target(Target::Stderr)
                    .encoder(encoder())
                    .build();
                ("stderr", Box::new(stderr))
            }
            LogTarget::File => {
                let path = self.logs_dir.join(format!("{name}.log"));

                let archived_pattern = self.logs_dir.join(format!("{name}.{{}}.log"));
                let archived_pattern = format!("{}", archived_pattern.display());

                let window_roller = FixedWindowRoller::builder()
                    .base(1)
                    .build(&archived_pattern, self.file_archive)?;

                let size_trigger = SizeTrigger::new(self.file_max_size_mib * 1024 * 1024);

                let compound_policy =
                    CompoundPolicy::new(Box::new(size_trigger), Box::new(window_roller));

                let file_appender = RollingFileAppender::builder()
                    .encoder(encoder())
                    .build(path, Box::new(compound_policy))?;
                ("file", Box::new(file_appender))
            }
        };

        let config = Config::builder()
            .appender(Appender::builder().build(appender_name, appender))
            .build(Root::builder().appender(appender_name).build(level_filter))?;

        log4rs::init_config(config)?;

        Ok(())
    }

    fn default_file_archive() -> u32 {
        5
    }

    fn default_file_max_size_mib() -> u64 {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_logs_config() {
        let cfg: LogsConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.target, LogTarget::Stdout);
        assert_eq!(cfg.level, LogLevel::Info);
        assert_eq!(cfg.file_archive, 5);

        let cfg: LogsConfig = toml::from_str("target = \"file\"\nlevel = \"debug\"").unwrap();
        assert_eq!(cfg.target, LogTarget::File);
        assert_eq!(LevelFilter::from(cfg.level), LevelFilter::Debug);

        assert!(toml::from_str::<LogsConfig>("level = \"trace\"").is_err());
    }

    #[test]
    fn test_complete_file_target() {
        let base = PathBuf::from("_test_logs_complete");
        let ps = PathSet {
            config_dir: base.join("config"),
            data_dir: base.join("data"),
        };

        let mut cfg = LogsConfig {
            target: LogTarget::File,
            file_archive: 0,
            ..Default::default()
        };
        assert!(cfg.complete(&ps).is_err());

        cfg.file_archive = 3;
        cfg.complete(&ps).unwrap();
        assert!(base.join("data").join("logs").is_dir());

        std::fs::remove_dir_all(&base).unwrap();
    }
}
