pub mod server;

use std::path::PathBuf;
use std::{env, fs, io};

use anyhow::{Context, Result};
use clap::Args;
use log::warn;
use serde::de::DeserializeOwned;

use crate::dirs;

/// Directories every config section may derive its paths from.
pub struct PathSet {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl PathSet {
    pub fn new(config_dir: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<Self> {
        let config_dir = match config_dir {
            Some(dir) => dir,
            None => match env::var("BLOGD_CONFIG") {
                Ok(dir) => PathBuf::from(dir),
                Err(_) => dirs::config_dir()?,
            },
        };

        let data_dir = match data_dir {
            Some(dir) => dir,
            None => match env::var("BLOGD_DATA") {
                Ok(dir) => PathBuf::from(dir),
                Err(_) => dirs::data_dir()?,
            },
        };

        dirs::ensure_dir_exists(&config_dir)
            .with_context(|| format!("ensure config dir: {}", config_dir.display()))?;
        dirs::ensure_dir_exists(&data_dir)
            .with_context(|| format!("ensure data dir: {}", data_dir.display()))?;

        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    pub fn load_config<T>(&self, name: &str) -> Result<T>
    where
        T: CommonConfig + DeserializeOwned + Default,
    {
        let path = self.config_dir.join(format!("{name}.toml"));
        let mut cfg: T = match fs::read_to_string(&path) {
            Ok(s) => toml::from_str(&s)
                .with_context(|| format!("parse config toml: {}", path.display()))?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("Config file for {name} not found, using defaults");
                T::default()
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read config file: {}", path.display()));
            }
        };

        cfg.complete(self).context("validate config")?;
        Ok(cfg)
    }
}

pub trait CommonConfig {
    fn complete(&mut self, ps: &PathSet) -> Result<()>;
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// The config directory, default is `~/.config/blogd` (`/etc/blogd` for root).
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// The data directory, default is `~/.local/share/blogd` (`/var/lib/blogd` for root).
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn load<T>(&self, name: &str) -> Result<T>
    where
        T: CommonConfig + DeserializeOwned + Default,
    {
        let ps = PathSet::new(self.config_dir.clone(), self.data_dir.clone())?;
        ps.load_config(name)
    }
}

/// See: [`shellexpand::full`].
pub fn expandenv(name: &str, s: impl AsRef<str>) -> Result<String> {
    let s =
        shellexpand::full(s.as_ref()).with_context(|| format!("expand env value for '{name}'"))?;
    Ok(s.to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Default, Deserialize)]
    struct TestConfig {
        #[serde(default)]
        name: String,

        #[serde(default)]
        value: u64,

        #[serde(skip)]
        completed: bool,
    }

    impl CommonConfig for TestConfig {
        fn complete(&mut self, _ps: &PathSet) -> Result<()> {
            if self.value > 100 {
                anyhow::bail!("value too large");
            }
            self.completed = true;
            Ok(())
        }
    }

    #[test]
    fn test_load_config() {
        let base = PathBuf::from("_test_load_config");
        let _ = fs::remove_dir_all(&base);

        let ps = PathSet::new(Some(base.join("config")), Some(base.join("data"))).unwrap();
        assert!(ps.config_dir.exists());
        assert!(ps.data_dir.exists());

        let cfg: TestConfig = ps.load_config("test").unwrap();
        assert_eq!(cfg.name, "");
        assert!(cfg.completed);

        fs::write(
            ps.config_dir.join("test.toml"),
            "name = \"blog\"\nvalue = 12\n",
        )
        .unwrap();
        let cfg: TestConfig = ps.load_config("test").unwrap();
        assert_eq!(cfg.name, "blog");
        assert_eq!(cfg.value, 12);

        fs::write(ps.config_dir.join("test.toml"), "value = 1000\n").unwrap();
        assert!(ps.load_config::<TestConfig>("test").is_err());

        fs::write(ps.config_dir.join("test.toml"), "value = \"abc\"\n").unwrap();
        assert!(ps.load_config::<TestConfig>("test").is_err());

        fs::remove_dir_all(&base).unwrap();
    }

    #[test]
    fn test_expandenv() {
        env::set_var("BLOGD_TEST_EXPAND", "posts");
        let s = expandenv("test", "/data/$BLOGD_TEST_EXPAND").unwrap();
        assert_eq!(s, "/data/posts");
    }
}
