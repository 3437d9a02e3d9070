use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{CommonConfig, PathSet};

use super::sqlite::config::SqliteConfig;
use super::{Database, UnionConnection};

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct DbConfig {
    #[serde(default)]
    pub sqlite: SqliteConfig,
}

impl CommonConfig for DbConfig {
    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.sqlite.complete(ps).context("sqlite")?;
        Ok(())
    }
}

impl DbConfig {
    pub fn build(&self) -> Result<Database> {
        let conn = self.sqlite.build().context("open sqlite database")?;
        Ok(Database::new(UnionConnection::Sqlite(conn)))
    }
}
