use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, Transaction};

use crate::db::sql::{Select, Value};

use super::user::query_count;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS revoked_token (
    hash TEXT PRIMARY KEY NOT NULL,
    expire_after INTEGER NOT NULL
);
"#;

pub fn create_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

pub fn revoke(tx: &Transaction, hash: &str, expire_after: u64) -> Result<()> {
    let sql = "INSERT OR IGNORE INTO revoked_token (hash, expire_after) VALUES (?, ?)";
    debug!("Database revoke_token: {sql}, {hash}, {expire_after}");
    tx.execute(sql, params![hash, expire_after])?;
    Ok(())
}

pub fn is_revoked(tx: &Transaction, hash: &str) -> Result<bool> {
    let mut select = Select::count("revoked_token");
    select.add_where("hash = ?", Value::Text(hash.to_string()));
    query_count(tx, "is_token_revoked", select).map(|count| count > 0)
}

pub fn purge(tx: &Transaction, now: u64) -> Result<u64> {
    let sql = "DELETE FROM revoked_token WHERE expire_after <= ?";
    debug!("Database purge_revoked_tokens: {sql}, {now}");
    let count = tx.execute(sql, params![now])?;
    Ok(count as u64)
}
