mod post;
mod token;
mod user;

pub mod config;

use std::path::Path;

use anyhow::Result;
use rusqlite::types::Value as DbValue;
use rusqlite::Connection as RawConnection;
use rusqlite::Transaction as RawTransaction;

use crate::api::post::{Post, PostId};
use crate::api::user::{User, UserId};
use crate::api::QueryRequest;

use super::sql::Value;
use super::types::{
    Connection, CreatePostParams, CreateUserParams, PatchPostParams, PatchUserParams, Transaction,
    UserPassword,
};

pub struct SqliteConnection {
    conn: RawConnection,
}

pub struct SqliteTransaction<'a> {
    tx: RawTransaction<'a>,
}

impl SqliteConnection {
    /// Opens a SQLite database file, creating it and its tables if needed.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = RawConnection::open(path)?;
        Self::init(conn)
    }

    pub fn memory() -> Result<Self> {
        let conn = RawConnection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: RawConnection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        user::create_table(&conn)?;
        post::create_table(&conn)?;
        token::create_table(&conn)?;
        Ok(Self { conn })
    }
}

impl<'a> Connection<'a, SqliteTransaction<'a>> for SqliteConnection {
    fn transaction(&'a mut self) -> Result<SqliteTransaction<'a>> {
        let tx = self.conn.transaction()?;
        Ok(SqliteTransaction { tx })
    }
}

impl Transaction for SqliteTransaction<'_> {
    fn create_user(&self, params: CreateUserParams) -> Result<UserId> {
        user::create(&self.tx, params)
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>> {
        user::get(&self.tx, id)
    }

    fn has_user(&self, id: UserId) -> Result<bool> {
        user::has(&self.tx, id)
    }

    fn has_email(&self, email: &str, exclude: Option<UserId>) -> Result<bool> {
        user::has_email(&self.tx, email, exclude)
    }

    fn get_user_password(&self, email: &str) -> Result<Option<UserPassword>> {
        user::get_password(&self.tx, email)
    }

    fn update_user(&self, params: PatchUserParams) -> Result<()> {
        user::update(&self.tx, params)
    }

    fn delete_user(&self, id: UserId) -> Result<()> {
        user::delete(&self.tx, id)
    }

    fn count_users(&self) -> Result<u64> {
        user::count(&self.tx)
    }

    fn list_users(&self, query: QueryRequest) -> Result<Vec<User>> {
        user::list(&self.tx, query)
    }

    fn create_post(&self, params: CreatePostParams) -> Result<PostId> {
        post::create(&self.tx, params)
    }

    fn get_post(&self, id: PostId) -> Result<Option<Post>> {
        post::get(&self.tx, id)
    }

    fn get_post_owner(&self, id: PostId) -> Result<Option<UserId>> {
        post::get_owner(&self.tx, id)
    }

    fn update_post(&self, params: PatchPostParams) -> Result<()> {
        post::update(&self.tx, params)
    }

    fn delete_post(&self, id: PostId) -> Result<()> {
        post::delete(&self.tx, id)
    }

    fn delete_user_posts(&self, user_id: UserId) -> Result<u64> {
        post::delete_by_user(&self.tx, user_id)
    }

    fn count_posts(&self) -> Result<u64> {
        post::count(&self.tx)
    }

    fn list_posts(&self, query: QueryRequest) -> Result<Vec<Post>> {
        post::list(&self.tx, query)
    }

    fn revoke_token(&self, hash: &str, expire_after: u64) -> Result<()> {
        token::revoke(&self.tx, hash, expire_after)
    }

    fn is_token_revoked(&self, hash: &str) -> Result<bool> {
        token::is_revoked(&self.tx, hash)
    }

    fn purge_revoked_tokens(&self, now: u64) -> Result<u64> {
        token::purge(&self.tx, now)
    }

    fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        Ok(())
    }
}

fn convert_values(values: Vec<Value>) -> Vec<DbValue> {
    values
        .into_iter()
        .map(|v| match v {
            Value::Text(s) => DbValue::Text(s),
            Value::Integer(i) => DbValue::Integer(i as i64),
        })
        .collect()
}
