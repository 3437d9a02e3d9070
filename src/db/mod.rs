mod sql;
mod sqlite;

#[cfg(test)]
mod tests;

pub mod config;
pub mod types;

use std::cell::RefCell;
use std::sync::Mutex;

use anyhow::{bail, Result};
use sqlite::{SqliteConnection, SqliteTransaction};
use types::{
    Connection, CreatePostParams, CreateUserParams, PatchPostParams, PatchUserParams, Transaction,
    UserPassword,
};

use crate::api::post::{Post, PostId};
use crate::api::user::{User, UserId};
use crate::api::QueryRequest;
use crate::authz::pipeline::OwnerStore;
use crate::authz::ResourceKind;

/// The only state shared between requests: one connection, used by one
/// transaction at a time.
pub struct Database {
    conn: Mutex<RefCell<UnionConnection>>,
}

impl Database {
    pub fn new(conn: UnionConnection) -> Self {
        Self {
            conn: Mutex::new(RefCell::new(conn)),
        }
    }

    /// An in-memory database, lost when dropped.
    pub fn memory() -> Result<Self> {
        let conn = SqliteConnection::memory()?;
        Ok(Self::new(UnionConnection::Sqlite(conn)))
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        Self::memory().unwrap()
    }

    /// Runs `f` inside a transaction, committed when `f` returns `Ok` and
    /// rolled back otherwise.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Transaction) -> Result<T>,
    {
        let conn = match self.conn.lock() {
            Ok(conn) => conn,
            Err(e) => bail!("failed to lock connection: {:#}", e),
        };
        let mut conn = conn.borrow_mut();
        let tx = conn.transaction()?;

        let result = f(&tx);

        if result.is_ok() {
            tx.commit()
        } else {
            tx.rollback()
        }?;

        result
    }
}

impl OwnerStore for Database {
    fn find_owner(&self, kind: ResourceKind, id: u64) -> Result<Option<UserId>> {
        self.with_transaction(|tx| match kind {
            ResourceKind::Post => tx.get_post_owner(id),
            ResourceKind::User => Ok(tx.has_user(id)?.then_some(id)),
        })
    }
}

pub enum UnionConnection {
    Sqlite(SqliteConnection),
}

pub enum UnionTransaction<'a> {
    Sqlite(SqliteTransaction<'a>),
}

impl<'a> Connection<'a, UnionTransaction<'a>> for UnionConnection {
    fn transaction(&'a mut self) -> Result<UnionTransaction<'a>> {
        match self {
            UnionConnection::Sqlite(conn) => conn.transaction().map(UnionTransaction::Sqlite),
        }
    }
}

impl Transaction for UnionTransaction<'_> {
    fn create_user(&self, params: CreateUserParams) -> Result<UserId> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_user(params),
        }
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_user(id),
        }
    }

    fn has_user(&self, id: UserId) -> Result<bool> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.has_user(id),
        }
    }

    fn has_email(&self, email: &str, exclude: Option<UserId>) -> Result<bool> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.has_email(email, exclude),
        }
    }

    fn get_user_password(&self, email: &str) -> Result<Option<UserPassword>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_user_password(email),
        }
    }

    fn update_user(&self, params: PatchUserParams) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.update_user(params),
        }
    }

    fn delete_user(&self, id: UserId) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_user(id),
        }
    }

    fn count_users(&self) -> Result<u64> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.count_users(),
        }
    }

    fn list_users(&self, query: QueryRequest) -> Result<Vec<User>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_users(query),
        }
    }

    fn create_post(&self, params: CreatePostParams) -> Result<PostId> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_post(params),
        }
    }

    fn get_post(&self, id: PostId) -> Result<Option<Post>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_post(id),
        }
    }

    fn get_post_owner(&self, id: PostId) -> Result<Option<UserId>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_post_owner(id),
        }
    }

    fn update_post(&self, params: PatchPostParams) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.update_post(params),
        }
    }

    fn delete_post(&self, id: PostId) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_post(id),
        }
    }

    fn delete_user_posts(&self, user_id: UserId) -> Result<u64> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_user_posts(user_id),
        }
    }

    fn count_posts(&self) -> Result<u64> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.count_posts(),
        }
    }

    fn list_posts(&self, query: QueryRequest) -> Result<Vec<Post>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_posts(query),
        }
    }

    fn revoke_token(&self, hash: &str, expire_after: u64) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.revoke_token(hash, expire_after),
        }
    }

    fn is_token_revoked(&self, hash: &str) -> Result<bool> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.is_token_revoked(hash),
        }
    }

    fn purge_revoked_tokens(&self, now: u64) -> Result<u64> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.purge_revoked_tokens(now),
        }
    }

    fn commit(self) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.commit(),
        }
    }

    fn rollback(self) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.rollback(),
        }
    }
}
