use anyhow::Result;
use log::debug;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql, Transaction};

use crate::api::user::{Role, User, UserId};
use crate::api::QueryRequest;
use crate::db::sql::{Select, Update, Value};
use crate::db::types::{CreateUserParams, PatchUserParams, UserPassword};

use super::convert_values;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS user (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL,
    password TEXT NOT NULL,
    salt TEXT NOT NULL,
    update_time INTEGER NOT NULL
);
"#;

const USER_FIELDS: [&str; 4] = ["id", "name", "email", "role"];

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: anyhow::Error| FromSqlError::Other(e.into()))
    }
}

pub fn create_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

pub fn create(tx: &Transaction, params: CreateUserParams) -> Result<UserId> {
    let sql = r#"
    INSERT INTO user (name, email, role, password, salt, update_time)
    VALUES (?, ?, ?, ?, ?, ?)
    "#;
    debug!(
        "Database create_user: {sql}, name: {}, email: {}, role: {}",
        params.name, params.email, params.role
    );
    tx.execute(
        sql,
        params![
            params.name,
            params.email,
            params.role,
            params.password,
            params.salt,
            params.update_time,
        ],
    )?;

    Ok(tx.last_insert_rowid() as UserId)
}

pub fn get(tx: &Transaction, id: UserId) -> Result<Option<User>> {
    let mut select = Select::new(USER_FIELDS.to_vec(), "user");
    select.add_where("id = ?", Value::Integer(id));

    let (sql, values) = select.build();
    let values = convert_values(values);

    debug!("Database get_user: {sql}, {values:?}");
    let mut stmt = tx.prepare(&sql)?;
    let user = stmt
        .query_row(params_from_iter(values), row_to_user)
        .optional()?;

    Ok(user)
}

pub fn has(tx: &Transaction, id: UserId) -> Result<bool> {
    let mut select = Select::count("user");
    select.add_where("id = ?", Value::Integer(id));
    query_count(tx, "has_user", select).map(|count| count > 0)
}

pub fn has_email(tx: &Transaction, email: &str, exclude: Option<UserId>) -> Result<bool> {
    let mut select = Select::count("user");
    select.add_where("email = ?", Value::Text(email.to_string()));
    if let Some(exclude) = exclude {
        select.add_where("id != ?", Value::Integer(exclude));
    }
    query_count(tx, "has_email", select).map(|count| count > 0)
}

pub fn get_password(tx: &Transaction, email: &str) -> Result<Option<UserPassword>> {
    let mut select = Select::new(vec!["id", "role", "password", "salt"], "user");
    select.add_where("email = ?", Value::Text(email.to_string()));

    let (sql, values) = select.build();
    let values = convert_values(values);

    debug!("Database get_user_password: {sql}, {values:?}");
    let mut stmt = tx.prepare(&sql)?;
    let up = stmt
        .query_row(params_from_iter(values), |row| {
            Ok(UserPassword {
                id: row.get(0)?,
                role: row.get(1)?,
                password: row.get(2)?,
                salt: row.get(3)?,
            })
        })
        .optional()?;

    Ok(up)
}

pub fn update(tx: &Transaction, params: PatchUserParams) -> Result<()> {
    let mut update = Update::new("user");

    if let Some(name) = params.name {
        update.add_field("name", Value::Text(name));
    }

    if let Some(email) = params.email {
        update.add_field("email", Value::Text(email));
    }

    if let Some((password, salt)) = params.password {
        update.add_field("password", Value::Text(password));
        update.add_field("salt", Value::Text(salt));
    }

    update.add_field("update_time", Value::Integer(params.update_time));

    update.add_where("id = ?", Value::Integer(params.id));

    let (sql, values) = update.build();
    let values = convert_values(values);

    debug!("Database update_user: {sql}");
    tx.execute(&sql, params_from_iter(values.iter()))?;

    Ok(())
}

pub fn delete(tx: &Transaction, id: UserId) -> Result<()> {
    let sql = "DELETE FROM user WHERE id = ?";
    debug!("Database delete_user: {sql}, {id}");
    tx.execute(sql, params![id])?;
    Ok(())
}

pub fn count(tx: &Transaction) -> Result<u64> {
    query_count(tx, "count_users", Select::count("user"))
}

pub fn list(tx: &Transaction, query: QueryRequest) -> Result<Vec<User>> {
    let mut select = Select::new(USER_FIELDS.to_vec(), "user");
    select.add_order_by("id ASC");
    select.set_query(query);

    let (sql, values) = select.build();
    let values = convert_values(values);

    debug!("Database list_users: {sql}, {values:?}");
    let mut stmt = tx.prepare(&sql)?;
    let users = stmt
        .query_map(params_from_iter(values), row_to_user)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(users)
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: row.get(3)?,
    })
}

pub(super) fn query_count(tx: &Transaction, op: &str, select: Select) -> Result<u64> {
    let (sql, values) = select.build();
    let values = convert_values(values);
    debug!("Database {op}: {sql}, {values:?}");

    let mut stmt = tx.prepare(&sql)?;
    let count: i64 = stmt.query_row(params_from_iter(values.iter()), |row| row.get(0))?;

    Ok(count as u64)
}
