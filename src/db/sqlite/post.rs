use anyhow::Result;
use log::debug;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};

use crate::api::post::{Author, Post, PostId};
use crate::api::user::UserId;
use crate::api::QueryRequest;
use crate::db::sql::{Select, Update, Value};
use crate::db::types::{CreatePostParams, PatchPostParams};

use super::convert_values;
use super::user::query_count;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS post (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    topic TEXT NOT NULL,
    content TEXT NOT NULL,
    user_id INTEGER NOT NULL REFERENCES user(id),
    update_time INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_post_user_id ON post(user_id);
"#;

const POST_TABLE: &str = "post JOIN user ON post.user_id = user.id";
const POST_FIELDS: [&str; 6] = [
    "post.id",
    "post.topic",
    "post.content",
    "user.id",
    "user.name",
    "user.email",
];

pub fn create_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

pub fn create(tx: &Transaction, params: CreatePostParams) -> Result<PostId> {
    let sql = r#"
    INSERT INTO post (topic, content, user_id, update_time)
    VALUES (?, ?, ?, ?)
    "#;
    debug!("Database create_post: {sql}, {params:?}");
    tx.execute(
        sql,
        params![
            params.topic,
            params.content,
            params.user_id,
            params.update_time
        ],
    )?;

    Ok(tx.last_insert_rowid() as PostId)
}

pub fn get(tx: &Transaction, id: PostId) -> Result<Option<Post>> {
    let mut select = Select::new(POST_FIELDS.to_vec(), POST_TABLE);
    select.add_where("post.id = ?", Value::Integer(id));

    let (sql, values) = select.build();
    let values = convert_values(values);

    debug!("Database get_post: {sql}, {values:?}");
    let mut stmt = tx.prepare(&sql)?;
    let post = stmt
        .query_row(params_from_iter(values), row_to_post)
        .optional()?;

    Ok(post)
}

pub fn get_owner(tx: &Transaction, id: PostId) -> Result<Option<UserId>> {
    let sql = "SELECT user_id FROM post WHERE id = ?";
    debug!("Database get_post_owner: {sql}, {id}");
    let owner = tx
        .query_row(sql, params![id], |row| row.get(0))
        .optional()?;
    Ok(owner)
}

pub fn update(tx: &Transaction, params: PatchPostParams) -> Result<()> {
    let mut update = Update::new("post");

    if let Some(topic) = params.topic {
        update.add_field("topic", Value::Text(topic));
    }

    if let Some(content) = params.content {
        update.add_field("content", Value::Text(content));
    }

    update.add_field("update_time", Value::Integer(params.update_time));

    update.add_where("id = ?", Value::Integer(params.id));

    let (sql, values) = update.build();
    let values = convert_values(values);

    debug!("Database update_post: {sql}, {values:?}");
    tx.execute(&sql, params_from_iter(values.iter()))?;

    Ok(())
}

pub fn delete(tx: &Transaction, id: PostId) -> Result<()> {
    let sql = "DELETE FROM post WHERE id = ?";
    debug!("Database delete_post: {sql}, {id}");
    tx.execute(sql, params![id])?;
    Ok(())
}

pub fn delete_by_user(tx: &Transaction, user_id: UserId) -> Result<u64> {
    let sql = "DELETE FROM post WHERE user_id = ?";
    debug!("Database delete_user_posts: {sql}, {user_id}");
    let count = tx.execute(sql, params![user_id])?;
    Ok(count as u64)
}

pub fn count(tx: &Transaction) -> Result<u64> {
    query_count(tx, "count_posts", Select::count("post"))
}

pub fn list(tx: &Transaction, query: QueryRequest) -> Result<Vec<Post>> {
    let mut select = Select::new(POST_FIELDS.to_vec(), POST_TABLE);
    select.add_order_by("post.id ASC");
    select.set_query(query);

    let (sql, values) = select.build();
    let values = convert_values(values);

    debug!("Database list_posts: {sql}, {values:?}");
    let mut stmt = tx.prepare(&sql)?;
    let posts = stmt
        .query_map(params_from_iter(values), row_to_post)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(posts)
}

fn row_to_post(row: &rusqlite::Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        topic: row.get(1)?,
        content: row.get(2)?,
        user: Author {
            id: row.get(3)?,
            name: row.get(4)?,
            email: row.get(5)?,
        },
    })
}
