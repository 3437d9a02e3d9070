mod user;

use anyhow::{bail, Result};

use crate::api::user::Role;

use super::types::CreateUserParams;
use super::Database;

pub fn run_tests(db: &Database) {
    user::run_user_tests(db);
    post::run_post_tests(db);
    token::run_token_tests(db);

    test_rollback(db);
}

fn new_user(name: &str, role: Role) -> CreateUserParams {
    CreateUserParams {
        name: name.to_string(),
        email: format!("{}@email.com", name.to_lowercase()),
        role,
        password: String::from("test_hash"),
        salt: String::from("test_salt"),
        update_time: 50,
    }
}

fn test_rollback(db: &Database) {
    let result: Result<()> = db.with_transaction(|tx| {
        tx.create_user(new_user("none", Role::Admin)).unwrap();
        bail!("rollback");
    });
    assert!(result.is_err());

    db.with_transaction(|tx| {
        assert!(!tx.has_email("none@email.com", None)?);
        Ok(())
    })
    .unwrap();
}
