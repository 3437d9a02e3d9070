use crate::api::user::{Role, User};
use crate::api::QueryRequest;
use crate::db::types::{PatchUserParams, UserPassword};
use crate::db::Database;

use super::new_user;

pub fn run_user_tests(db: &Database) {
    test_create(db);
    test_get(db);
    test_list(db);
    test_update(db);
    test_delete(db);
}

fn test_create(db: &Database) {
    let ids = db
        .with_transaction(|tx| {
            let white = tx.create_user(new_user("White", Role::Admin))?;
            let black = tx.create_user(new_user("Black", Role::User))?;
            Ok((white, black))
        })
        .unwrap();
    assert_eq!(ids, (1, 2));

    // Emails are unique.
    let result = db.with_transaction(|tx| tx.create_user(new_user("White", Role::User)));
    assert!(result.is_err());
}

fn test_get(db: &Database) {
    db.with_transaction(|tx| {
        let user = tx.get_user(1)?;
        assert_eq!(
            user,
            Some(User {
                id: 1,
                name: String::from("White"),
                email: String::from("white@email.com"),
                role: Role::Admin,
            })
        );
        assert!(tx.get_user(404)?.is_none());

        assert!(tx.has_user(2)?);
        assert!(!tx.has_user(404)?);

        assert!(tx.has_email("black@email.com", None)?);
        assert!(!tx.has_email("black@email.com", Some(2))?);
        assert!(tx.has_email("black@email.com", Some(1))?);

        let password = tx.get_user_password("black@email.com")?;
        assert_eq!(
            password,
            Some(UserPassword {
                id: 2,
                role: Role::User,
                password: String::from("test_hash"),
                salt: String::from("test_salt"),
            })
        );
        assert!(tx.get_user_password("nobody@email.com")?.is_none());
        Ok(())
    })
    .unwrap();
}

fn test_list(db: &Database) {
    db.with_transaction(|tx| {
        for i in 0..10 {
            tx.create_user(new_user(&format!("user{i}"), Role::User))?;
        }
        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx| {
        assert_eq!(tx.count_users()?, 12);

        let users = tx.list_users(QueryRequest::default())?;
        assert_eq!(users.len(), 10);
        assert_eq!(users[0].name, "White");

        let users = tx.list_users(QueryRequest {
            page: 2,
            per_page: 10,
        })?;
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].name, "user8");

        let users = tx.list_users(QueryRequest {
            page: 3,
            per_page: 10,
        })?;
        assert!(users.is_empty());
        Ok(())
    })
    .unwrap();
}

fn test_update(db: &Database) {
    db.with_transaction(|tx| {
        tx.update_user(PatchUserParams {
            id: 2,
            name: Some(String::from("Gray")),
            password: Some((String::from("new_hash"), String::from("new_salt"))),
            update_time: 200,
            ..Default::default()
        })?;

        let user = tx.get_user(2)?.unwrap();
        assert_eq!(user.name, "Gray");
        assert_eq!(user.email, "black@email.com");
        assert_eq!(user.role, Role::User);

        let password = tx.get_user_password("black@email.com")?.unwrap();
        assert_eq!(password.password, "new_hash");
        assert_eq!(password.salt, "new_salt");

        tx.update_user(PatchUserParams {
            id: 2,
            email: Some(String::from("gray@email.com")),
            update_time: 300,
            ..Default::default()
        })?;
        assert!(tx.has_email("gray@email.com", None)?);
        assert!(!tx.has_email("black@email.com", None)?);
        Ok(())
    })
    .unwrap();
}

fn test_delete(db: &Database) {
    db.with_transaction(|tx| {
        tx.delete_user(3)?;
        assert!(!tx.has_user(3)?);
        assert_eq!(tx.count_users()?, 11);
        Ok(())
    })
    .unwrap();
}
