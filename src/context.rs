use anyhow::{Context, Result};
use chrono::Utc;
use log::{info, warn};

use crate::api::user::{Role, UserId};
use crate::auth::jwt::{JwtTokenGenerator, JwtTokenValidator};
use crate::auth::password::{generate_salt, hash_password};
use crate::auth::{Principal, TokenVerifier, VerifyError};
use crate::authz::pipeline::Pipeline;
use crate::code;
use crate::config::server::ServerConfig;
use crate::db::types::CreateUserParams;
use crate::db::Database;

pub struct ServerContext {
    pub db: Database,

    pub jwt_generator: JwtTokenGenerator,
    pub jwt_validator: JwtTokenValidator,

    pub cfg: ServerConfig,
}

impl ServerContext {
    pub fn new(
        db: Database,
        jwt_generator: JwtTokenGenerator,
        jwt_validator: JwtTokenValidator,
        cfg: ServerConfig,
    ) -> Self {
        Self {
            db,
            jwt_generator,
            jwt_validator,
            cfg,
        }
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        Self::new(
            Database::new_test(),
            JwtTokenGenerator::new_test(),
            JwtTokenValidator::new_test(),
            ServerConfig::default(),
        )
    }

    pub fn pipeline(&self) -> Pipeline<'_, Self, Database> {
        Pipeline::new(self, &self.db)
    }

    /// Creates the configured admin account unless its email is already
    /// registered. Returns the id of the created account.
    pub fn seed_admin(&self) -> Result<Option<UserId>> {
        let admin = &self.cfg.admin;
        let created = self
            .db
            .with_transaction(|tx| {
                if tx.has_email(&admin.email, None)? {
                    return Ok(None);
                }

                let salt = generate_salt(self.cfg.salt_length);
                let id = tx.create_user(CreateUserParams {
                    name: admin.name.clone(),
                    email: admin.email.clone(),
                    role: Role::Admin,
                    password: hash_password(&admin.password, &salt),
                    salt,
                    update_time: Utc::now().timestamp() as u64,
                })?;
                Ok(Some(id))
            })
            .context("seed admin account")?;

        if let Some(id) = created {
            info!("Admin account {:?} created with id {id}", admin.email);
            if admin.is_default_password() {
                warn!("The admin account uses the default password, please change it");
            }
        }
        Ok(created)
    }
}

/// Revoked tokens are remembered by digest, never in plain text.
pub fn token_digest(token: &str) -> String {
    code::sha256(token)
}

impl TokenVerifier for ServerContext {
    fn verify(&self, token: &str) -> Result<Principal, VerifyError> {
        let now = Utc::now().timestamp() as u64;
        let info = match self.jwt_validator.validate_token(token, now) {
            Ok(info) => info,
            Err(e) => return Err(VerifyError::Rejected(format!("{e:#}"))),
        };

        let digest = token_digest(token);
        let (revoked, exists) = self.db.with_transaction(|tx| {
            Ok((
                tx.is_token_revoked(&digest)?,
                tx.has_user(info.principal.id)?,
            ))
        })?;
        if revoked {
            return Err(VerifyError::Rejected(String::from("token has been revoked")));
        }
        if !exists {
            return Err(VerifyError::Rejected(format!(
                "user {} no longer exists",
                info.principal.id
            )));
        }

        Ok(info.principal)
    }
}
