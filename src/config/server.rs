use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslMethod};
use serde::{Deserialize, Serialize};

use crate::auth::jwt::{JwtTokenGenerator, JwtTokenValidator};
use crate::authz::messages::Locale;
use crate::context::ServerContext;
use crate::db::config::DbConfig;
use crate::dirs;
use crate::logs::LogsConfig;
use crate::restful::RestfulServer;
use crate::rsa;

use super::{expandenv, CommonConfig, PathSet};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_bind")]
    pub bind: String,

    #[serde(default)]
    pub ssl: bool,

    pub keep_alive_secs: Option<u64>,

    pub workers: Option<u64>,

    pub payload_limit_mib: Option<u64>,

    #[serde(default = "ServerConfig::default_token_expiration_secs")]
    pub token_expiration_secs: u64,

    #[serde(default = "ServerConfig::default_salt_length")]
    pub salt_length: usize,

    #[serde(default = "ServerConfig::default_revoke_purge_hours")]
    pub revoke_purge_hours: u64,

    #[serde(default)]
    pub locale: Locale,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub db: DbConfig,

    #[serde(default)]
    pub logs: LogsConfig,

    #[serde(skip)]
    pub revoke_purge_seconds: u64,

    #[serde(skip)]
    pki_dir: PathBuf,
}

/// The account seeded at startup so a fresh deployment can be managed.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdminConfig {
    #[serde(default = "AdminConfig::default_name")]
    pub name: String,

    #[serde(default = "AdminConfig::default_email")]
    pub email: String,

    #[serde(default = "AdminConfig::default_password")]
    pub password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: Self::default_bind(),
            ssl: false,
            keep_alive_secs: None,
            workers: None,
            payload_limit_mib: None,
            token_expiration_secs: Self::default_token_expiration_secs(),
            salt_length: Self::default_salt_length(),
            revoke_purge_hours: Self::default_revoke_purge_hours(),
            locale: Locale::default(),
            admin: AdminConfig::default(),
            db: DbConfig::default(),
            logs: LogsConfig::default(),
            revoke_purge_seconds: Self::default_revoke_purge_hours() * 60 * 60,
            pki_dir: PathBuf::new(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            email: Self::default_email(),
            password: Self::default_password(),
        }
    }
}

impl CommonConfig for ServerConfig {
    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        if self.bind.is_empty() {
            bail!("bind is required");
        }

        if let Some(keep_alive_secs) = self.keep_alive_secs {
            if keep_alive_secs == 0 {
                bail!("keep_alive_secs must be greater than 0");
            }
        }

        if let Some(workers) = self.workers {
            if workers == 0 {
                bail!("workers must be greater than 0");
            }
        }

        if let Some(payload_limit_mib) = self.payload_limit_mib {
            if payload_limit_mib == 0 {
                bail!("payload_limit_mib must be greater than 0");
            }
        }

        if self.token_expiration_secs < Self::MIN_TOKEN_EXPIRATION_SECS
            || self.token_expiration_secs > Self::MAX_TOKEN_EXPIRATION_SECS
        {
            bail!(
                "token_expiration_secs must be in range [{}, {}]",
                Self::MIN_TOKEN_EXPIRATION_SECS,
                Self::MAX_TOKEN_EXPIRATION_SECS
            );
        }

        if self.salt_length < Self::MIN_SALT_LENGTH || self.salt_length > Self::MAX_SALT_LENGTH {
            bail!(
                "salt_length must be in range [{}, {}]",
                Self::MIN_SALT_LENGTH,
                Self::MAX_SALT_LENGTH
            );
        }

        if self.revoke_purge_hours == 0 || self.revoke_purge_hours > Self::MAX_REVOKE_PURGE_HOURS {
            bail!(
                "revoke_purge_hours must be in range [1, {}]",
                Self::MAX_REVOKE_PURGE_HOURS
            );
        }
        self.revoke_purge_seconds = self.revoke_purge_hours * 60 * 60;

        self.admin.complete(ps).context("admin")?;
        self.db.complete(ps).context("db")?;
        self.logs.complete(ps).context("logs")?;

        self.pki_dir = ps.config_dir.join("pki");
        dirs::ensure_dir_exists(&self.pki_dir).context("ensure pki dir")?;

        Ok(())
    }
}

impl CommonConfig for AdminConfig {
    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        self.name = expandenv("name", &self.name)?;
        self.email = expandenv("email", &self.email)?;
        self.password = expandenv("password", &self.password)?;

        if self.name.is_empty() {
            bail!("name is required");
        }
        if self.email.is_empty() {
            bail!("email is required");
        }
        if self.password.len() < 6 {
            bail!("password must have at least 6 characters");
        }
        Ok(())
    }
}

impl AdminConfig {
    pub fn is_default_password(&self) -> bool {
        self.password == Self::default_password()
    }

    fn default_name() -> String {
        String::from("Admin")
    }

    fn default_email() -> String {
        String::from("admin@email.com")
    }

    fn default_password() -> String {
        String::from("admin_password123")
    }
}

impl ServerConfig {
    const MIN_SALT_LENGTH: usize = 8;
    const MAX_SALT_LENGTH: usize = 100;

    const MIN_TOKEN_EXPIRATION_SECS: u64 = 60;
    const MAX_TOKEN_EXPIRATION_SECS: u64 = 60 * 60 * 24 * 365;

    const MAX_REVOKE_PURGE_HOURS: u64 = 24 * 365;

    pub fn build_ctx(&self) -> Result<Arc<ServerContext>> {
        let db = self.db.build().context("init database")?;
        let (token_public, token_private) = self.read_jwt_keys()?;
        let jwt_generator = JwtTokenGenerator::new(&token_private, self.token_expiration_secs)
            .context("init jwt token generator")?;
        let jwt_validator =
            JwtTokenValidator::new(&token_public).context("init jwt token validator")?;

        let ctx = ServerContext::new(db, jwt_generator, jwt_validator, self.clone());
        Ok(Arc::new(ctx))
    }

    pub fn build_restful_server(&self, ctx: Arc<ServerContext>) -> Result<RestfulServer> {
        let mut srv = RestfulServer::new(self.bind.clone(), ctx);
        if self.ssl {
            let ssl = self.build_ssl()?;
            srv.set_ssl(ssl);
        }

        if let Some(keep_alive_secs) = self.keep_alive_secs {
            srv.set_keep_alive_secs(keep_alive_secs);
        }

        if let Some(workers) = self.workers {
            srv.set_workers(workers);
        }

        if let Some(payload_limit_mib) = self.payload_limit_mib {
            srv.set_payload_limit_mib(payload_limit_mib);
        }

        Ok(srv)
    }

    fn read_jwt_keys(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let public_key_path = self.pki_dir.join("token_public.pem");
        let private_key_path = self.pki_dir.join("token_private.pem");
        if public_key_path.exists() && private_key_path.exists() {
            let public_key = fs::read(&public_key_path).context("read token public key")?;
            let private_key = fs::read(&private_key_path).context("read token private key")?;
            return Ok((public_key, private_key));
        }

        info!("Token keys for jwt not exists, try to generate new ones");
        let (public_key, private_key) =
            rsa::generate_rsa_keys().context("generate keys for token")?;

        fs::write(&public_key_path, &public_key).context("write token public key")?;
        fs::write(&private_key_path, &private_key).context("write token private key")?;

        Ok((public_key, private_key))
    }

    fn build_ssl(&self) -> Result<SslAcceptorBuilder> {
        let key_path = self.pki_dir.join("key.pem");
        if !key_path.exists() {
            bail!("ssl key file not exists: {:?}", key_path);
        }

        let cert_path = self.pki_dir.join("cert.pem");
        if !cert_path.exists() {
            bail!("ssl cert file not exists: {:?}", cert_path);
        }

        let mut builder =
            SslAcceptor::mozilla_intermediate(SslMethod::tls()).context("init ssl acceptor")?;

        builder
            .set_private_key_file(&key_path, openssl::ssl::SslFiletype::PEM)
            .context("load ssl key file")?;
        builder
            .set_certificate_chain_file(&cert_path)
            .context("load ssl cert file")?;

        Ok(builder)
    }

    fn default_bind() -> String {
        String::from("127.0.0.1:8000")
    }

    fn default_token_expiration_secs() -> u64 {
        60 * 60 // 1 hour
    }

    fn default_salt_length() -> usize {
        24
    }

    fn default_revoke_purge_hours() -> u64 {
        24
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_paths(name: &str) -> PathSet {
        let base = PathBuf::from(name);
        PathSet {
            config_dir: base.join("config"),
            data_dir: base.join("data"),
        }
    }

    fn complete(toml_str: &str, ps: &PathSet) -> Result<ServerConfig> {
        let mut cfg: ServerConfig = toml::from_str(toml_str)?;
        cfg.complete(ps)?;
        Ok(cfg)
    }

    #[test]
    fn test_complete() {
        let ps = test_paths("_test_server_config");

        let cfg = complete("", &ps).unwrap();
        assert_eq!(cfg.bind, "127.0.0.1:8000");
        assert_eq!(cfg.locale, Locale::Es);
        assert_eq!(cfg.revoke_purge_seconds, 24 * 60 * 60);
        assert_eq!(cfg.admin.email, "admin@email.com");
        assert!(cfg.admin.is_default_password());
        assert!(ps.config_dir.join("pki").is_dir());

        let cfg = complete(
            r#"
            locale = "en"
            token_expiration_secs = 120
            revoke_purge_hours = 2

            [admin]
            password = "another_secret"

            [db.sqlite]
            memory = true
            "#,
            &ps,
        )
        .unwrap();
        assert_eq!(cfg.locale, Locale::En);
        assert_eq!(cfg.token_expiration_secs, 120);
        assert_eq!(cfg.revoke_purge_seconds, 2 * 60 * 60);
        assert!(!cfg.admin.is_default_password());
        assert!(cfg.db.sqlite.memory);

        let invalid = [
            "bind = \"\"",
            "workers = 0",
            "token_expiration_secs = 10",
            "token_expiration_secs = 99999999999",
            "salt_length = 7",
            "salt_length = 101",
            "revoke_purge_hours = 0",
            "revoke_purge_hours = 9000",
            "locale = \"fr\"",
            "[admin]\npassword = \"123\"",
        ];
        for toml_str in invalid {
            assert!(complete(toml_str, &ps).is_err(), "{toml_str}");
        }

        fs::remove_dir_all("_test_server_config").unwrap();
    }

    #[test]
    fn test_read_jwt_keys() {
        let ps = test_paths("_test_server_jwt_keys");
        let cfg = complete("", &ps).unwrap();

        let (public_key, private_key) = cfg.read_jwt_keys().unwrap();
        assert!(ps.config_dir.join("pki/token_public.pem").exists());

        // Second read returns the persisted pair.
        let (public_again, private_again) = cfg.read_jwt_keys().unwrap();
        assert_eq!(public_key, public_again);
        assert_eq!(private_key, private_again);

        fs::remove_dir_all("_test_server_jwt_keys").unwrap();
    }
}
