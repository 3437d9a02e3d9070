use anyhow::{bail, Context, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::api::user::{Role, TokenResponse, UserId};

use super::Principal;

/// JWT issuer identifier
const ISSUER: &str = "blogd/jwt-tokenizer";

/// Claims represents public claim values (as specified in RFC 7519)
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    pub aud: String, // Role of the subject
    pub exp: usize,  // Token expiration time (timestamp)
    pub iat: usize,  // Time at which token was issued (timestamp)
    pub iss: String, // Token issuer
    pub nbf: usize,  // Time before which token must not be accepted (timestamp)
    pub sub: String, // User id
}

/// Signs session tokens with an RSA private key.
pub struct JwtTokenGenerator {
    key: EncodingKey,
    expiry: usize, // seconds
}

impl JwtTokenGenerator {
    pub fn new(private_key: &[u8], expiry: u64) -> Result<Self> {
        let key = match EncodingKey::from_rsa_pem(private_key) {
            Ok(key) => key,
            Err(e) => bail!("parse RSA private key for jwt token generation failed: {e}"),
        };
        Ok(Self {
            key,
            expiry: expiry as usize,
        })
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        Self::new(&tests::TEST_KEYS.1, 60).unwrap()
    }

    pub fn generate_token(&self, principal: Principal, now: u64) -> Result<TokenResponse> {
        let now = now as usize;

        let claims = Claims {
            aud: principal.role.to_string(),
            exp: now + self.expiry,
            iat: now,
            iss: String::from(ISSUER),
            nbf: now,
            sub: principal.id.to_string(),
        };

        match encode(&Header::new(Algorithm::RS256), &claims, &self.key) {
            Ok(token) => Ok(TokenResponse {
                token,
                expire_after: claims.exp as u64,
            }),
            Err(e) => bail!("generate jwt token failed: {e}"),
        }
    }
}

/// Verifies the signature and time window of session tokens.
pub struct JwtTokenValidator {
    key: DecodingKey,
}

/// What a verified token says about its bearer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    pub principal: Principal,
    pub expire_after: u64,
}

impl JwtTokenValidator {
    pub fn new(public_key: &[u8]) -> Result<Self> {
        let key = match DecodingKey::from_rsa_pem(public_key) {
            Ok(key) => key,
            Err(e) => bail!("parse RSA public key for jwt token validation failed: {e}"),
        };
        Ok(Self { key })
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        Self::new(&tests::TEST_KEYS.0).unwrap()
    }

    pub fn validate_token(&self, token: &str, now: u64) -> Result<TokenInfo> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["aud", "exp", "iat", "iss", "nbf", "sub"]);
        validation.set_audience(&[Role::Admin.as_str(), Role::User.as_str()]);

        let claims = match decode::<Claims>(token, &self.key, &validation) {
            Ok(data) => data.claims,
            Err(e) => bail!("validate jwt token failed: {e}"),
        };

        let id = claims
            .sub
            .parse::<UserId>()
            .context("validate jwt token failed: subject is not a user id")?;
        let role = claims
            .aud
            .parse::<Role>()
            .context("validate jwt token failed: audience is not a role")?;

        // The library allows some leeway, the window here is exact.
        let now = now as usize;
        if now >= claims.exp {
            bail!("validate jwt token failed: token expired");
        }
        if now < claims.nbf {
            bail!("validate jwt token failed: token not yet valid");
        }

        Ok(TokenInfo {
            principal: Principal { id, role },
            expire_after: claims.exp as u64,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::Utc;
    use once_cell::sync::Lazy;

    use crate::rsa;

    use super::*;

    /// `(public_key, private_key)` shared by every test in the process.
    pub static TEST_KEYS: Lazy<(Vec<u8>, Vec<u8>)> =
        Lazy::new(|| rsa::generate_rsa_keys().unwrap());

    #[test]
    fn test_jwt() {
        let jwt_generator = JwtTokenGenerator::new_test();
        let jwt_validator = JwtTokenValidator::new_test();

        let principals = [
            Principal {
                id: 1,
                role: Role::Admin,
            },
            Principal {
                id: 42,
                role: Role::User,
            },
        ];

        let now = Utc::now().timestamp() as u64;
        for principal in principals {
            let token = jwt_generator.generate_token(principal, now).unwrap();
            assert_eq!(token.expire_after, now + 60);

            let info = jwt_validator.validate_token(&token.token, now).unwrap();
            assert_eq!(info.principal, principal);
            assert_eq!(info.expire_after, now + 60);

            let result = jwt_validator.validate_token(&token.token, now + 80);
            assert!(result.is_err());
        }

        assert!(jwt_validator.validate_token("not.a.token", now).is_err());
    }

    #[test]
    fn test_jwt_foreign_key() {
        let (_, private_key) = rsa::generate_rsa_keys().unwrap();
        let foreign = JwtTokenGenerator::new(&private_key, 60).unwrap();
        let validator = JwtTokenValidator::new_test();

        let now = Utc::now().timestamp() as u64;
        let token = foreign
            .generate_token(
                Principal {
                    id: 1,
                    role: Role::Admin,
                },
                now,
            )
            .unwrap();
        assert!(validator.validate_token(&token.token, now).is_err());
    }
}
