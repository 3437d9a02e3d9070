use serde::{Deserialize, Serialize};

use crate::auth::AuthnError;

use super::{ActionKind, DenyReason, Rejection, ResourceKind};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Es,
    En,
}

/// Catalog of every text the API shows to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Text {
    Registered,
    LoggedIn,
    LoggedOut,
    Deleted,
    InvalidCredentials,
    EmailTaken,
    UnknownAuthor,
    InternalError,
}

pub fn text(locale: Locale, text: Text) -> &'static str {
    match locale {
        Locale::Es => match text {
            Text::Registered => "Usuario registrado exitosamente",
            Text::LoggedIn => "Inicio de sesión exitoso",
            Text::LoggedOut => "Cierre de sesión exitoso",
            Text::Deleted => "Se ha eliminado exitosamente.",
            Text::InvalidCredentials => "Credenciales inválidas",
            Text::EmailTaken => "El email ya ha sido registrado.",
            Text::UnknownAuthor => "El usuario indicado no existe.",
            Text::InternalError => "Error interno del servidor",
        },
        Locale::En => match text {
            Text::Registered => "User registered successfully",
            Text::LoggedIn => "Logged in successfully",
            Text::LoggedOut => "Logged out successfully",
            Text::Deleted => "Deleted successfully.",
            Text::InvalidCredentials => "Invalid credentials",
            Text::EmailTaken => "The email has already been taken.",
            Text::UnknownAuthor => "The given user does not exist.",
            Text::InternalError => "Internal server error",
        },
    }
}

/// The client facing message for a rejection. Internal details are never
/// included.
pub fn rejection_message(locale: Locale, rejection: &Rejection) -> String {
    match rejection {
        Rejection::Authentication(err) => authn_message(locale, *err).to_string(),
        Rejection::Authorization {
            reason,
            resource,
            action,
        } => deny_message(locale, *reason, *resource, *action).to_string(),
        Rejection::ResourceNotFound { kind, id } => not_found_message(locale, *kind, *id),
        Rejection::Internal(_) => text(locale, Text::InternalError).to_string(),
    }
}

fn authn_message(locale: Locale, err: AuthnError) -> &'static str {
    match (locale, err) {
        (Locale::Es, AuthnError::MissingToken) => "Token no encontrado. Acceso denegado.",
        (Locale::Es, AuthnError::InvalidToken) => "Token inválido o expirado.",
        (Locale::En, AuthnError::MissingToken) => "Token not found. Access denied.",
        (Locale::En, AuthnError::InvalidToken) => "Invalid or expired token.",
    }
}

fn deny_message(
    locale: Locale,
    reason: DenyReason,
    resource: ResourceKind,
    action: ActionKind,
) -> &'static str {
    let invalid_operation =
        reason == DenyReason::NotOwner && (resource, action) == (ResourceKind::Post, ActionKind::Create);

    match locale {
        Locale::Es => match reason {
            _ if invalid_operation => "Operación inválida.",
            DenyReason::InsufficientRole | DenyReason::NotOwner => {
                "No tienes permiso para realizar esta acción."
            }
            DenyReason::SelfDeletionForbidden => "No es posible realizar está acción.",
        },
        Locale::En => match reason {
            _ if invalid_operation => "Invalid operation.",
            DenyReason::InsufficientRole | DenyReason::NotOwner => {
                "You are not allowed to perform this action."
            }
            DenyReason::SelfDeletionForbidden => "This action cannot be performed.",
        },
    }
}

pub fn not_found_message(locale: Locale, kind: ResourceKind, id: u64) -> String {
    match (locale, kind) {
        (Locale::Es, ResourceKind::Post) => format!("El Post con id {id} no se ha encontrado."),
        (Locale::Es, ResourceKind::User) => format!("El Usuario con id {id} no se ha encontrado."),
        (Locale::En, ResourceKind::Post) => format!("Post with id {id} was not found."),
        (Locale::En, ResourceKind::User) => format!("User with id {id} was not found."),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn test_parse_locale() {
        #[derive(Deserialize)]
        struct Cfg {
            #[serde(default)]
            locale: Locale,
        }

        let cfg: Cfg = toml::from_str("").unwrap();
        assert_eq!(cfg.locale, Locale::Es);
        let cfg: Cfg = toml::from_str("locale = \"en\"").unwrap();
        assert_eq!(cfg.locale, Locale::En);
    }

    #[test]
    fn test_rejection_message() {
        let not_owner = |resource, action| Rejection::Authorization {
            reason: DenyReason::NotOwner,
            resource,
            action,
        };

        assert_eq!(
            rejection_message(Locale::Es, &AuthnError::MissingToken.into()),
            "Token no encontrado. Acceso denegado."
        );
        assert_eq!(
            rejection_message(
                Locale::Es,
                &not_owner(ResourceKind::Post, ActionKind::Update)
            ),
            "No tienes permiso para realizar esta acción."
        );
        assert_eq!(
            rejection_message(
                Locale::Es,
                &not_owner(ResourceKind::Post, ActionKind::Create)
            ),
            "Operación inválida."
        );
        assert_eq!(
            rejection_message(
                Locale::En,
                &Rejection::ResourceNotFound {
                    kind: ResourceKind::Post,
                    id: 7
                }
            ),
            "Post with id 7 was not found."
        );

        let internal = Rejection::Internal(anyhow!("database is locked"));
        let message = rejection_message(Locale::En, &internal);
        assert_eq!(message, "Internal server error");
        assert!(!message.contains("locked"));
    }
}
