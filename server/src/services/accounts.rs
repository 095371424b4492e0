use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::required;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::session::generate_token;
use crate::models::{NewUser, Role, Session, User};
use crate::store::Store;
use crate::utils::AppError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

fn parse_role(raw: &str) -> Result<Role, AppError> {
    match raw.to_lowercase().as_str() {
        "participant" => Ok(Role::Participant),
        "organizer" => Ok(Role::Organizer),
        _ => Err(AppError::ValidationError(
            "role must be participant or organizer".to_string(),
        )),
    }
}

pub async fn register(store: &dyn Store, form: RegisterForm) -> Result<User, AppError> {
    let username = required(form.username, "username")?;
    let email = required(form.email, "email")?;
    let role = parse_role(&required(form.role, "role")?)?;
    // Passwords are taken as typed.
    let password = form
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::ValidationError("password is required".to_string()))?;

    let user = store
        .insert_user(NewUser {
            username,
            email,
            password_hash: hash_password(&password)?,
            capabilities: role.capabilities(),
        })
        .await?;

    info!(user_id = %user.id, username = %user.username, ?role, "User registered");
    Ok(user)
}

/// Checks the credentials and opens a session lasting `ttl`.
pub async fn login(
    store: &dyn Store,
    form: LoginForm,
    ttl: std::time::Duration,
) -> Result<(User, Session), AppError> {
    let invalid = || AppError::AuthError("Invalid username or password".to_string());

    let username = form.username.unwrap_or_default();
    let password = form.password.unwrap_or_default();
    let user = store
        .find_user_by_username(username.trim())
        .await?
        .filter(|u| verify_password(&password, &u.password_hash))
        .ok_or_else(invalid)?;

    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|e| AppError::InternalServerError(format!("session ttl out of range: {e}")))?;
    let now = Utc::now();
    let session = Session {
        token: generate_token(),
        user_id: user.id,
        created_at: now,
        expires_at: now + ttl,
    };
    store.insert_session(session.clone()).await?;

    info!(user_id = %user.id, "User logged in");
    Ok((user, session))
}

pub async fn logout(store: &dyn Store, token: &str) -> Result<(), AppError> {
    store.delete_session(token).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::services::testing::store;

    fn form(username: &str, role: &str) -> RegisterForm {
        RegisterForm {
            username: Some(username.to_string()),
            email: Some(format!("{username}@example.com")),
            password: Some("correct horse".to_string()),
            role: Some(role.to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_sets_one_capability() {
        let store = store();
        let org = register(store.as_ref(), form("ana", "organizer")).await.unwrap();
        assert!(org.is_organizer);
        assert!(!org.is_participant);
        assert_ne!(org.password_hash, "correct horse");

        let pat = register(store.as_ref(), form("bob", "Participant")).await.unwrap();
        assert!(pat.is_participant);
        assert!(!pat.is_organizer);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let store = store();
        register(store.as_ref(), form("ana", "organizer")).await.unwrap();

        for bad in [
            form("ana", "participant"),
            form("carol", "admin"),
            RegisterForm {
                password: None,
                ..form("dan", "participant")
            },
            RegisterForm {
                email: Some(" ".into()),
                ..form("eve", "participant")
            },
        ] {
            let err = register(store.as_ref(), bad).await.unwrap_err();
            assert!(matches!(err, AppError::ValidationError(_)));
        }
    }

    #[tokio::test]
    async fn test_login_opens_session_and_logout_closes_it() {
        let store = store();
        let user = register(store.as_ref(), form("ana", "participant")).await.unwrap();

        let wrong = login(
            store.as_ref(),
            LoginForm {
                username: Some("ana".into()),
                password: Some("nope".into()),
            },
            Duration::from_secs(3600),
        )
        .await;
        assert!(matches!(wrong, Err(AppError::AuthError(_))));

        let (logged_in, session) = login(
            store.as_ref(),
            LoginForm {
                username: Some("ana".into()),
                password: Some("correct horse".into()),
            },
            Duration::from_secs(3600),
        )
        .await
        .unwrap();
        assert_eq!(logged_in.id, user.id);
        assert!(session.is_live(Utc::now()));

        let found = store.find_session_user(&session.token, Utc::now()).await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        logout(store.as_ref(), &session.token).await.unwrap();
        assert!(store
            .find_session_user(&session.token, Utc::now())
            .await
            .unwrap()
            .is_none());
    }
}
