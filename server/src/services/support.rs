use serde::Deserialize;
use tracing::info;

use super::required;
use crate::models::{NewSupportMessage, SupportMessage};
use crate::store::Store;
use crate::utils::AppError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
}

pub async fn submit(store: &dyn Store, form: ContactForm) -> Result<SupportMessage, AppError> {
    let name = required(form.name, "name")?;
    let email = required(form.email, "email")?;
    let message = required(form.message, "message")?;
    if !email.contains('@') {
        return Err(AppError::ValidationError(
            "email must be a valid address".to_string(),
        ));
    }

    let saved = store
        .insert_support_message(NewSupportMessage {
            name,
            email,
            message,
        })
        .await?;
    info!(message_id = %saved.id, "Support message received");
    Ok(saved)
}

pub async fn list(store: &dyn Store) -> Result<Vec<SupportMessage>, AppError> {
    store.list_support_messages().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::store;

    fn form(message: &str) -> ContactForm {
        ContactForm {
            name: Some("Ana".into()),
            email: Some("ana@example.com".into()),
            message: Some(message.into()),
        }
    }

    #[tokio::test]
    async fn test_messages_are_listed_newest_first() {
        let store = store();
        submit(store.as_ref(), form("first")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        submit(store.as_ref(), form("second")).await.unwrap();

        let messages = list(store.as_ref()).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message, "second");
        assert!(!messages[0].is_support);
        assert!(messages[0].response.is_none());
    }

    #[tokio::test]
    async fn test_incomplete_messages_are_rejected() {
        let store = store();
        let missing = ContactForm {
            message: None,
            ..form("x")
        };
        let bad_email = ContactForm {
            email: Some("ana.example.com".into()),
            ..form("x")
        };
        for bad in [missing, bad_email] {
            assert!(matches!(
                submit(store.as_ref(), bad).await,
                Err(AppError::ValidationError(_))
            ));
        }
        assert!(list(store.as_ref()).await.unwrap().is_empty());
    }
}
