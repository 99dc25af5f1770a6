//! One-shot first-user seeding, run by the server after migrations.

use crate::auth::{PasswordHasher, UserRecord};
use crate::error::AppError;
use crate::settings::Settings;
use crate::store::UserStore;
use chrono::Utc;
use uuid::Uuid;

/// Insert the configured admin account when no user exists yet. Returns true if it did.
pub async fn seed_initial_user(
    users: &dyn UserStore,
    hasher: &PasswordHasher,
    settings: &Settings,
) -> Result<bool, AppError> {
    let (Some(email), Some(password)) = (&settings.admin_email, &settings.admin_password) else {
        return Ok(false);
    };
    if users.count_users().await? > 0 {
        tracing::debug!("users present, skipping admin seed");
        return Ok(false);
    }
    let user = UserRecord {
        id: Uuid::new_v4(),
        email: email.clone(),
        password_hash: hasher.hash(password)?,
        first_name: "Admin".into(),
        last_name: "User".into(),
        created_at: Utc::now(),
        updated_at: None,
    };
    users.insert_user(&user).await?;
    tracing::info!(email = %user.email, "seeded initial admin user");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::HashMap;

    fn settings(seed: bool) -> Settings {
        let mut vars = HashMap::from([("STORE".to_string(), "memory".to_string())]);
        if !seed {
            vars.insert("SEED_ADMIN".into(), "false".into());
        }
        Settings::from_vars(&vars).unwrap()
    }

    #[tokio::test]
    async fn seeds_once() {
        let store = MemoryStore::new();
        let hasher = PasswordHasher::new();
        assert!(seed_initial_user(&store, &hasher, &settings(true)).await.unwrap());
        assert!(!seed_initial_user(&store, &hasher, &settings(true)).await.unwrap());
        assert_eq!(store.count_users().await.unwrap(), 1);
        let admin = store.find_user_by_email("admin@example.com").await.unwrap().unwrap();
        assert!(hasher.verify("Admin@123456", &admin.password_hash).unwrap());
    }

    #[tokio::test]
    async fn disabled_seed_does_nothing() {
        let store = MemoryStore::new();
        assert!(!seed_initial_user(&store, &PasswordHasher::new(), &settings(false)).await.unwrap());
        assert_eq!(store.count_users().await.unwrap(), 0);
    }
}
