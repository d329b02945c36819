use serde_json::Value;

use crate::backend::{Backend, Row};
use crate::core::config::AdminSettings;
use crate::core::state::AppState;
use crate::db::types::Role;
use crate::repositories;
use crate::repositories::profiles::NewProfile;
use crate::services::accounts::{self, NewAccount};

pub(crate) async fn ensure_first_admin(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_admin_email.is_empty() || admin.first_admin_password.is_empty() {
        tracing::warn!("FIRST_ADMIN_EMAIL/FIRST_ADMIN_PASSWORD not configured; skipping admin bootstrap");
        return Ok(());
    }

    let backend = state.backend().get().await?;
    ensure_admin_account(&backend, admin).await
}

async fn ensure_admin_account(backend: &Backend, admin: &AdminSettings) -> anyhow::Result<()> {
    let email = &admin.first_admin_email;

    if let Some(profile) = repositories::profiles::find_by_email(backend.store(), email).await? {
        if profile.role == Role::Admin {
            tracing::info!(email = %email, "Default admin already up to date");
            return Ok(());
        }

        let mut patch = Row::new();
        patch.insert("role".into(), Value::from(Role::Admin.as_str()));
        repositories::profiles::update(backend.store(), &profile.id, patch).await?;
        tracing::info!(email = %email, previous_role = profile.role.as_str(), "Promoted default admin");
        return Ok(());
    }

    let account = NewAccount {
        email: email.clone(),
        password: admin.first_admin_password.clone(),
        full_name: admin.first_admin_name.clone(),
        role: Role::Admin,
        gender: None,
        department: None,
        reg_number: None,
    };

    match accounts::provision(backend, &account).await {
        Ok(profile) => {
            tracing::info!(email = %email, user_id = %profile.id, "Created default admin");
            Ok(())
        }
        // Identity left over from an earlier run without a profile row.
        Err(err) if err.is_duplicate() => {
            let session =
                backend.identity().verify_password(email, &admin.first_admin_password).await?;
            let profile = NewProfile {
                id: session.user_id,
                email: email.clone(),
                full_name: admin.first_admin_name.clone(),
                role: Role::Admin,
                department: None,
                reg_number: None,
                gender: None,
            };
            let profile = repositories::profiles::insert(backend.store(), &profile).await?;
            tracing::info!(email = %email, user_id = %profile.id, "Restored default admin profile");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
