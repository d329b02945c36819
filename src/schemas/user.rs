use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::Profile;
use crate::db::types::{Gender, Role};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct UserRegister {
    #[validate(email(message = "Invalid email address"))]
    pub(crate) email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    pub(crate) password: String,
    #[serde(alias = "fullName")]
    #[validate(length(min = 1, max = 200, message = "full_name must not be empty"))]
    pub(crate) full_name: String,
    #[serde(default = "default_role")]
    pub(crate) role: Role,
    #[serde(default)]
    pub(crate) gender: Option<Gender>,
    #[serde(default)]
    pub(crate) department: Option<String>,
    #[serde(default)]
    #[serde(alias = "regNumber")]
    pub(crate) reg_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct UserLogin {
    #[validate(email(message = "Invalid email address"))]
    pub(crate) email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub(crate) password: String,
}

/// Partial profile update; absent and null fields are left untouched.
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub(crate) struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(alias = "fullName")]
    #[validate(length(min = 1, max = 200, message = "full_name must not be empty"))]
    pub(crate) full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(alias = "regNumber")]
    pub(crate) reg_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserListQuery {
    #[serde(default)]
    pub(crate) role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserSummary {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) full_name: String,
    pub(crate) role: Role,
}

impl From<&Profile> for UserSummary {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id.clone(),
            email: profile.email.clone(),
            full_name: profile.full_name.clone(),
            role: profile.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RegisterResponse {
    pub(crate) message: String,
    pub(crate) user: UserSummary,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserCreatedResponse {
    pub(crate) message: String,
    pub(crate) user_id: String,
}

/// Public identity of a student attached to a submission listing.
#[derive(Debug, Serialize)]
pub(crate) struct StudentBrief {
    pub(crate) full_name: String,
    pub(crate) email: String,
    pub(crate) reg_number: Option<String>,
}

impl From<Profile> for StudentBrief {
    fn from(profile: Profile) -> Self {
        Self { full_name: profile.full_name, email: profile.email, reg_number: profile.reg_number }
    }
}

fn default_role() -> Role {
    Role::Student
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_defaults_to_student() {
        let payload: UserRegister = serde_json::from_value(json!({
            "email": "a@x.com",
            "password": "pw123456",
            "full_name": "Ana"
        }))
        .expect("payload");
        assert_eq!(payload.role, Role::Student);
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn register_rejects_short_password_and_bad_email() {
        let payload: UserRegister = serde_json::from_value(json!({
            "email": "not-an-email",
            "password": "short",
            "full_name": "Ana"
        }))
        .expect("payload");
        let errors = payload.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn update_serializes_only_present_fields() {
        let update: UserUpdate =
            serde_json::from_value(json!({ "role": "teacher", "department": null })).expect("update");
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({ "role": "teacher" }));
    }
}
