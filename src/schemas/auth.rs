use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: String,
    /// The stored profile, or `{id, email}` when the profile row is missing.
    pub(crate) user: Value,
}
