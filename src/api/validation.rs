use validator::{Validate, ValidationErrors};

use crate::api::errors::ApiError;

/// Runs the payload's `validator` rules and folds every failure into one detail line.
pub(crate) fn validate_payload<T: Validate>(payload: &T) -> Result<(), ApiError> {
    payload.validate().map_err(|errors| ApiError::BadRequest(describe(&errors)))
}

fn describe(errors: &ValidationErrors) -> String {
    let mut messages = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, failures)| {
            failures.iter().map(move |failure| match &failure.message {
                Some(message) => message.to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .collect::<Vec<_>>();
    messages.sort();

    if messages.is_empty() {
        "Invalid request payload".to_string()
    } else {
        messages.join("; ")
    }
}
