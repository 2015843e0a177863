//! Service account id and display name generation
//!
//! Account ids are limited to 30 characters of `[a-z0-9-]`, start with a letter
//! and do not end with a dash. The logical name is truncated to fit, and a
//! random suffix keeps ids for similar names apart.

use crate::constants::{
    ACCOUNT_ID_SUFFIX_LENGTH, MAX_ACCOUNT_ID_LENGTH, MAX_DISPLAY_NAME_LENGTH,
    MAX_LOGICAL_NAME_LENGTH, MIN_LOGICAL_NAME_LENGTH, SERVICE_ACCOUNT_EMAIL_DOMAIN,
};
use crate::provider::IamError;
use rand::Rng;

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Reject logical names outside the accepted length range
pub fn validate_logical_name(logical_name: &str) -> Result<(), IamError> {
    let length = logical_name.trim().chars().count();
    if length < MIN_LOGICAL_NAME_LENGTH {
        return Err(IamError::Validation(format!(
            "service account name '{logical_name}' is too short; use at least {MIN_LOGICAL_NAME_LENGTH} characters"
        )));
    }
    if length > MAX_LOGICAL_NAME_LENGTH {
        return Err(IamError::Validation(format!(
            "service account name '{logical_name}' is too long; use at most {MAX_LOGICAL_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Random lowercase suffix for account ids
pub fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..ACCOUNT_ID_SUFFIX_LENGTH)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// Build `{prefix-}{name}-{suffix}` within the account id budget
pub fn account_id(prefix: Option<&str>, logical_name: &str, suffix: &str) -> String {
    let sanitized = sanitize(logical_name);
    let base = match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}-{sanitized}"),
        _ => sanitized,
    };

    let budget = MAX_ACCOUNT_ID_LENGTH - suffix.len() - 1;
    let truncated: String = base.chars().take(budget).collect();
    let truncated = truncated.trim_end_matches('-');

    // ids must start with a letter
    if truncated.starts_with(|c: char| c.is_ascii_lowercase()) {
        format!("{truncated}-{suffix}")
    } else {
        let truncated: String = truncated.chars().take(budget - "sa-".len()).collect();
        format!("sa-{}-{suffix}", truncated.trim_end_matches('-'))
    }
}

/// Display name embedding the owning token, `{token}/{name}`
pub fn display_name(token: &str, logical_name: &str) -> String {
    format!("{token}/{logical_name}")
        .chars()
        .take(MAX_DISPLAY_NAME_LENGTH)
        .collect()
}

/// Service account email for an id in `project_id`
pub fn account_email(project_id: &str, account_id: &str) -> String {
    format!("{account_id}@{project_id}.{SERVICE_ACCOUNT_EMAIL_DOMAIN}")
}

fn sanitize(logical_name: &str) -> String {
    let mapped: String = logical_name
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' })
        .collect();

    let mut collapsed = String::with_capacity(mapped.len());
    for c in mapped.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed.trim_matches('-').to_string()
}
