//! Ownership validation of canonical service account names
//!
//! A canonical name is only touched by this controller when it has the shape
//! `projects/{P}/serviceAccounts/{local}@{P}.iam.gserviceaccount.com` with both
//! `{P}` equal to the governed project. The configured [`OwnershipPolicy`] adds a
//! second check on the local part (prefix) or on the display name.

use crate::config::OwnershipPolicy;
use crate::constants::SERVICE_ACCOUNT_EMAIL_DOMAIN;
use crate::provider::IamError;
use anyhow::Context;
use regex::Regex;

/// Structural and policy checks for canonical names
#[derive(Debug, Clone)]
pub struct OwnershipValidator {
    pattern: Regex,
    policy: OwnershipPolicy,
}

impl OwnershipValidator {
    /// # Errors
    /// Returns an error if the project id produces an invalid pattern
    #[allow(
        clippy::missing_errors_doc,
        reason = "Error documentation is provided in doc comments"
    )]
    pub fn new(project_id: &str, policy: OwnershipPolicy) -> anyhow::Result<Self> {
        let project = regex::escape(project_id);
        let domain = regex::escape(SERVICE_ACCOUNT_EMAIL_DOMAIN);
        let pattern = Regex::new(&format!(
            r"^projects/{project}/serviceAccounts/([a-z][a-z0-9-]*)@{project}\.{domain}$"
        ))
        .context("Failed to compile ownership pattern")?;

        Ok(Self { pattern, policy })
    }

    /// Check the structural pattern and, for the prefix policy, the local part
    ///
    /// Returns the local part of the email on success.
    pub fn validate_name<'a>(&self, canonical_name: &'a str) -> Result<&'a str, IamError> {
        let local_part = self
            .pattern
            .captures(canonical_name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| {
                IamError::policy_violation(
                    canonical_name,
                    "name does not belong to the governed project",
                )
            })?;

        if let OwnershipPolicy::Prefix(prefix) = &self.policy {
            if !local_part.starts_with(&format!("{prefix}-")) {
                return Err(IamError::policy_violation(
                    canonical_name,
                    format!("account id does not carry the '{prefix}-' prefix"),
                ));
            }
        }

        Ok(local_part)
    }

    /// Whether the display name policy needs the account's display name
    pub fn requires_display_name(&self) -> bool {
        matches!(self.policy, OwnershipPolicy::DisplayName(_))
    }

    /// Check a display name against the display name policy
    pub fn validate_display_name(
        &self,
        canonical_name: &str,
        display_name: &str,
    ) -> Result<(), IamError> {
        match &self.policy {
            OwnershipPolicy::DisplayName(local_project_id) => {
                let owned = display_name
                    .strip_prefix(local_project_id.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
                    .is_some_and(|logical_name| !logical_name.is_empty());
                if owned {
                    Ok(())
                } else {
                    Err(IamError::policy_violation(
                        canonical_name,
                        format!(
                            "display name '{display_name}' is not owned by '{local_project_id}'"
                        ),
                    ))
                }
            }
            OwnershipPolicy::Prefix(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix_validator() -> OwnershipValidator {
        OwnershipValidator::new("sa-container", OwnershipPolicy::Prefix("dev".to_string()))
            .expect("validator should build")
    }

    fn display_validator() -> OwnershipValidator {
        OwnershipValidator::new(
            "sa-container",
            OwnershipPolicy::DisplayName("my-dev-project".to_string()),
        )
        .expect("validator should build")
    }

    #[test]
    fn test_accepts_owned_prefixed_name() {
        let validator = prefix_validator();
        let local = validator
            .validate_name(
                "projects/sa-container/serviceAccounts/dev-api-abcd@sa-container.iam.gserviceaccount.com",
            )
            .expect("name should be owned");
        assert_eq!(local, "dev-api-abcd");
    }

    #[test]
    fn test_rejects_foreign_project() {
        let validator = prefix_validator();
        for name in [
            "projects/other/serviceAccounts/dev-api-abcd@other.iam.gserviceaccount.com",
            "projects/sa-container/serviceAccounts/dev-api-abcd@other.iam.gserviceaccount.com",
            "projects/other/serviceAccounts/dev-api-abcd@sa-container.iam.gserviceaccount.com",
        ] {
            assert!(
                matches!(
                    validator.validate_name(name),
                    Err(IamError::PolicyViolation { .. })
                ),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_malformed_names() {
        let validator = prefix_validator();
        for name in [
            "",
            "dev-api-abcd@sa-container.iam.gserviceaccount.com",
            "projects/sa-container/serviceAccounts/dev-api-abcd",
            "projects/sa-container/serviceAccounts/dev-api-abcd@sa-container.iam.gserviceaccount.com/keys/1",
            "projects/sa-containerX/serviceAccounts/dev-api-abcd@sa-containerX.iam.gserviceaccount.com",
            "projects/sa-container/serviceAccounts/dev-api-abcd@sa-container.iamXgserviceaccount.com",
        ] {
            assert!(validator.validate_name(name).is_err(), "{name} should be rejected");
        }
    }

    #[test]
    fn test_rejects_missing_prefix() {
        let validator = prefix_validator();
        let result = validator.validate_name(
            "projects/sa-container/serviceAccounts/prod-api-abcd@sa-container.iam.gserviceaccount.com",
        );
        assert!(matches!(result, Err(IamError::PolicyViolation { .. })));
    }

    #[test]
    fn test_display_name_policy() {
        let validator = display_validator();
        let name =
            "projects/sa-container/serviceAccounts/api-abcd@sa-container.iam.gserviceaccount.com";
        assert!(validator.validate_name(name).is_ok());
        assert!(validator.requires_display_name());
        assert!(validator.validate_display_name(name, "my-dev-project/api").is_ok());
        assert!(validator.validate_display_name(name, "other-project/api").is_err());
        assert!(validator.validate_display_name(name, "my-dev-project/").is_err());
        assert!(validator.validate_display_name(name, "my-dev-projectx/api").is_err());
    }
}
