//! Service principal credentials and output redaction.
//!
//! Tool output can echo the connection string, so every value that goes
//! into it (client id, tenant id, client secret) is scrubbed before output
//! leaves the orchestration.

use std::fmt;

/// Replacement text for redacted values.
pub const REDACTED: &str = "***";

/// Environment variable holding the service principal client id.
pub const ENV_CLIENT_ID: &str = "ClientId";
/// Environment variable holding the Azure AD tenant id.
pub const ENV_TENANT_ID: &str = "TenantId";
/// Environment variable holding the service principal secret.
pub const ENV_CLIENT_SECRET: &str = "ClientSecret";

/// Service principal used by the tool to authenticate against the model.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub tenant_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        tenant_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            tenant_id: tenant_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Read credentials from the process environment. Unset values are empty.
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).unwrap_or_default();
        Self {
            client_id: read(ENV_CLIENT_ID),
            tenant_id: read(ENV_TENANT_ID),
            client_secret: read(ENV_CLIENT_SECRET),
        }
    }

    /// `User ID` value of the connection string.
    pub fn user_id(&self) -> String {
        format!("app:{}@{}", self.client_id, self.tenant_id)
    }

    pub fn is_complete(&self) -> bool {
        !(self.client_id.is_empty() || self.tenant_id.is_empty() || self.client_secret.is_empty())
    }

    pub fn redactor(&self) -> Redactor {
        Redactor::new([
            self.client_id.as_str(),
            self.tenant_id.as_str(),
            self.client_secret.as_str(),
        ])
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &REDACTED)
            .field("tenant_id", &REDACTED)
            .field("client_secret", &REDACTED)
            .finish()
    }
}

/// Replaces known secret values with [`REDACTED`].
#[derive(Clone, Default)]
pub struct Redactor {
    /// Longest first, so a secret containing another is scrubbed whole.
    secrets: Vec<String>,
}

impl Redactor {
    pub fn new<'a>(secrets: impl IntoIterator<Item = &'a str>) -> Self {
        let mut secrets: Vec<String> = secrets
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        secrets.sort_by(|a, b| b.len().cmp(&a.len()));
        secrets.dedup();
        Self { secrets }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for secret in &self.secrets {
            if out.contains(secret.as_str()) {
                out = out.replace(secret.as_str(), REDACTED);
            }
        }
        out
    }
}

impl fmt::Debug for Redactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redactor")
            .field("secrets", &self.secrets.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("client-123", "tenant-456", "s3cr3t")
    }

    #[test]
    fn redacts_all_three_values() {
        let text = "User ID=app:client-123@tenant-456; Password=s3cr3t";
        let redacted = creds().redactor().redact(text);
        assert_eq!(redacted, "User ID=app:***@***; Password=***");
    }

    #[test]
    fn redacts_every_occurrence() {
        let redacted = creds().redactor().redact("s3cr3t and s3cr3t again");
        assert!(!redacted.contains("s3cr3t"));
        assert_eq!(redacted.matches(REDACTED).count(), 2);
    }

    #[test]
    fn empty_secrets_are_ignored() {
        let redactor = Credentials::default().redactor();
        assert_eq!(redactor.redact("plain output"), "plain output");
    }

    #[test]
    fn overlapping_secrets_scrub_longest_first() {
        let redactor = Redactor::new(["abc", "abcdef"]);
        assert_eq!(redactor.redact("xx abcdef yy"), "xx *** yy");
    }

    #[test]
    fn debug_output_hides_values() {
        let debug = format!("{:?}", creds());
        assert!(!debug.contains("s3cr3t"));
        assert!(!debug.contains("client-123"));
    }

    #[test]
    fn user_id_format() {
        assert_eq!(creds().user_id(), "app:client-123@tenant-456");
        assert!(creds().is_complete());
        assert!(!Credentials::default().is_complete());
    }
}
