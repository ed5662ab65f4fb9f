//! Job descriptors, submission validation, and instance identity.
//!
//! A [`JobDescriptor`] names the model a pipeline run targets. It is
//! validated once at the submission boundary and is immutable afterwards.
//! [`InstanceId`] is derived from the `(server, model)` pair and is the key
//! used to deduplicate concurrent runs against the same model.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Prefix of every derived instance id.
pub const INSTANCE_ID_PREFIX: &str = "Process";

/// URL scheme of an Azure Analysis Services server.
pub const ANALYSIS_SERVICES_SCHEME: &str = "asazure://";

/// URL scheme of a Power BI Premium workspace.
pub const POWER_BI_SCHEME: &str = "powerbi://";

/// Lead sentence of the rejection message for incomplete submissions.
pub const MISSING_PARAMETERS_MESSAGE: &str = "One or more parameters were missing.";

/// Explains the two supported connection shapes. Appended to validation
/// failures so callers can fix their payload without reading docs.
pub const CONNECTION_SHAPES_EXPLANATION: &str = "When connecting to an Azure Analysis \
Services instance, 'BaseURL' must look like asazure://<region>.asazure.windows.net/ and \
'Server', 'Model' and 'BatchName' must be valid. When connecting to a Power BI Premium \
dataset, 'BaseURL' must look like powerbi://api.powerbi.com/v1.0/myorg/, 'Server' is the \
Power BI workspace, 'Model' is the dataset, and 'BatchName' must be valid.";

// ---------------------------------------------------------------------------
// JobDescriptor
// ---------------------------------------------------------------------------

/// Target of one pipeline run.
///
/// Field names on the wire keep the PascalCase shape existing callers send.
/// Missing and `null` fields deserialize as empty strings so that
/// [`validate`] can report every absent field in one response.
///
/// [`validate`]: JobDescriptor::validate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    #[serde(rename = "BaseURL", default, deserialize_with = "null_as_empty")]
    pub base_url: String,
    #[serde(rename = "Server", default, deserialize_with = "null_as_empty")]
    pub server: String,
    #[serde(rename = "Model", default, deserialize_with = "null_as_empty")]
    pub model: String,
    #[serde(rename = "BatchName", default, deserialize_with = "null_as_empty")]
    pub batch_name: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Which kind of tabular server a descriptor points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionTarget {
    AnalysisServices,
    PowerBiPremium,
    /// Scheme not recognised. Still passed through to the tool unchanged.
    Unknown,
}

impl JobDescriptor {
    pub fn new(
        base_url: impl Into<String>,
        server: impl Into<String>,
        model: impl Into<String>,
        batch_name: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            server: server.into(),
            model: model.into(),
            batch_name: batch_name.into(),
        }
    }

    /// Names of required fields that are empty or whitespace-only, in
    /// declaration order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("BaseURL", &self.base_url),
            ("Server", &self.server),
            ("Model", &self.model),
            ("BatchName", &self.batch_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Reject descriptors with any required field missing.
    pub fn validate(&self) -> Result<(), CoreError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            return Ok(());
        }
        Err(CoreError::Validation(format!(
            "{MISSING_PARAMETERS_MESSAGE} Missing: {}. {CONNECTION_SHAPES_EXPLANATION}",
            missing.join(", ")
        )))
    }

    /// Identity used by the dedup gate.
    pub fn instance_id(&self) -> InstanceId {
        InstanceId::derive(&self.server, &self.model)
    }

    pub fn connection_target(&self) -> ConnectionTarget {
        let base = self.base_url.trim().to_ascii_lowercase();
        if base.starts_with(ANALYSIS_SERVICES_SCHEME) {
            ConnectionTarget::AnalysisServices
        } else if base.starts_with(POWER_BI_SCHEME) {
            ConnectionTarget::PowerBiPremium
        } else {
            ConnectionTarget::Unknown
        }
    }

    /// `Data Source` value for the tool's connection string.
    pub fn data_source(&self) -> String {
        format!("{}{}", self.base_url, self.server)
    }
}

// ---------------------------------------------------------------------------
// InstanceId
// ---------------------------------------------------------------------------

/// Stable identity of an orchestration instance: `Process-{server}-{model}`.
///
/// `-` and `~` inside either component are escaped as `~-` and `~~`, so the
/// mapping stays injective (`("a-b", "c")` and `("a", "b-c")` differ) while
/// ordinary names keep their readable form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn derive(server: &str, model: &str) -> Self {
        Self(format!(
            "{INSTANCE_ID_PREFIX}-{}-{}",
            escape_component(server),
            escape_component(model)
        ))
    }

    /// Wrap a raw id, e.g. one taken from a request path.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn escape_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '~' => out.push_str("~~"),
            '-' => out.push_str("~-"),
            other => out.push(other),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
