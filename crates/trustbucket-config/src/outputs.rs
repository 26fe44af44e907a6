// Stack outputs as persisted in outputs.json
//
// On disk: a JSON array of {OutputKey, OutputValue} objects exactly as the
// stack-describe call returns them. In memory: a flat key -> value mapping.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known output keys exposed by the stack template
pub mod output_keys {
    pub const BUCKET_NAME: &str = "BucketName";
    pub const BUCKET_ARN: &str = "BucketArn";
    pub const ROLE_ARN: &str = "RoleArn";
    pub const REGION: &str = "Region";
    pub const TRUST_ACCOUNT_ONE: &str = "TrustAccountOne";
    pub const TRUST_ACCOUNT_TWO: &str = "TrustAccountTwo";
}

/// One stack output as returned by CloudFormation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackOutput {
    pub output_key: String,
    pub output_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_name: Option<String>,
}

impl StackOutput {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            output_key: key.into(),
            output_value: value.into(),
            description: None,
            export_name: None,
        }
    }
}

/// Parse the JSON produced by a stack-describe call.
///
/// A stack without outputs describes as `null`, which reads as no outputs.
pub fn parse_stack_outputs(json: &str) -> Result<Vec<StackOutput>, serde_json::Error> {
    let outputs: Option<Vec<StackOutput>> = serde_json::from_str(json)?;
    Ok(outputs.unwrap_or_default())
}

/// Flat view of the last deployed stack outputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputsRecord {
    values: BTreeMap<String, String>,
}

impl OutputsRecord {
    pub fn from_outputs(outputs: &[StackOutput]) -> Self {
        let values = outputs
            .iter()
            .map(|o| (o.output_key.clone(), o.output_value.clone()))
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Like `get`, but an absent or empty value is an error
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingOutput {
                key: key.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for OutputsRecord {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
