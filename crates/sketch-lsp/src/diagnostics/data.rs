//! Typed repair data carried in `Diagnostic::data`.
//!
//! On the wire every payload is a flat JSON object next to `source`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope stored in `Diagnostic::data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticData {
    /// Document URI or workspace path the diagnostic was produced for.
    pub source: String,
    #[serde(flatten)]
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Schema(SchemaFix),
    Failure(ToolFailure),
    Property(PropertyFix),
    Toolchain(ToolchainFix),
}

/// A property and the value that repairs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyFix {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
}

impl PropertyFix {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            installed: None,
            latest: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaFix {
    pub error: SchemaViolation,
}

/// One schema (or syntax) violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaViolation {
    /// Failing schema keyword, `syntax` for parse errors.
    pub keyword: String,
    /// JSON pointer of the offending instance.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainFix {
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub name: String,
    pub reason: String,
}

impl DiagnosticData {
    pub fn new(source: impl Into<String>, payload: Payload) -> Self {
        Self {
            source: source.into(),
            payload,
        }
    }

    pub fn from_value(value: Option<&Value>) -> Option<Self> {
        serde_json::from_value(value?.clone()).ok()
    }

    pub fn to_value(&self) -> Option<Value> {
        serde_json::to_value(self).ok()
    }

    pub fn property(&self) -> Option<&PropertyFix> {
        match &self.payload {
            Payload::Property(fix) => Some(fix),
            _ => None,
        }
    }

    pub fn schema(&self) -> Option<&SchemaViolation> {
        match &self.payload {
            Payload::Schema(fix) => Some(&fix.error),
            _ => None,
        }
    }

    pub fn toolchain(&self) -> Option<&ToolchainFix> {
        match &self.payload {
            Payload::Toolchain(fix) => Some(fix),
            _ => None,
        }
    }
}

impl From<PropertyFix> for Payload {
    fn from(fix: PropertyFix) -> Self {
        Payload::Property(fix)
    }
}

impl From<SchemaViolation> for Payload {
    fn from(error: SchemaViolation) -> Self {
        Payload::Schema(SchemaFix { error })
    }
}

impl From<ToolchainFix> for Payload {
    fn from(fix: ToolchainFix) -> Self {
        Payload::Toolchain(fix)
    }
}

impl From<ToolFailure> for Payload {
    fn from(fix: ToolFailure) -> Self {
        Payload::Failure(fix)
    }
}
