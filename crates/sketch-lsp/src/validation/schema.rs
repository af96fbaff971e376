//! Structural validation against the embedded project schema.

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, JSONSchema};
use serde_json::Value as Json;
use sketch_syntax::{TextRange, TextSize, Value};
use tower_lsp::lsp_types::Diagnostic;

use super::Subject;
use crate::diagnostics::{self, DiagnosticCode, DiagnosticData, SchemaViolation};

const PROJECT_SCHEMA: &str = include_str!("../../schema/sketch-project.schema.json");

#[derive(Debug, thiserror::Error)]
#[error("project schema failed to compile: {0}")]
pub struct SchemaCompileError(String);

/// Compiled project schema.
pub struct SchemaValidator {
    schema: Json,
    compiled: JSONSchema,
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator").finish_non_exhaustive()
    }
}

impl SchemaValidator {
    /// Compiles the embedded schema.
    pub fn new() -> Result<Self, SchemaCompileError> {
        let schema =
            serde_json::from_str(PROJECT_SCHEMA).map_err(|err| SchemaCompileError(err.to_string()))?;
        Self::from_schema(schema)
    }

    pub fn from_schema(schema: Json) -> Result<Self, SchemaCompileError> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema)
            .map_err(|err| SchemaCompileError(err.to_string()))?;
        Ok(Self { schema, compiled })
    }

    /// Syntax errors come first and suppress schema validation.
    pub fn validate(&self, subject: &Subject<'_>) -> Vec<Diagnostic> {
        let document = subject.document;
        let errors = document.parse().errors();
        if !errors.is_empty() {
            return errors
                .iter()
                .map(|error| {
                    let violation = SchemaViolation {
                        keyword: "syntax".to_string(),
                        path: String::new(),
                        property: None,
                        message: error.message.clone(),
                        suggestion: None,
                    };
                    self.diagnostic(subject, error.range, violation)
                })
                .collect();
        }

        let Some(root) = document.root() else {
            return Vec::new();
        };
        let instance = root.to_json();
        let Err(errors) = self.compiled.validate(&instance) else {
            return Vec::new();
        };

        let mut found: Vec<(TextRange, SchemaViolation)> = errors
            .map(|error| {
                let path = error.instance_path.to_string();
                let segments = pointer_segments(&path);
                let keyword = pointer_segments(&error.schema_path.to_string())
                    .pop()
                    .unwrap_or_default();

                let (property, range) = match &error.kind {
                    ValidationErrorKind::Required { property } => {
                        let object = root.lookup(segments.iter().map(String::as_str));
                        let range = object.map_or(root.range, opening_brace);
                        (property.as_str().map(str::to_string), range)
                    }
                    _ => {
                        let value = root.lookup(segments.iter().map(String::as_str));
                        (segments.last().cloned(), value.map_or(root.range, |v| v.range))
                    }
                };

                let mut schema_path: Vec<&str> = segments.iter().map(String::as_str).collect();
                if let (ValidationErrorKind::Required { .. }, Some(name)) = (&error.kind, &property) {
                    schema_path.push(name);
                }
                let suggestion = suggestion_for(&self.schema, &schema_path);

                let violation = SchemaViolation {
                    keyword,
                    path,
                    property,
                    message: error.to_string(),
                    suggestion,
                };
                (range, violation)
            })
            .collect();

        found.sort_by(|(left, a), (right, b)| {
            left.start()
                .cmp(&right.start())
                .then_with(|| a.message.cmp(&b.message))
        });
        // One diagnostic per value: a wrong value failing several keywords
        // with the same fix is reported once.
        found.dedup_by(|(range, later), (kept_range, kept)| {
            let same_fix = range == kept_range
                && later.path == kept.path
                && later.keyword != "required"
                && kept.keyword != "required"
                && later.suggestion == kept.suggestion;
            if same_fix {
                kept.message = format!("{}; {}", kept.message, later.message);
            }
            same_fix
        });
        found
            .into_iter()
            .map(|(range, violation)| self.diagnostic(subject, range, violation))
            .collect()
    }

    fn diagnostic(
        &self,
        subject: &Subject<'_>,
        range: TextRange,
        violation: SchemaViolation,
    ) -> Diagnostic {
        let detail = violation.message.clone();
        diagnostics::build(
            DiagnosticCode::InvalidContent,
            subject.range(range),
            Some(&detail),
            DiagnosticData::new(subject.source, violation.into()),
        )
    }
}

fn opening_brace(object: &Value) -> TextRange {
    TextRange::at(object.range.start(), TextSize::from(1))
}

/// Splits a JSON pointer into unescaped segments.
pub(crate) fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// The schema's `const`, else `default`, else first `enum` option.
fn suggestion_for(schema: &Json, path: &[&str]) -> Option<Json> {
    let mut node = schema;
    for segment in path {
        node = node.get("properties")?.get(*segment)?;
    }
    node.get("const")
        .or_else(|| node.get("default"))
        .or_else(|| node.get("enum").and_then(|options| options.get(0)))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ConfigDocument;
    use crate::validation::Anchor;
    use serde_json::json;

    fn validate(text: &str) -> Vec<Diagnostic> {
        let validator = SchemaValidator::new().expect("embedded schema compiles");
        let document = ConfigDocument::new(text);
        let subject = Subject::new(&document, "file:///ws/sketch-project.json", Anchor::Property);
        validator.validate(&subject)
    }

    fn violation(diagnostic: &Diagnostic) -> SchemaViolation {
        DiagnosticData::from_value(diagnostic.data.as_ref())
            .and_then(|data| data.schema().cloned())
            .expect("schema violation")
    }

    #[test]
    fn valid_document_has_no_diagnostics() {
        let diagnostics = validate(
            r#"{ "version": "0.0.1", "cliVersion": "0.35.3", "port": "COM3", "board": "a:b:c" }"#,
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
    }

    #[test]
    fn syntax_errors_suppress_schema_checks() {
        // Missing required properties would also be reported without the syntax error.
        let diagnostics = validate(r#"{ "port": "COM3" "#);
        assert_eq!(diagnostics.len(), 1);
        let error = violation(&diagnostics[0]);
        assert_eq!(error.keyword, "syntax");
        assert_eq!(error.suggestion, None);
        assert_eq!(diagnostics[0].message, "Invalid content. expected `}`");
    }

    #[test]
    fn missing_property_is_anchored_at_the_opening_brace() {
        let text = "\n  { \"version\": \"0.0.1\", \"cliVersion\": \"\", \"board\": \"a:b:c\" }";
        let diagnostics = validate(text);
        assert_eq!(diagnostics.len(), 1, "{diagnostics:?}");

        let error = violation(&diagnostics[0]);
        assert_eq!(error.keyword, "required");
        assert_eq!(error.property.as_deref(), Some("port"));
        assert_eq!(error.suggestion, Some(json!("")));
        assert_eq!(diagnostics[0].range.start.line, 1);
        assert_eq!(diagnostics[0].range.start.character, 2);
        assert_eq!(diagnostics[0].range.end.character, 3);
    }

    #[test]
    fn const_violation_suggests_the_constant() {
        let diagnostics = validate(
            r#"{ "version": "9", "cliVersion": "0.35.3", "port": "COM3", "board": "a:b:c" }"#,
        );
        assert_eq!(diagnostics.len(), 1, "{diagnostics:?}");

        let error = violation(&diagnostics[0]);
        assert_eq!(error.keyword, "const");
        assert_eq!(error.path, "/version");
        assert_eq!(error.property.as_deref(), Some("version"));
        assert_eq!(error.suggestion, Some(json!("0.0.1")));
        // The range covers the quoted value "9".
        assert_eq!(diagnostics[0].range.start.character, 13);
        assert_eq!(diagnostics[0].range.end.character, 16);
    }

    #[test]
    fn every_violation_is_reported_in_source_order() {
        let diagnostics = validate(r#"{ "version": "0.0.1", "cliVersion": 1, "board": "uno" }"#);
        let keywords: Vec<_> = diagnostics
            .iter()
            .map(|diagnostic| violation(diagnostic).keyword)
            .collect();
        assert_eq!(keywords, vec!["required", "type", "pattern"]);
    }

    #[test]
    fn value_failing_several_keywords_is_reported_once() {
        let diagnostics = validate(
            r#"{ "version": 1, "cliVersion": "0.35.3", "port": "COM3", "board": "a:b:c" }"#,
        );
        assert_eq!(diagnostics.len(), 1, "{diagnostics:?}");

        let error = violation(&diagnostics[0]);
        assert_eq!(error.path, "/version");
        assert_eq!(error.suggestion, Some(json!("0.0.1")));
        assert!(error.message.contains("is not of type"), "{}", error.message);
        assert!(error.message.contains("was expected"), "{}", error.message);
    }

    #[test]
    fn pointer_segments_unescape() {
        assert_eq!(pointer_segments(""), Vec::<String>::new());
        assert_eq!(pointer_segments("/a~1b/c~0d"), vec!["a/b", "c~d"]);
    }

    #[test]
    fn broken_schema_fails_to_compile() {
        let err = SchemaValidator::from_schema(json!({ "type": 12 })).expect_err("invalid schema");
        assert!(err.to_string().starts_with("project schema failed to compile"));
    }
}
