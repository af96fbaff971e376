//! Project document validation.
//!
//! Schema validation always runs first. The semantic checks consult the
//! toolchain and the release feed and only run on schema-clean documents.

mod pipeline;
mod schema;
mod semantic;

pub use pipeline::{run as run_pass, PassPhase, Publisher};
pub(crate) use schema::pointer_segments;
pub use schema::{SchemaCompileError, SchemaValidator};

use serde::Serialize;
use std::path::Path;
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, Range};
use tracing::{debug, info};

use sketch_syntax::{TextRange, ValueKind};

use crate::config::ServerSettings;
use crate::diagnostics::{
    self, DiagnosticCode, DiagnosticData, PropertyFix, ToolchainFix, NO_RANGE,
};
use crate::document::ConfigDocument;
use crate::external::{Catalogue, EnvironmentNotice};

/// Where diagnostics of a pass are anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// At the offending property in the open document.
    Property,
    /// At the whole-document sentinel range (project checks).
    Document,
}

/// The document under validation plus provenance.
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    pub document: &'a ConfigDocument,
    /// Document URI or workspace path, recorded in every diagnostic's data.
    pub source: &'a str,
    pub anchor: Anchor,
}

impl<'a> Subject<'a> {
    pub fn new(document: &'a ConfigDocument, source: &'a str, anchor: Anchor) -> Self {
        Self {
            document,
            source,
            anchor,
        }
    }

    pub fn range(&self, range: TextRange) -> Range {
        match self.anchor {
            Anchor::Property => self.document.range(range),
            Anchor::Document => NO_RANGE,
        }
    }
}

/// Diagnostics plus the notices to raise outside the diagnostic list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationOutcome {
    pub diagnostics: Vec<Diagnostic>,
    pub notices: Vec<EnvironmentNotice>,
}

/// Schema first; semantic checks only when the schema found nothing.
pub async fn validate_document(
    subject: &Subject<'_>,
    schema: &SchemaValidator,
    catalogue: &Catalogue,
    settings: &ServerSettings,
) -> ValidationOutcome {
    let diagnostics = schema.validate(subject);
    if !diagnostics.is_empty() {
        debug!(
            "{}: {} schema diagnostic(s), skipping semantic checks",
            subject.source,
            diagnostics.len()
        );
        return ValidationOutcome {
            diagnostics,
            notices: Vec::new(),
        };
    }
    semantic::validate(subject, catalogue, settings).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectStatus {
    Valid,
    Invalid,
    NotFound,
}

/// Result of `sketch.checkProject`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectReport {
    pub status: ProjectStatus,
    pub diagnostics: Vec<Diagnostic>,
}

/// Validates the project document of a workspace from disk.
pub async fn check_project(
    root: &Path,
    settings: &ServerSettings,
    schema: &SchemaValidator,
    catalogue: &Catalogue,
) -> ProjectReport {
    let source = root.display().to_string();
    let Some((path, text)) = settings
        .project_files()
        .find_map(|path| std::fs::read_to_string(&path).ok().map(|text| (path, text)))
    else {
        let path = settings
            .project_files()
            .next()
            .unwrap_or_else(|| root.to_path_buf())
            .display()
            .to_string();
        info!("no project document at {path}");
        let data = DiagnosticData::new(&source, PropertyFix::new("file", &path).into());
        return ProjectReport {
            status: ProjectStatus::NotFound,
            diagnostics: vec![diagnostics::build(
                DiagnosticCode::FileNotFound,
                NO_RANGE,
                Some(&path),
                data,
            )],
        };
    };

    let document = ConfigDocument::new(&text);
    let parsed_object = document.parse().ok()
        && document
            .root()
            .is_some_and(|root| matches!(root.kind, ValueKind::Object(_)));
    if !parsed_object {
        let path = path.display().to_string();
        let data = DiagnosticData::new(&source, PropertyFix::new("file", &path).into());
        return ProjectReport {
            status: ProjectStatus::Invalid,
            diagnostics: vec![diagnostics::build(
                DiagnosticCode::InvalidProject,
                NO_RANGE,
                Some(&path),
                data,
            )],
        };
    }

    let subject = Subject::new(&document, &source, Anchor::Document);
    let outcome = validate_document(&subject, schema, catalogue, settings).await;
    let mut diagnostics = outcome.diagnostics;
    diagnostics.extend(outcome.notices.iter().map(|notice| {
        diagnostics::build(
            DiagnosticCode::ToolchainNotInstalled,
            NO_RANGE,
            Some(&notice.message),
            DiagnosticData::new(
                &source,
                ToolchainFix {
                    version: notice.version.clone(),
                }
                .into(),
            ),
        )
    }));

    let invalid = diagnostics
        .iter()
        .any(|diagnostic| diagnostic.severity == Some(DiagnosticSeverity::ERROR));
    ProjectReport {
        status: if invalid {
            ProjectStatus::Invalid
        } else {
            ProjectStatus::Valid
        },
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        catalogue, project_text, sample_platforms, sample_releases, FakeReleaseFeed,
        FakeToolchain,
    };
    use std::sync::Arc;

    fn fixtures(installed: Option<&str>) -> (SchemaValidator, Catalogue) {
        let schema = SchemaValidator::new().expect("schema");
        let catalogue = catalogue(
            Arc::new(FakeToolchain::new(installed, sample_platforms())),
            Arc::new(FakeReleaseFeed::new(sample_releases())),
        );
        (schema, catalogue)
    }

    fn ids(report: &ProjectReport) -> Vec<String> {
        report
            .diagnostics
            .iter()
            .filter_map(|diagnostic| DiagnosticCode::of(diagnostic).map(|code| code.id().to_string()))
            .collect()
    }

    #[tokio::test]
    async fn schema_failures_suppress_semantic_checks() {
        let (schema, _) = fixtures(Some("0.35.3"));
        let toolchain = Arc::new(FakeToolchain::new(Some("0.35.3"), sample_platforms()));
        let feed = Arc::new(FakeReleaseFeed::new(sample_releases()));
        let catalogue = catalogue(toolchain.clone(), feed.clone());
        let settings = ServerSettings::from_contents(Path::new("/ws"), None, "");

        let document = ConfigDocument::new(r#"{ "version": "2", "cliVersion": "9.9.9" }"#);
        let subject = Subject::new(&document, "file:///ws/sketch-project.json", Anchor::Property);
        let outcome = validate_document(&subject, &schema, &catalogue, &settings).await;

        assert!(!outcome.diagnostics.is_empty());
        assert!(outcome
            .diagnostics
            .iter()
            .all(|diagnostic| DiagnosticCode::of(diagnostic) == Some(DiagnosticCode::InvalidContent)));
        assert_eq!(feed.calls(), 0);
        assert_eq!(toolchain.platform_calls(), 0);
    }

    #[tokio::test]
    async fn missing_project_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = ServerSettings::load(dir.path());
        let (schema, catalogue) = fixtures(Some("0.35.3"));

        let report = check_project(dir.path(), &settings, &schema, &catalogue).await;
        assert_eq!(report.status, ProjectStatus::NotFound);
        assert_eq!(ids(&report), vec!["E006"]);
        assert_eq!(report.diagnostics[0].range, NO_RANGE);
    }

    #[tokio::test]
    async fn unparseable_project_is_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("sketch-project.json"), "[1, 2").expect("write");
        let settings = ServerSettings::load(dir.path());
        let (schema, catalogue) = fixtures(Some("0.35.3"));

        let report = check_project(dir.path(), &settings, &schema, &catalogue).await;
        assert_eq!(report.status, ProjectStatus::Invalid);
        assert_eq!(ids(&report), vec!["I004"]);
    }

    #[tokio::test]
    async fn valid_project_reports_whole_document_diagnostics() {
        let dir = tempfile::tempdir().expect("tempdir");
        let text = project_text("0.35.3", "arduino:avr:uno", "COM3", None);
        std::fs::write(dir.path().join("sketch-project.json"), text).expect("write");
        let settings = ServerSettings::load(dir.path());
        let (schema, catalogue) = fixtures(None);

        let report = check_project(dir.path(), &settings, &schema, &catalogue).await;
        // Missing boardName is informational; the absent toolchain is an error.
        assert_eq!(ids(&report), vec!["I003", "E007"]);
        assert_eq!(report.status, ProjectStatus::Invalid);
        assert!(report
            .diagnostics
            .iter()
            .all(|diagnostic| diagnostic.range == NO_RANGE));

        let source = dir.path().display().to_string();
        let data = DiagnosticData::from_value(report.diagnostics[1].data.as_ref()).expect("data");
        assert_eq!(data.source, source);
        assert_eq!(data.toolchain().map(|fix| fix.version.as_str()), Some("0.35.3"));

        let json = serde_json::to_value(&report).expect("report");
        assert_eq!(json["status"], "invalid");
    }

    #[tokio::test]
    async fn clean_project_is_valid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let text = project_text("0.35.3", "arduino:avr:uno", "COM3", Some("Arduino Uno"));
        std::fs::write(dir.path().join("sketch-project.json"), text).expect("write");
        let settings = ServerSettings::load(dir.path());
        let (schema, catalogue) = fixtures(Some("0.35.3"));

        let report = check_project(dir.path(), &settings, &schema, &catalogue).await;
        assert_eq!(report.status, ProjectStatus::Valid);
        assert!(report.diagnostics.is_empty());
        assert_eq!(
            serde_json::to_value(&report).expect("report")["status"],
            "valid"
        );
    }
}
