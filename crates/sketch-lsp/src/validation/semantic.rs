//! Validation against live toolchain and release feed state.

use sketch_syntax::TextRange;
use tower_lsp::lsp_types::Diagnostic;
use tracing::{debug, warn};

use super::{Subject, ValidationOutcome};
use crate::config::ServerSettings;
use crate::diagnostics::{
    self, DiagnosticCode, DiagnosticData, Payload, PropertyFix, ToolFailure,
};
use crate::document::{PropertySymbol, BOARD, BOARD_NAME, CLI_VERSION};
use crate::external::{latest_stable, Catalogue, EnvironmentNotice, ToolError};

/// Runs the toolchain, board and port checks concurrently. Results keep that
/// order regardless of completion order.
pub async fn validate(
    subject: &Subject<'_>,
    catalogue: &Catalogue,
    settings: &ServerSettings,
) -> ValidationOutcome {
    let (toolchain, board, port) = tokio::join!(
        check_toolchain(subject, catalogue),
        check_board(subject, catalogue, settings),
        async { check_port(subject, settings) },
    );

    let (mut diagnostics, notice) = toolchain;
    diagnostics.extend(board);
    diagnostics.extend(port);
    ValidationOutcome {
        diagnostics,
        notices: notice.into_iter().collect(),
    }
}

async fn check_toolchain(
    subject: &Subject<'_>,
    catalogue: &Catalogue,
) -> (Vec<Diagnostic>, Option<EnvironmentNotice>) {
    let Some(symbol) = &subject.document.toolchain_version else {
        return (Vec::new(), None);
    };
    let version = symbol.text();

    let releases = match catalogue.releases().await {
        Ok(releases) => releases,
        Err(err) => return (vec![tool_failure(subject, symbol, &err)], None),
    };

    if !releases.iter().any(|release| release.name == version) {
        let latest = latest_stable(&releases)
            .map(|release| release.name.clone())
            .unwrap_or_default();
        debug!("toolchain version {version:?} is not a known release (latest {latest:?})");
        let fix = PropertyFix::new(CLI_VERSION, latest);
        return (
            vec![property_diagnostic(
                subject,
                DiagnosticCode::InvalidCliVersion,
                symbol.value_range,
                fix.into(),
            )],
            None,
        );
    }

    match catalogue.check_environment(version).await {
        Ok(notice) => (Vec::new(), notice),
        Err(err) => (vec![tool_failure(subject, symbol, &err)], None),
    }
}

async fn check_board(
    subject: &Subject<'_>,
    catalogue: &Catalogue,
    settings: &ServerSettings,
) -> Vec<Diagnostic> {
    let Some(symbol) = &subject.document.board_id else {
        return Vec::new();
    };
    let fqbn = symbol.text();
    let board_fix = || PropertyFix::new(BOARD, fqbn);

    let platforms = match catalogue.platforms().await {
        Ok(platforms) => platforms,
        Err(err) => return vec![tool_failure(subject, symbol, &err)],
    };

    let platform = fqbn.rsplit_once(':').and_then(|(platform_id, _)| {
        platforms
            .iter()
            .rev()
            .find(|platform| platform.id == platform_id)
    });
    let Some(platform) = platform else {
        return vec![property_diagnostic(
            subject,
            DiagnosticCode::InvalidPlatform,
            symbol.value_range,
            board_fix().into(),
        )];
    };
    let Some(board) = platform.boards.iter().find(|board| board.fqbn == fqbn) else {
        return vec![property_diagnostic(
            subject,
            DiagnosticCode::InvalidBoard,
            symbol.value_range,
            board_fix().into(),
        )];
    };

    let mut diagnostics = Vec::new();
    if settings.diagnostics.board_name {
        match &subject.document.board_name {
            None => diagnostics.push(property_diagnostic(
                subject,
                DiagnosticCode::BoardNameMissing,
                symbol.value_range,
                PropertyFix::new(BOARD_NAME, &board.name).into(),
            )),
            Some(name) if name.text().to_lowercase() != board.name.to_lowercase() => {
                diagnostics.push(property_diagnostic(
                    subject,
                    DiagnosticCode::BoardNameMismatch,
                    name.value_range,
                    PropertyFix::new(BOARD_NAME, &board.name).into(),
                ));
            }
            Some(_) => {}
        }
    }

    if !platform.is_installed() {
        let fix = PropertyFix {
            latest: Some(platform.latest.clone()),
            ..board_fix()
        };
        diagnostics.push(property_diagnostic(
            subject,
            DiagnosticCode::PlatformNotInstalled,
            symbol.value_range,
            fix.into(),
        ));
    } else if settings.diagnostics.platform_updates
        && !platform.latest.is_empty()
        && platform.installed != platform.latest
    {
        let fix = PropertyFix {
            installed: Some(platform.installed.clone()),
            latest: Some(platform.latest.clone()),
            ..board_fix()
        };
        diagnostics.push(property_diagnostic(
            subject,
            DiagnosticCode::PlatformNotLatest,
            symbol.value_range,
            fix.into(),
        ));
    }

    diagnostics
}

fn check_port(subject: &Subject<'_>, settings: &ServerSettings) -> Vec<Diagnostic> {
    let Some(symbol) = &subject.document.port else {
        return Vec::new();
    };
    let port = symbol.text().trim();
    let prefixes = &settings.ports.prefixes;
    let accepted = !port.is_empty()
        && (prefixes.is_empty() || prefixes.iter().any(|prefix| port.starts_with(prefix.as_str())));
    if accepted {
        return Vec::new();
    }

    vec![property_diagnostic(
        subject,
        DiagnosticCode::PortRequired,
        symbol.value_range,
        PropertyFix::new(&symbol.name, port).into(),
    )]
}

fn property_diagnostic(
    subject: &Subject<'_>,
    code: DiagnosticCode,
    range: TextRange,
    payload: Payload,
) -> Diagnostic {
    diagnostics::build(
        code,
        subject.range(range),
        None,
        DiagnosticData::new(subject.source, payload),
    )
}

fn tool_failure(subject: &Subject<'_>, symbol: &PropertySymbol, err: &ToolError) -> Diagnostic {
    warn!("could not verify `{}`: {err}", symbol.name);
    let reason = err.to_string();
    let failure = ToolFailure {
        name: symbol.name.clone(),
        reason: reason.clone(),
    };
    diagnostics::build(
        DiagnosticCode::ToolchainUnavailable,
        subject.range(symbol.value_range),
        Some(&reason),
        DiagnosticData::new(subject.source, failure.into()),
    )
}
