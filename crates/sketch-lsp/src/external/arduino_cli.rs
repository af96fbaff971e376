//! `arduino-cli` adapter.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::{Board, Platform, ToolError, Toolchain};

/// Runs the toolchain CLI with JSON output.
#[derive(Debug, Clone)]
pub struct ArduinoCli {
    program: PathBuf,
    timeout: Duration,
}

impl ArduinoCli {
    pub fn new(program: PathBuf, timeout: Duration) -> Self {
        Self { program, timeout }
    }

    async fn run(&self, args: &[&str]) -> Result<String, ToolError> {
        let command_line = format!("{} {}", self.program.display(), args.join(" "));
        debug!("running {command_line}");

        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => {
                return Err(ToolError::Timeout {
                    command: command_line,
                    secs: self.timeout.as_secs(),
                })
            }
            Ok(Err(err)) if err.kind() == ErrorKind::NotFound => {
                return Err(ToolError::NotInstalled {
                    program: self.program.display().to_string(),
                })
            }
            Ok(Err(source)) => {
                return Err(ToolError::Spawn {
                    command: command_line,
                    source,
                })
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            return Err(ToolError::Exit {
                command: command_line,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|err| ToolError::Malformed {
            origin: command_line,
            message: err.to_string(),
        })
    }
}

#[tower_lsp::async_trait]
impl Toolchain for ArduinoCli {
    async fn current_version(&self) -> Result<Option<String>, ToolError> {
        match self.run(&["version", "--format", "json"]).await {
            Ok(stdout) => parse_version(&stdout).map(Some),
            Err(ToolError::NotInstalled { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn platforms(&self) -> Result<Vec<Platform>, ToolError> {
        let stdout = self.run(&["core", "list", "--all", "--format", "json"]).await?;
        parse_core_list(&stdout)
    }
}

#[derive(Debug, Deserialize)]
struct VersionOutput {
    #[serde(rename = "VersionString")]
    version_string: String,
}

fn parse_version(stdout: &str) -> Result<String, ToolError> {
    serde_json::from_str::<VersionOutput>(stdout)
        .map(|output| output.version_string)
        .map_err(|err| ToolError::Malformed {
            origin: "arduino-cli version".to_string(),
            message: err.to_string(),
        })
}

/// Older CLIs print a bare list, newer ones wrap it in `{ "platforms": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CoreListOutput {
    Bare(Vec<RawPlatform>),
    Wrapped {
        #[serde(default)]
        platforms: Vec<RawPlatform>,
    },
}

#[derive(Debug, Deserialize)]
struct RawPlatform {
    id: String,
    #[serde(default, alias = "installed_version")]
    installed: Option<String>,
    #[serde(default, alias = "latest_version")]
    latest: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    boards: Vec<RawBoard>,
    #[serde(default)]
    releases: BTreeMap<String, RawRelease>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRelease {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    boards: Vec<RawBoard>,
}

#[derive(Debug, Deserialize)]
struct RawBoard {
    name: String,
    #[serde(default)]
    fqbn: Option<String>,
}

fn parse_core_list(stdout: &str) -> Result<Vec<Platform>, ToolError> {
    let output: CoreListOutput =
        serde_json::from_str(stdout).map_err(|err| ToolError::Malformed {
            origin: "arduino-cli core list".to_string(),
            message: err.to_string(),
        })?;
    let raw = match output {
        CoreListOutput::Bare(platforms) => platforms,
        CoreListOutput::Wrapped { platforms } => platforms,
    };
    Ok(raw.into_iter().map(Platform::from).collect())
}

impl From<RawPlatform> for Platform {
    fn from(mut raw: RawPlatform) -> Self {
        let installed = raw.installed.unwrap_or_default();
        let latest = raw.latest.unwrap_or_default();
        // Newer CLIs keep name and boards per release.
        let release = raw
            .releases
            .remove(&installed)
            .or_else(|| raw.releases.remove(&latest))
            .unwrap_or_default();
        let name = raw.name.or(release.name).unwrap_or_default();
        let boards = if raw.boards.is_empty() {
            release.boards
        } else {
            raw.boards
        };

        Platform {
            id: raw.id,
            installed,
            latest,
            name,
            boards: boards
                .into_iter()
                .filter_map(|board| {
                    Some(Board {
                        fqbn: board.fqbn?,
                        name: board.name,
                    })
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::EnvironmentNotice;

    #[test]
    fn parses_bare_core_list() {
        let platforms = parse_core_list(
            r#"[
              {
                "id": "arduino:avr",
                "installed": "1.8.5",
                "latest": "1.8.6",
                "name": "Arduino AVR Boards",
                "boards": [{ "name": "Arduino Uno", "fqbn": "arduino:avr:uno" }]
              }
            ]"#,
        )
        .expect("core list");

        assert_eq!(
            platforms,
            vec![Platform {
                id: "arduino:avr".to_string(),
                installed: "1.8.5".to_string(),
                latest: "1.8.6".to_string(),
                name: "Arduino AVR Boards".to_string(),
                boards: vec![Board {
                    name: "Arduino Uno".to_string(),
                    fqbn: "arduino:avr:uno".to_string(),
                }],
            }]
        );
    }

    #[test]
    fn parses_wrapped_core_list_with_releases() {
        let platforms = parse_core_list(
            r#"{
              "platforms": [
                {
                  "id": "esp32:esp32",
                  "latest_version": "2.0.14",
                  "releases": {
                    "2.0.14": {
                      "name": "esp32",
                      "boards": [
                        { "name": "ESP32 Dev Module", "fqbn": "esp32:esp32:esp32" },
                        { "name": "No fqbn" }
                      ]
                    }
                  }
                }
              ]
            }"#,
        )
        .expect("core list");

        assert_eq!(platforms.len(), 1);
        let platform = &platforms[0];
        assert!(!platform.is_installed());
        assert_eq!(platform.name, "esp32");
        assert_eq!(platform.boards.len(), 1);
        assert_eq!(platform.boards[0].fqbn, "esp32:esp32:esp32");
    }

    #[test]
    fn empty_wrapper_is_an_empty_list() {
        assert_eq!(parse_core_list("{}").expect("core list"), Vec::new());
    }

    #[test]
    fn malformed_output_is_reported() {
        let err = parse_core_list("Error: no such command").expect_err("malformed");
        assert!(matches!(err, ToolError::Malformed { .. }));
    }

    #[test]
    fn parses_version_output() {
        let version = parse_version(
            r#"{"Application":"arduino-cli","VersionString":"0.35.3","Commit":"95cfd654","Status":"alpha"}"#,
        )
        .expect("version");
        assert_eq!(version, "0.35.3");
    }

    #[tokio::test]
    async fn missing_program_reports_no_version() {
        let cli = ArduinoCli::new(
            PathBuf::from("/nonexistent/sketch-lsp-test/arduino-cli"),
            Duration::from_secs(5),
        );
        let installed = cli.current_version().await.expect("version");
        assert_eq!(installed, None);
        let notice = EnvironmentNotice::compare("0.35.3", installed.as_deref()).expect("notice");
        assert_eq!(notice.version, "0.35.3");
    }
}
