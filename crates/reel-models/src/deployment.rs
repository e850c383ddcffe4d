//! Deployment mode selection.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How this process is deployed.
///
/// `Single` runs everything in one process. `Orchestrator` and `Processor`
/// split the light polling/streaming work from the memory-heavy video work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    #[default]
    Single,
    Orchestrator,
    Processor,
}

impl DeploymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMode::Single => "single",
            DeploymentMode::Orchestrator => "orchestrator",
            DeploymentMode::Processor => "processor",
        }
    }

    /// Serves `POST /generate-reel`.
    pub fn serves_streaming(&self) -> bool {
        matches!(self, DeploymentMode::Single | DeploymentMode::Orchestrator)
    }

    /// Serves `POST /process-clips`.
    pub fn serves_processing(&self) -> bool {
        matches!(self, DeploymentMode::Single | DeploymentMode::Processor)
    }

    /// Runs the polling loop.
    pub fn runs_orchestrator(&self) -> bool {
        matches!(self, DeploymentMode::Single | DeploymentMode::Orchestrator)
    }

    /// Assembles video in this process instead of calling a remote processor.
    pub fn processes_locally(&self) -> bool {
        matches!(self, DeploymentMode::Single | DeploymentMode::Processor)
    }

    /// Environment variables that must be present for this mode.
    pub fn required_env(&self) -> &'static [&'static str] {
        match self {
            DeploymentMode::Single => &["NYT_API_KEY", "PEXELS_API_KEY", "GOOGLE_TTS_API_KEY"],
            DeploymentMode::Orchestrator => &[
                "NYT_API_KEY",
                "PEXELS_API_KEY",
                "GOOGLE_TTS_API_KEY",
                "PROCESSOR_URL",
            ],
            DeploymentMode::Processor => &[],
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown deployment mode '{0}', expected single, orchestrator or processor")]
pub struct DeploymentModeParseError(pub String);

impl FromStr for DeploymentMode {
    type Err = DeploymentModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" | "all" | "standalone" => Ok(DeploymentMode::Single),
            "orchestrator" | "render" => Ok(DeploymentMode::Orchestrator),
            "processor" | "cloud_run" | "cloud-run" => Ok(DeploymentMode::Processor),
            other => Err(DeploymentModeParseError(other.to_string())),
        }
    }
}
