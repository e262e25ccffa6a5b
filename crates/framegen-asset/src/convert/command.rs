//! External-tool conversion strategies

use async_trait::async_trait;
use framegen_core::{FrameGenError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{ConversionStrategy, StrategyStatus};

/// Serializable description of a command-line converter.
///
/// `args` may contain `{input}` and `{output}` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

const BLENDER_SCRIPT: &str = "import bpy, sys; a = sys.argv[sys.argv.index('--') + 1:]; \
bpy.ops.wm.read_factory_settings(use_empty=True); \
bpy.ops.import_scene.gltf(filepath=a[0]); \
bpy.ops.wm.usd_export(filepath=a[1])";

/// usd_from_gltf, usdzconvert, then headless Blender
pub fn default_strategies() -> Vec<StrategyConfig> {
    vec![
        StrategyConfig {
            name: "usd_from_gltf".into(),
            program: "usd_from_gltf".into(),
            args: vec!["{input}".into(), "{output}".into()],
        },
        StrategyConfig {
            name: "usdzconvert".into(),
            program: "usdzconvert".into(),
            args: vec!["{input}".into(), "{output}".into()],
        },
        StrategyConfig {
            name: "blender".into(),
            program: "blender".into(),
            args: vec![
                "--background".into(),
                "--factory-startup".into(),
                "--python-expr".into(),
                BLENDER_SCRIPT.into(),
                "--".into(),
                "{input}".into(),
                "{output}".into(),
            ],
        },
    ]
}

/// Locate `program` on `PATH`, or accept it directly when it is a path
pub fn find_program(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

/// Runs a converter as a child process
pub struct CommandStrategy {
    config: StrategyConfig,
}

impl CommandStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    fn render_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.config
            .args
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect()
    }
}

#[async_trait]
impl ConversionStrategy for CommandStrategy {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn health_check(&self) -> Result<StrategyStatus> {
        Ok(match find_program(&self.config.program) {
            Some(_) => StrategyStatus::Available,
            None => StrategyStatus::Unavailable(format!("'{}' not found on PATH", self.config.program)),
        })
    }

    async fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        let program = find_program(&self.config.program)
            .ok_or_else(|| FrameGenError::Transient(format!("'{}' not found on PATH", self.config.program)))?;

        // Dropping the future (on timeout) kills the child
        let result = Command::new(&program)
            .args(self.render_args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| FrameGenError::Transient(format!("failed to run {}: {}", self.config.program, e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail: String = stderr.lines().rev().take(3).collect::<Vec<_>>().join(" | ");
            return Err(FrameGenError::Transient(format!(
                "{} exited with {}: {}",
                self.config.name, result.status, tail
            )));
        }
        Ok(())
    }
}
