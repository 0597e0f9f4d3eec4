//! makebin invocation
//!
//! SDCC's `makebin` turns the linker's Intel hex into the flat base binary
//! the assembler patches. It runs inside a scratch directory owned by the
//! current run.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::{RomError, RomResult};
use crate::spec::CartridgeSpec;

const TEMP_PREFIX: &str = "gbromgen-";
const BASE_IMAGE: &str = "temp.gb";

/// Scratch space for a single build, removed when dropped
#[derive(Debug)]
pub struct RunContext {
    id: String,
    dir: TempDir,
}

impl RunContext {
    pub fn new() -> RomResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir()
            .map_err(|e| RomError::io(std::env::temp_dir(), e))?;

        let id = dir
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().trim_start_matches(TEMP_PREFIX).to_string())
            .unwrap_or_default();

        debug!("run {} working in {}", id, dir.path().display());
        Ok(Self { id, dir })
    }

    /// Unique token naming this run
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

#[derive(Debug, Clone)]
pub struct Makebin {
    program: PathBuf,
}

impl Default for Makebin {
    fn default() -> Self {
        Self::new("makebin")
    }
}

impl Makebin {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `makebin -Z -p -yn <name> <hex> <output>`
    pub fn command(&self, spec: &CartridgeSpec, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-Z", "-p", "-yn"])
            .arg(&spec.name)
            .arg(&spec.hex)
            .arg(output);
        cmd
    }

    /// Convert the spec's hex file, returning the path of the base binary
    pub fn run(&self, spec: &CartridgeSpec, ctx: &RunContext) -> RomResult<PathBuf> {
        let output = ctx.path().join(BASE_IMAGE);
        let tool = self.program.display().to_string();

        info!("converting {}", spec.hex.display());
        let status = self
            .command(spec, &output)
            .status()
            .map_err(|e| RomError::ExternalToolFailure {
                tool: tool.clone(),
                status: e.to_string(),
            })?;

        if !status.success() {
            return Err(RomError::ExternalToolFailure {
                tool,
                status: status.to_string(),
            });
        }

        Ok(output)
    }
}
