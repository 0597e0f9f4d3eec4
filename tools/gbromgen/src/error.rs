//! Error types for ROM assembly
//!
//! Everything here is fatal to a run. Symbols that fail to resolve are not
//! errors; see [`crate::fields::MissingSymbol`].

use std::path::PathBuf;

use thiserror::Error;

pub type RomResult<T> = Result<T, RomError>;

#[derive(Debug, Error)]
pub enum RomError {
    #[error("{0}")]
    Specification(String),

    #[error("{}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error("unknown cartridge type `{0}`")]
    UnknownCartridgeType(String),

    #[error("invalid {kind} bank count: {count}")]
    InvalidBankCount { kind: &'static str, count: i64 },

    #[error("{tool} failed with {status}")]
    ExternalToolFailure { tool: String, status: String },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not decode {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("input specification syntax error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("i/o error while writing image: {0}")]
    Stream(#[from] std::io::Error),
}

impl RomError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RomError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Tile image violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("tile strip must be 8 pixels tall and a multiple of 8 wide, got {width}x{height}")]
    IrregularDimensions { width: u32, height: u32 },

    #[error("{level} is not a valid color level (pixel {x},{y})")]
    InvalidColorLevel { level: u8, x: u32, y: u32 },
}

/// Bank allocation and image size violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapacityError {
    #[error("no ROM space for tileset {0}")]
    NoSpace(String),

    #[error("rom bank {bank} holds {used} bytes, more than fits in a bank")]
    BankOverflow { bank: u8, used: usize },

    #[error("game code exceeds space in ROM bank 0 ({0} bytes)")]
    BankZeroOverflow(usize),

    #[error("ROM size exceeds 32k ({0} bytes)")]
    RomOverflow(usize),
}
