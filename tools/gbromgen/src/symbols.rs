//! Linker symbol listings
//!
//! The SDCC linker writes a `.noi` file next to its Intel hex output. Each
//! definition line looks like `DEF _main 0x150`; C symbols carry a leading
//! underscore, which callers never spell out.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::error::{RomError, RomResult};

const DEF_TOKEN: &str = "DEF";
const NAME_MARKER: char = '_';

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    offsets: HashMap<String, usize>,
}

impl SymbolTable {
    /// Read and parse a listing from disk
    pub fn load(path: &Path) -> RomResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| RomError::io(path, e))?;
        let table = Self::parse(&text);
        debug!("loaded {} symbols from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parse listing text. Lines that aren't definitions are skipped.
    pub fn parse(text: &str) -> Self {
        let mut offsets = HashMap::new();

        for line in text.lines() {
            if let Some((name, offset)) = parse_definition(line) {
                // first definition wins
                offsets.entry(name.to_string()).or_insert(offset);
            }
        }

        Self { offsets }
    }

    /// Offset of `name` (without the underscore prefix)
    pub fn resolve(&self, name: &str) -> Option<usize> {
        self.offsets.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

fn parse_definition(line: &str) -> Option<(&str, usize)> {
    let mut tokens = line.split_whitespace();

    if tokens.next()? != DEF_TOKEN {
        return None;
    }

    let name = tokens.next()?.strip_prefix(NAME_MARKER)?;
    let hex = tokens.next()?;
    let hex = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex);

    let offset = usize::from_str_radix(hex, 16).ok()?;
    Some((name, offset))
}
