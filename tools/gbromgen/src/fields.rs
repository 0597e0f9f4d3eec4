//! Symbol-addressed byte patches
//!
//! Everything the image assembler overwrites at a linker symbol: constant
//! fields from the spec and the pointer/bank variables of each tileset. A
//! symbol that isn't in the listing is reported and skipped.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::header::SWITCHABLE_ROM_ADDR;
use crate::packer::BankLayout;
use crate::spec::CartridgeSpec;
use crate::symbols::SymbolTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    VBlank,
    Const,
    TilesetPointer,
    TilesetBank,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldKind::VBlank => "vblank trigger function",
            FieldKind::Const => "const field",
            FieldKind::TilesetPointer => "tileset pointer",
            FieldKind::TilesetBank => "tileset bank",
        };
        f.write_str(s)
    }
}

/// A symbol that could not be located. Not fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSymbol {
    pub symbol: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPatches {
    /// Jump target for the vblank vector
    pub vblank: Option<u16>,
    bytes: BTreeMap<usize, u8>,
    missing: Vec<MissingSymbol>,
}

impl FieldPatches {
    /// Replacement byte at `offset`, if any
    pub fn get(&self, offset: usize) -> Option<u8> {
        self.bytes.get(&offset).copied()
    }

    pub fn missing(&self) -> &[MissingSymbol] {
        &self.missing
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn put(&mut self, offset: usize, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            self.bytes.insert(offset + i, b);
        }
    }

    /// Like `put`, but bytes already claimed by an earlier field are kept
    fn put_vacant(&mut self, offset: usize, bytes: &[u8], symbol: &str) {
        for (i, &b) in bytes.iter().enumerate() {
            if self.bytes.contains_key(&(offset + i)) {
                warn!("{} overlaps an earlier field at ${:04X}, keeping the earlier byte", symbol, offset + i);
                continue;
            }
            self.bytes.insert(offset + i, b);
        }
    }

    fn record_missing(&mut self, symbol: &str, kind: FieldKind) {
        self.missing.push(MissingSymbol {
            symbol: symbol.to_string(),
            kind,
        });
    }

    fn locate(&mut self, symbols: &SymbolTable, symbol: &str, kind: FieldKind) -> Option<usize> {
        let pos = symbols.resolve(symbol);
        if pos.is_none() {
            warn!("could not locate {} {}", kind, symbol);
            self.record_missing(symbol, kind);
        }
        pos
    }
}

/// Little-endian bytes without trailing zero bytes; zero encodes to nothing
pub fn le_bytes_min(value: u64) -> Vec<u8> {
    let width = (u64::BITS - value.leading_zeros()).div_ceil(8) as usize;
    value.to_le_bytes()[..width].to_vec()
}

/// Resolve every symbol-addressed field for one build
pub fn collect(spec: &CartridgeSpec, symbols: &SymbolTable, layout: &BankLayout) -> FieldPatches {
    let mut patches = FieldPatches::default();

    if let Some(name) = &spec.vblank {
        if let Some(addr) = patches.locate(symbols, name, FieldKind::VBlank) {
            match u16::try_from(addr) {
                Ok(addr) => patches.vblank = Some(addr),
                Err(_) => {
                    // banked symbols carry the bank number above bit 16
                    warn!("vblank trigger function {} at ${:X} is outside the 16-bit address space", name, addr);
                    patches.record_missing(name, FieldKind::VBlank);
                }
            }
        }
    }

    for (name, &value) in &spec.const_fields {
        let Some(pos) = patches.locate(symbols, name, FieldKind::Const) else {
            continue;
        };

        if value < 0 {
            warn!("negative const field not supported: {} = {}", name, value);
            continue;
        }

        patches.put(pos, &le_bytes_min(value as u64));
    }

    for bank in layout.banks() {
        for (offset, tileset) in bank.placements() {
            if let Some(symbol) = tileset.pointer_symbol() {
                if let Some(pos) = patches.locate(symbols, symbol, FieldKind::TilesetPointer) {
                    let addr = (SWITCHABLE_ROM_ADDR + offset) as u16;
                    patches.put_vacant(pos, &addr.to_le_bytes(), symbol);
                }
            }

            if let Some(symbol) = tileset.bank_symbol() {
                if let Some(pos) = patches.locate(symbols, symbol, FieldKind::TilesetBank) {
                    patches.put_vacant(pos, &[bank.number()], symbol);
                }
            }
        }
    }

    patches
}
