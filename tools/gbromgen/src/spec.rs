//! ROM specification files
//!
//! A spec is a JSON object describing the cartridge:
//!
//! ```json
//! {
//!     "hex": "game.ihx",
//!     "name": "GAME",
//!     "mbc": "mbc1+ram+batt",
//!     "rom-banks": 4,
//!     "ram-banks": 1,
//!     "vblank": "on_vblank",
//!     "const-fields": { "max_lives": 3 },
//!     "tilesets": [
//!         { "img": "font.png", "data": "font_tiles", "bank": "font_bank" },
//!         { "img": "title.png", "data": "title_tiles", "bank": 2 }
//!     ]
//! }
//! ```
//!
//! Relative `hex` and `img` paths are taken from the spec file's directory.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::warn;

use crate::error::{RomError, RomResult};
use crate::header::{self, CartridgeType};
use crate::tiles::{BankRequest, TilesetDecl};

const HEX_EXTENSION: &str = "ihx";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeSpec {
    /// Intel hex produced by the linker
    pub hex: PathBuf,
    pub output: PathBuf,
    /// Title written into the header by makebin
    pub name: String,
    pub cartridge_type: CartridgeType,
    pub rom_banks: usize,
    pub ram_banks: i64,
    pub vblank: Option<String>,
    pub const_fields: IndexMap<String, i64>,
    pub tilesets: Vec<TilesetDecl>,
}

impl CartridgeSpec {
    /// A plain 32k ROM built from `hex`, everything else defaulted
    pub fn new(hex: impl Into<PathBuf>) -> Self {
        let hex = hex.into();
        let output = with_suffix(&base_path(&hex), "gb");

        Self {
            hex,
            output,
            name: String::new(),
            cartridge_type: CartridgeType::ROM_ONLY,
            rom_banks: 2,
            ram_banks: 0,
            vblank: None,
            const_fields: IndexMap::new(),
            tilesets: Vec::new(),
        }
    }

    /// Load a spec from `path`, or from stdin when `path` is `-`
    pub fn load(path: &Path) -> RomResult<Self> {
        if path == Path::new("-") {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| RomError::io("<stdin>", e))?;
            let cwd = std::env::current_dir().map_err(|e| RomError::io(".", e))?;
            return Self::from_json(&text, &cwd);
        }

        let text = std::fs::read_to_string(path).map_err(|e| RomError::io(path, e))?;
        let absolute = std::path::absolute(path).map_err(|e| RomError::io(path, e))?;
        let dir = absolute.parent().unwrap_or(Path::new("/"));
        Self::from_json(&text, dir)
    }

    /// Parse spec text; relative input paths are joined onto `dir`
    pub fn from_json(text: &str, dir: &Path) -> RomResult<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(RomError::Specification(
                "input specification syntax error: expected an object".to_string(),
            ));
        }

        let raw: RawSpec = serde_json::from_value(value)?;
        raw.into_spec(dir)
    }

    /// The `.noi` symbol listing written alongside the hex file
    pub fn symbol_listing(&self) -> PathBuf {
        with_suffix(&base_path(&self.hex), "noi")
    }

    /// Banks the image actually holds: a cartridge without a mapper only
    /// ever sees the first 32k, whatever its header claims.
    pub fn image_banks(&self) -> usize {
        if self.cartridge_type.is_rom_only() {
            2
        } else {
            self.rom_banks
        }
    }

    /// Check the header values can be encoded
    pub fn validate(&self) -> RomResult<()> {
        header::rom_banks_code(self.rom_banks as i64)?;
        header::ram_banks_code(self.ram_banks)?;

        if self.image_banks() != self.rom_banks {
            warn!(
                "cartridge type {} has no mapper, image is limited to 32k despite {} ROM banks",
                self.cartridge_type, self.rom_banks
            );
        }

        Ok(())
    }
}

/// The hex path with its `.ihx` extension removed
fn base_path(hex: &Path) -> PathBuf {
    match hex.extension() {
        Some(ext) if ext == HEX_EXTENSION => hex.with_extension(""),
        _ => hex.to_path_buf(),
    }
}

/// Append `.suffix` without replacing an existing extension
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(".");
    s.push(suffix);
    PathBuf::from(s)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawSpec {
    hex: Option<String>,
    output: Option<String>,
    name: Option<String>,
    mbc: Option<String>,
    rom_banks: Option<i64>,
    ram_banks: Option<i64>,
    vblank: Option<String>,
    #[serde(default)]
    const_fields: IndexMap<String, i64>,
    #[serde(default)]
    tilesets: Vec<RawTileset>,
}

#[derive(Debug, Deserialize)]
struct RawTileset {
    img: String,
    data: Option<String>,
    bank: Option<RawBank>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBank {
    Number(i64),
    Symbol(String),
}

impl RawSpec {
    fn into_spec(self, dir: &Path) -> RomResult<CartridgeSpec> {
        let hex = self
            .hex
            .filter(|h| !h.is_empty())
            .ok_or_else(|| RomError::Specification("'hex' file not specified in input specification".to_string()))?;

        let hex = dir.join(hex);
        if hex.extension().is_none_or(|ext| ext != HEX_EXTENSION) {
            warn!("input file does not have Intel hex standard extension");
        }

        let mut spec = CartridgeSpec::new(hex);

        if let Some(output) = self.output.filter(|o| !o.is_empty()) {
            spec.output = PathBuf::from(output);
        }

        if let Some(mbc) = self.mbc.filter(|m| !m.is_empty()) {
            spec.cartridge_type = CartridgeType::parse(&mbc)?;
        }

        let rom_banks = self.rom_banks.unwrap_or(2);
        header::rom_banks_code(rom_banks)?;
        spec.rom_banks = rom_banks as usize;

        spec.name = self.name.unwrap_or_default();
        spec.ram_banks = self.ram_banks.unwrap_or(0);
        spec.vblank = self.vblank.filter(|v| !v.is_empty());
        spec.const_fields = self.const_fields;

        spec.tilesets = self
            .tilesets
            .into_iter()
            .map(|t| t.into_decl(dir))
            .collect::<RomResult<_>>()?;

        spec.validate()?;
        Ok(spec)
    }
}

impl RawTileset {
    fn into_decl(self, dir: &Path) -> RomResult<TilesetDecl> {
        let bank = match self.bank {
            None => BankRequest::Unassigned,
            Some(RawBank::Symbol(name)) => BankRequest::Symbol(name),
            Some(RawBank::Number(n)) => {
                let n = u8::try_from(n).map_err(|_| {
                    RomError::Specification(format!("{}: bank {} out of range", self.img, n))
                })?;
                BankRequest::Fixed(n)
            }
        };

        Ok(TilesetDecl::new(dir.join(&self.img), self.data, bank))
    }
}
