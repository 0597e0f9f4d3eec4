//! gbromgen - generate full ROM images for the Game Boy
//!
//! Takes the Intel hex output of SDCC, a JSON spec describing the cartridge
//! and a set of greyscale tile strips, and produces a padded, checksummed
//! cartridge image:
//! - [`symbols`]: `.noi` linker listings
//! - [`tiles`]: PNG strips to 2bpp tile data
//! - [`packer`]: first-fit placement into switchable banks
//! - [`assembler`]: header patching, vector redirection and padding
//! - [`makebin`]: the external hex-to-binary step

pub mod assembler;
pub mod error;
pub mod fields;
pub mod header;
pub mod makebin;
pub mod packer;
pub mod spec;
pub mod symbols;
pub mod tiles;

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use tracing::{info, info_span, warn};

pub use assembler::AssemblyReport;
pub use error::{CapacityError, FormatError, RomError, RomResult};
pub use spec::CartridgeSpec;

use makebin::{Makebin, RunContext};
use symbols::SymbolTable;
use tiles::{Tileset, TilesetDecl};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// makebin executable
    pub makebin: PathBuf,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            makebin: PathBuf::from("makebin"),
        }
    }
}

/// Full build: convert the hex file with makebin, then assemble the image
pub fn build(spec: &CartridgeSpec, options: &BuildOptions) -> RomResult<AssemblyReport> {
    let ctx = RunContext::new()?;
    let _run = info_span!("run", id = ctx.id()).entered();

    // everything that can fail on the inputs alone happens before makebin
    let (symbols, tilesets) = prepare(spec)?;
    let layout = packer::allocate(tilesets, spec.image_banks())?;

    let base_path = Makebin::new(&options.makebin).run(spec, &ctx)?;
    let base = File::open(&base_path).map_err(|e| RomError::io(&base_path, e))?;

    assembler::write_image(&spec.output, base, spec, &symbols, &layout)
}

/// Assemble from an already converted base binary
pub fn build_from_base(spec: &CartridgeSpec, base: impl Read) -> RomResult<AssemblyReport> {
    let (symbols, tilesets) = prepare(spec)?;
    let layout = packer::allocate(tilesets, spec.image_banks())?;

    assembler::write_image(&spec.output, base, spec, &symbols, &layout)
}

fn prepare(spec: &CartridgeSpec) -> RomResult<(SymbolTable, Vec<Tileset>)> {
    spec.validate()?;
    info!(
        "building {} cartridge, {} ROM banks",
        spec.cartridge_type, spec.rom_banks
    );

    let listing = spec.symbol_listing();
    let symbols = if listing.exists() {
        SymbolTable::load(&listing)?
    } else {
        warn!("no symbol listing at {}", listing.display());
        SymbolTable::default()
    };

    if symbols.is_empty() && (spec.vblank.is_some() || !spec.const_fields.is_empty()) {
        warn!("no symbols to patch fields against");
    }

    let tilesets = spec
        .tilesets
        .iter()
        .cloned()
        .map(TilesetDecl::materialize)
        .collect::<RomResult<Vec<_>>>()?;

    Ok((symbols, tilesets))
}
