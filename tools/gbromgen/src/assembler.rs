//! Final image assembly
//!
//! Streams the base binary produced by makebin, rewriting the vblank vector,
//! the header fields and every symbol-addressed field on the way through.
//! The switchable banks follow, each padded out to 16k.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{CapacityError, RomError, RomResult};
use crate::fields::{self, FieldPatches, MissingSymbol};
use crate::header::{self, opcode, ROM_BANK_SIZE};
use crate::packer::BankLayout;
use crate::spec::CartridgeSpec;
use crate::symbols::SymbolTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankUsage {
    pub bank: u8,
    pub used: usize,
}

impl BankUsage {
    pub fn percent(&self) -> f64 {
        self.used as f64 / ROM_BANK_SIZE as f64 * 100.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssemblyReport {
    /// Total bytes written
    pub size: usize,
    pub banks: Vec<BankUsage>,
    pub missing: Vec<MissingSymbol>,
}

/// Pad `remaining` bytes with STOP, leading with a NOP when the count is odd
pub fn fill_bank(out: &mut impl Write, remaining: usize) -> std::io::Result<()> {
    if remaining % 2 != 0 {
        out.write_all(&[opcode::NOP])?;
    }

    for _ in 0..remaining / 2 {
        out.write_all(&opcode::STOP)?;
    }

    Ok(())
}

/// Assemble the cartridge image from `base` into `out`
pub fn assemble(
    base: impl Read,
    mut out: impl Write,
    spec: &CartridgeSpec,
    symbols: &SymbolTable,
    layout: &BankLayout,
) -> RomResult<AssemblyReport> {
    let patches = fields::collect(spec, symbols, layout);
    let banks = spec.image_banks();

    if let Some(stray) = layout
        .banks()
        .iter()
        .find(|b| b.number() as usize >= banks && !b.tilesets().is_empty())
    {
        return Err(RomError::Specification(format!(
            "bank {} is beyond the {} ROM banks in the image",
            stray.number(),
            banks
        )));
    }

    let size = patch_base(base, &mut out, spec, &patches)?;

    let mut report = AssemblyReport {
        size,
        banks: vec![BankUsage { bank: 0, used: size }],
        missing: patches.missing().to_vec(),
    };

    if spec.cartridge_type.is_rom_only() && layout.is_empty() {
        // code may run straight on into bank 1
        if size > ROM_BANK_SIZE * 2 {
            return Err(CapacityError::RomOverflow(size).into());
        }

        if size < ROM_BANK_SIZE {
            fill_bank(&mut out, ROM_BANK_SIZE - size)?;
            fill_bank(&mut out, ROM_BANK_SIZE)?;
        } else {
            fill_bank(&mut out, ROM_BANK_SIZE * 2 - size)?;
        }

        report.size = ROM_BANK_SIZE * 2;
    } else {
        if size > ROM_BANK_SIZE {
            return Err(CapacityError::BankZeroOverflow(size).into());
        }

        fill_bank(&mut out, ROM_BANK_SIZE - size)?;

        for n in 1..banks {
            let used = match layout.bank(n as u8) {
                Some(bank) => {
                    for tileset in bank.tilesets() {
                        out.write_all(tileset.data())?;
                    }
                    bank.used()
                }
                None => 0,
            };

            fill_bank(&mut out, ROM_BANK_SIZE - used)?;
            report.banks.push(BankUsage { bank: n as u8, used });
        }

        report.size = ROM_BANK_SIZE * banks;
    }

    out.flush()?;

    for usage in &report.banks {
        info!(
            "rom bank {} uses {} bytes ({:.1}%)",
            usage.bank,
            usage.used,
            usage.percent()
        );
    }

    Ok(report)
}

/// Copy the base binary through, applying the vector, header and field
/// patches. Returns the number of bytes written.
fn patch_base(
    base: impl Read,
    out: &mut impl Write,
    spec: &CartridgeSpec,
    patches: &FieldPatches,
) -> RomResult<usize> {
    let cart_type = spec.cartridge_type.code();
    let rom_banks = header::rom_banks_code(spec.rom_banks as i64)?;
    let ram_banks = header::ram_banks_code(spec.ram_banks)?;

    let mut input = BufReader::new(base).bytes();
    let mut pos = 0usize;
    let mut title_sum = 0u32;

    while let Some(byte) = input.next() {
        let byte = byte?;

        if pos == header::VBLANK_ADDR {
            match patches.vblank {
                Some(addr) => {
                    let [lo, hi] = addr.to_le_bytes();
                    out.write_all(&[opcode::JP, lo, hi])?;
                    // the jump replaces three source bytes
                    for _ in 0..2 {
                        if let Some(skipped) = input.next() {
                            skipped?;
                        }
                    }
                    pos += 3;
                }
                None => {
                    out.write_all(&[opcode::RETI])?;
                    pos += 1;
                }
            }
            continue;
        }

        let value = match pos {
            header::CART_TYPE_ADDR => cart_type,
            header::ROM_BANKS_ADDR => rom_banks,
            header::RAM_BANKS_ADDR => ram_banks,
            header::CHECKSUM_ADDR => header::header_checksum(title_sum),
            _ => patches.get(pos).unwrap_or(byte),
        };

        out.write_all(&[value])?;

        if (header::TITLE_ADDR..header::CHECKSUM_ADDR).contains(&pos) {
            title_sum += value as u32;
        }

        pos += 1;
    }

    Ok(pos)
}

/// An output file that is deleted again unless committed
pub struct OutputFile {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl OutputFile {
    pub fn create(path: &Path) -> RomResult<Self> {
        let file = File::create(path).map_err(|e| RomError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Flush and keep the file
    pub fn commit(mut self) -> RomResult<PathBuf> {
        self.flush().map_err(|e| RomError::io(&self.path, e))?;
        self.writer = None;
        Ok(std::mem::take(&mut self.path))
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.writer.as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(std::io::Error::other("output already committed")),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for OutputFile {
    fn drop(&mut self) {
        // committed
        if self.writer.is_none() {
            return;
        }

        drop(self.writer.take());
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("could not remove {}: {}", self.path.display(), e);
        }
    }
}

/// Assemble straight into `path`. Nothing is left at `path` on failure.
pub fn write_image(
    path: &Path,
    base: impl Read,
    spec: &CartridgeSpec,
    symbols: &SymbolTable,
    layout: &BankLayout,
) -> RomResult<AssemblyReport> {
    let mut output = OutputFile::create(path)?;
    let report = assemble(base, &mut output, spec, symbols, layout)?;
    output.commit()?;
    Ok(report)
}
