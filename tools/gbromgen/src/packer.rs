//! Switchable ROM bank allocation
//!
//! Plain first-fit in declaration order. Tilesets are never sorted, so the
//! packing is reproducible but not optimal.

use tracing::debug;

use crate::error::{CapacityError, RomError, RomResult};
use crate::header::ROM_BANK_SIZE;
use crate::tiles::{BankRequest, Tileset};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bank {
    number: u8,
    tilesets: Vec<Tileset>,
}

impl Bank {
    fn new(number: u8) -> Self {
        Self {
            number,
            tilesets: Vec::new(),
        }
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn tilesets(&self) -> &[Tileset] {
        &self.tilesets
    }

    pub fn used(&self) -> usize {
        self.tilesets.iter().map(Tileset::len).sum()
    }

    pub fn free(&self) -> usize {
        ROM_BANK_SIZE.saturating_sub(self.used())
    }

    /// Tilesets paired with their offset from the start of the bank
    pub fn placements(&self) -> impl Iterator<Item = (usize, &Tileset)> {
        self.tilesets.iter().scan(0usize, |offset, tileset| {
            let at = *offset;
            *offset += tileset.len();
            Some((at, tileset))
        })
    }
}

/// Bank contents for banks `1..rom_banks`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BankLayout {
    banks: Vec<Bank>,
}

impl BankLayout {
    pub fn banks(&self) -> &[Bank] {
        &self.banks
    }

    pub fn bank(&self, number: u8) -> Option<&Bank> {
        self.banks.get((number as usize).checked_sub(1)?)
    }

    /// Bank assigned to the tileset loaded from `source`
    #[cfg(test)]
    fn bank_of(&self, source: &std::path::Path) -> Option<u8> {
        self.banks
            .iter()
            .find(|b| b.tilesets.iter().any(|t| t.source() == source))
            .map(Bank::number)
    }

    pub fn is_empty(&self) -> bool {
        self.banks.iter().all(|b| b.tilesets.is_empty())
    }
}

/// Place every tileset into one of the switchable banks of a
/// `rom_banks`-bank cartridge.
pub fn allocate(tilesets: Vec<Tileset>, rom_banks: usize) -> RomResult<BankLayout> {
    let mut banks: Vec<Bank> = (1..rom_banks).map(|n| Bank::new(n as u8)).collect();
    let mut unallocated = Vec::new();

    for tileset in tilesets {
        let fixed = match tileset.bank_request() {
            BankRequest::Fixed(n) => Some(*n),
            BankRequest::Unassigned | BankRequest::Symbol(_) => None,
        };

        match fixed {
            Some(n) => {
                let bank = (n as usize)
                    .checked_sub(1)
                    .and_then(|i| banks.get_mut(i))
                    .ok_or_else(|| {
                        RomError::Specification(format!(
                            "{} requests bank {}, which is not a switchable bank of a {}-bank ROM",
                            tileset, n, rom_banks
                        ))
                    })?;
                bank.tilesets.push(tileset);
            }
            None => unallocated.push(tileset),
        }
    }

    for tileset in unallocated {
        let bank = banks
            .iter_mut()
            .find(|b| b.free() >= tileset.len())
            .ok_or_else(|| CapacityError::NoSpace(tileset.to_string()))?;

        debug!("{} -> bank {}", tileset, bank.number);
        bank.tilesets.push(tileset);
    }

    for bank in &banks {
        let used = bank.used();
        if used > ROM_BANK_SIZE {
            return Err(CapacityError::BankOverflow {
                bank: bank.number,
                used,
            }
            .into());
        }
    }

    Ok(BankLayout { banks })
}
