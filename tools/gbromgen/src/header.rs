//! Cartridge header layout and lookup tables

use std::fmt;

use crate::error::{RomError, RomResult};

pub const ROM_BANK_SIZE: usize = 16 * 1024;
pub const SWITCHABLE_ROM_ADDR: usize = 0x4000;

pub const VBLANK_ADDR: usize = 0x40;
pub const TITLE_ADDR: usize = 0x134;
pub const CART_TYPE_ADDR: usize = 0x147;
pub const ROM_BANKS_ADDR: usize = 0x148;
pub const RAM_BANKS_ADDR: usize = 0x149;
pub const CHECKSUM_ADDR: usize = 0x14D;

pub const ROM_BANKS: [i64; 7] = [2, 4, 8, 16, 32, 64, 128];
/// `-1` declares a single partial (2 KiB) bank
pub const RAM_BANKS: [i64; 5] = [0, -1, 1, 4, 16];

pub mod opcode {
    pub const JP: u8 = 0xC3;
    pub const RETI: u8 = 0xD9;
    pub const NOP: u8 = 0x00;
    pub const STOP: [u8; 2] = [0x10, 0x00];
}

/// Normalised controller combinations, components sorted alphabetically
const CART_TYPES: &[(&str, u8)] = &[
    ("rom", 0x00),
    ("mbc1", 0x01),
    ("mbc1+ram", 0x02),
    ("batt+mbc1+ram", 0x03),
    ("mbc2", 0x05),
    ("batt+mbc2", 0x06),
    ("ram", 0x08),
    ("batt+ram", 0x09),
    ("mmm01", 0x0B),
    ("mmm01+sram", 0x0C),
    ("batt+mmm01+sram", 0x0D),
    ("batt+mbc3+timer", 0x0F),
    ("batt+mbc3+ram+timer", 0x10),
    ("mbc3", 0x11),
    ("mbc3+ram", 0x12),
    ("batt+mbc3+ram", 0x13),
    ("mbc5", 0x19),
    ("mbc5+ram", 0x1A),
    ("batt+mbc5+ram", 0x1B),
    ("mbc5+rumble", 0x1C),
    ("mbc5+rumble+sram", 0x1D),
    ("batt+mbc5+rumble+sram", 0x1E),
];

/// The controller declared at `0x147`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartridgeType(u8);

impl CartridgeType {
    pub const ROM_ONLY: Self = Self(0x00);

    /// Parse a `+`-joined component list such as `MBC1+RAM+BATT`
    pub fn parse(s: &str) -> RomResult<Self> {
        let mut components: Vec<String> = s.split('+').map(|c| c.trim().to_lowercase()).collect();
        components.sort();
        let key = components.join("+");

        CART_TYPES
            .iter()
            .find(|(name, _)| *name == key)
            .map(|&(_, code)| Self(code))
            .ok_or_else(|| RomError::UnknownCartridgeType(s.to_string()))
    }

    pub fn code(self) -> u8 {
        self.0
    }

    /// No mapper: two fixed banks, 32 KiB total
    pub fn is_rom_only(self) -> bool {
        self == Self::ROM_ONLY
    }
}

impl Default for CartridgeType {
    fn default() -> Self {
        Self::ROM_ONLY
    }
}

impl fmt::Display for CartridgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match CART_TYPES.iter().find(|&&(_, code)| code == self.0) {
            Some((name, _)) => write!(f, "{}", name),
            None => write!(f, "${:02X}", self.0),
        }
    }
}

/// Header code for a ROM bank count
pub fn rom_banks_code(count: i64) -> RomResult<u8> {
    table_index(&ROM_BANKS, count).ok_or(RomError::InvalidBankCount { kind: "ROM", count })
}

/// Header code for a RAM bank count
pub fn ram_banks_code(count: i64) -> RomResult<u8> {
    table_index(&RAM_BANKS, count).ok_or(RomError::InvalidBankCount { kind: "RAM", count })
}

fn table_index(table: &[i64], count: i64) -> Option<u8> {
    table.iter().position(|&c| c == count).map(|i| i as u8)
}

/// Header checksum from the running sum of bytes `0x134..0x14D`
pub fn header_checksum(title_sum: u32) -> u8 {
    let total = title_sum.wrapping_add(25);
    (0x100 - (total & 0xFF)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_type_ignores_case_and_order() {
        assert_eq!(CartridgeType::parse("rom").unwrap().code(), 0x00);
        assert_eq!(CartridgeType::parse("MBC1+RAM+BATT").unwrap().code(), 0x03);
        assert_eq!(CartridgeType::parse("ram+batt+mbc3+timer").unwrap().code(), 0x10);
        assert_eq!(CartridgeType::parse("Rumble+MBC5").unwrap().code(), 0x1C);
    }

    #[test]
    fn unknown_cart_types_fail() {
        for bad in ["mbc4", "mbc1+timer", "", "rom+rom"] {
            assert!(matches!(
                CartridgeType::parse(bad),
                Err(RomError::UnknownCartridgeType(_))
            ));
        }
    }

    #[test]
    fn only_plain_rom_has_no_mapper() {
        assert!(CartridgeType::parse("rom").unwrap().is_rom_only());
        assert!(!CartridgeType::parse("mbc1").unwrap().is_rom_only());
        assert!(CartridgeType::default().is_rom_only());
    }

    #[test]
    fn displays_normalised_name() {
        assert_eq!(CartridgeType::parse("RAM+MBC1").unwrap().to_string(), "mbc1+ram");
    }

    #[test]
    fn bank_codes() {
        assert_eq!(rom_banks_code(2).unwrap(), 0);
        assert_eq!(rom_banks_code(128).unwrap(), 6);
        assert_eq!(ram_banks_code(0).unwrap(), 0);
        assert_eq!(ram_banks_code(-1).unwrap(), 1);
        assert_eq!(ram_banks_code(16).unwrap(), 4);
        assert!(matches!(
            rom_banks_code(3),
            Err(RomError::InvalidBankCount { kind: "ROM", count: 3 })
        ));
        assert!(ram_banks_code(2).is_err());
    }

    #[test]
    fn checksum() {
        assert_eq!(header_checksum(0), 0xE7);
        // -25 mod 256 lands exactly on 0
        assert_eq!(header_checksum(231), 0x00);
        assert_eq!(header_checksum(0x100 + 1), 0xE6);
    }

    #[test]
    fn checksum_balances_header() {
        let title = b"HELLO WORLD\0\0\0\0\0\x00\x00\x00\x01\x01\x00\x33\x00\x00";
        let sum: u32 = title.iter().map(|&b| b as u32).sum();
        let check = header_checksum(sum);
        assert_eq!((sum + 25 + check as u32) & 0xFF, 0);
    }
}
