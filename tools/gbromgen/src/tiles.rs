//! Tileset conversion
//!
//! Turns 8px tall greyscale strips into 2bpp tiles. Each tile row is two
//! bytes: the low bit-plane then the high bit-plane, leftmost pixel in bit 7.

use std::fmt;
use std::path::{Path, PathBuf};

use image::GrayImage;
use tracing::debug;

use crate::error::{FormatError, RomError, RomResult};

pub const TILE_SIZE: u32 = 8;
pub const BYTES_PER_TILE: usize = 16;

/// Grey level -> palette index. Darkest is 3.
const PALETTE: [(u8, u8); 4] = [(0, 3), (85, 2), (170, 1), (255, 0)];

/// A greyscale pixel grid the encoder can sample
pub trait PixelSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Grey level at the row-major pixel `index`
    fn level(&self, index: usize) -> u8;
}

impl PixelSource for GrayImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn level(&self, index: usize) -> u8 {
        self.as_raw()[index]
    }
}

pub fn palette_index(level: u8) -> Option<u8> {
    PALETTE
        .iter()
        .find_map(|&(l, index)| (l == level).then_some(index))
}

/// Encode a strip into tile data, `16 * width / 8` bytes
pub fn encode(pixels: &impl PixelSource) -> Result<Vec<u8>, FormatError> {
    let width = pixels.width();
    let height = pixels.height();

    if height != TILE_SIZE || width == 0 || width % TILE_SIZE != 0 {
        return Err(FormatError::IrregularDimensions { width, height });
    }

    let num_tiles = width / TILE_SIZE;
    let mut encoded = Vec::with_capacity(num_tiles as usize * BYTES_PER_TILE);

    for tile in 0..num_tiles {
        for y in 0..TILE_SIZE {
            let mut low = 0u8;
            let mut high = 0u8;

            for px in 0..TILE_SIZE {
                let x = tile * TILE_SIZE + px;
                let level = pixels.level((y * width + x) as usize);
                let color = palette_index(level)
                    .ok_or(FormatError::InvalidColorLevel { level, x, y })?;

                let bit = 0x80 >> px;
                if color & 0x01 != 0 {
                    low |= bit;
                }
                if color & 0x02 != 0 {
                    high |= bit;
                }
            }

            encoded.push(low);
            encoded.push(high);
        }
    }

    Ok(encoded)
}

/// Where a tileset wants to live
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BankRequest {
    /// The packer picks a bank
    #[default]
    Unassigned,
    /// Pinned to a bank number
    Fixed(u8),
    /// The packer picks a bank and its number is written to this symbol
    Symbol(String),
}

/// A tileset as declared, before its image has been read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilesetDecl {
    pub source: PathBuf,
    pub pointer_symbol: Option<String>,
    pub bank: BankRequest,
}

impl TilesetDecl {
    pub fn new(source: impl Into<PathBuf>, pointer_symbol: Option<String>, bank: BankRequest) -> Self {
        Self {
            source: source.into(),
            pointer_symbol,
            bank,
        }
    }

    /// Decode the image and encode it
    pub fn materialize(self) -> RomResult<Tileset> {
        let img = image::open(&self.source)
            .map_err(|source| RomError::Image {
                path: self.source.clone(),
                source,
            })?
            .into_luma8();

        self.materialize_from(&img)
    }

    /// Encode already-decoded pixels for this declaration
    pub fn materialize_from(self, pixels: &impl PixelSource) -> RomResult<Tileset> {
        let data = encode(pixels).map_err(|source| RomError::Format {
            path: self.source.clone(),
            source,
        })?;
        debug!(
            "encoded {} ({} tiles)",
            self.source.display(),
            data.len() / BYTES_PER_TILE
        );

        Ok(Tileset { decl: self, data })
    }
}

/// An encoded tileset. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tileset {
    decl: TilesetDecl,
    data: Vec<u8>,
}

impl Tileset {
    pub fn source(&self) -> &Path {
        &self.decl.source
    }

    pub fn pointer_symbol(&self) -> Option<&str> {
        self.decl.pointer_symbol.as_deref()
    }

    pub fn bank_request(&self) -> &BankRequest {
        &self.decl.bank
    }

    /// Symbol receiving the allocated bank number, if any
    pub fn bank_symbol(&self) -> Option<&str> {
        match &self.decl.bank {
            BankRequest::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Display for Tileset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.decl.source.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(width: u32, height: u32, levels: impl Fn(u32, u32) -> u8) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| image::Luma([levels(x, y)]))
    }

    #[test]
    fn maps_levels_to_palette() {
        assert_eq!(palette_index(0), Some(3));
        assert_eq!(palette_index(85), Some(2));
        assert_eq!(palette_index(170), Some(1));
        assert_eq!(palette_index(255), Some(0));
        assert_eq!(palette_index(128), None);
    }

    #[test]
    fn white_tile_is_all_zero() {
        let data = encode(&strip(8, 8, |_, _| 255)).unwrap();
        assert_eq!(data, vec![0u8; 16]);
    }

    #[test]
    fn black_tile_sets_both_planes() {
        let data = encode(&strip(8, 8, |_, _| 0)).unwrap();
        assert_eq!(data, vec![0xFFu8; 16]);
    }

    #[test]
    fn planes_interleave_per_row() {
        // leftmost pixel light grey (1), next dark grey (2), rest white
        let img = strip(8, 8, |x, _| match x {
            0 => 170,
            1 => 85,
            _ => 255,
        });
        let data = encode(&img).unwrap();
        for row in data.chunks(2) {
            assert_eq!(row, &[0b1000_0000, 0b0100_0000]);
        }
    }

    #[test]
    fn tiles_follow_source_order() {
        let img = strip(16, 8, |x, _| if x < 8 { 255 } else { 0 });
        let data = encode(&img).unwrap();
        assert_eq!(data.len(), 32);
        assert!(data[..16].iter().all(|&b| b == 0x00));
        assert!(data[16..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn rejects_irregular_dimensions() {
        for (w, h) in [(8, 7), (8, 16), (12, 8), (0, 8), (4, 8)] {
            assert_eq!(
                encode(&strip(w, h, |_, _| 0)),
                Err(FormatError::IrregularDimensions { width: w, height: h }),
            );
        }
    }

    #[test]
    fn rejects_bad_levels() {
        let img = strip(16, 8, |x, y| if (x, y) == (11, 3) { 100 } else { 0 });
        assert_eq!(
            encode(&img),
            Err(FormatError::InvalidColorLevel { level: 100, x: 11, y: 3 }),
        );
    }

    #[test]
    fn bank_symbol_only_for_symbol_requests() {
        let img = strip(8, 8, |_, _| 0);
        let fixed = TilesetDecl::new("a.png", None, BankRequest::Fixed(2))
            .materialize_from(&img)
            .unwrap();
        let named = TilesetDecl::new("b.png", Some("b_data".into()), BankRequest::Symbol("b_bank".into()))
            .materialize_from(&img)
            .unwrap();

        assert_eq!(fixed.bank_symbol(), None);
        assert_eq!(named.bank_symbol(), Some("b_bank"));
        assert_eq!(named.pointer_symbol(), Some("b_data"));
        assert_eq!(named.len(), 16);
    }
}
