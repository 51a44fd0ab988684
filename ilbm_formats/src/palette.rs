use std::ops::Range;

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use crate::error::{IlbmError, Result};

/// 24-bit colour as stored in a CMAP chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const BLACK: Rgb8 = Rgb8::new(0x00, 0x00, 0x00);
    pub const WHITE: Rgb8 = Rgb8::new(0xFF, 0xFF, 0xFF);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// 12-bit `0RGB` colour register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmigaColor(pub u16);

impl AmigaColor {
    /// Keep the top nibble of each channel.
    pub fn from_rgb8(color: Rgb8) -> Self {
        let r = u16::from(color.r >> 4);
        let g = u16::from(color.g >> 4);
        let b = u16::from(color.b >> 4);
        AmigaColor((r << 8) | (g << 4) | b)
    }

    /// Replicate each nibble into a full byte (`0xF` becomes `0xFF`).
    pub fn to_rgb8(self) -> Rgb8 {
        let nibble = |shift: u16| ((self.0 >> shift) & 0x0F) as u8 * 17;
        Rgb8::new(nibble(8), nibble(4), nibble(0))
    }

    /// The top nibble is unused by the hardware and should be zero.
    pub fn has_stray_bits(self) -> bool {
        self.0 & 0xF000 != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Palette {
    colors: Vec<Rgb8>,
}

impl Palette {
    pub fn new(colors: Vec<Rgb8>) -> Self {
        Self { colors }
    }

    /// Black background followed by white for every other entry.
    pub fn default_for(count: usize) -> Self {
        let colors = (0..count)
            .map(|index| if index == 0 { Rgb8::BLACK } else { Rgb8::WHITE })
            .collect();
        Self { colors }
    }

    /// Parse CMAP payload bytes. A trailing partial triplet is ignored.
    pub fn from_cmap(bytes: &[u8]) -> Self {
        let colors = bytes
            .chunks_exact(3)
            .map(|rgb| Rgb8::new(rgb[0], rgb[1], rgb[2]))
            .collect();
        Self { colors }
    }

    /// Parse big-endian Amiga colour words.
    pub fn from_amiga_words(bytes: &[u8]) -> Self {
        let mut warned = false;
        let colors = bytes
            .chunks_exact(2)
            .enumerate()
            .map(|(index, word)| {
                let color = AmigaColor(BigEndian::read_u16(word));
                if color.has_stray_bits() && !warned {
                    log::warn!(
                        "colour {index} has non-zero leading bits ({:#06x}); palette format might be incorrect",
                        color.0
                    );
                    warned = true;
                }
                color.to_rgb8()
            })
            .collect();
        Self { colors }
    }

    pub fn colors(&self) -> &[Rgb8] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// CMAP payload: one RGB triplet per entry, unpadded.
    pub fn to_cmap_bytes(&self) -> Vec<u8> {
        self.colors
            .iter()
            .flat_map(|color| [color.r, color.g, color.b])
            .collect()
    }

    pub fn to_amiga_words(&self) -> Vec<AmigaColor> {
        self.colors.iter().copied().map(AmigaColor::from_rgb8).collect()
    }

    /// `.pal` artifact: one big-endian colour word per entry.
    pub fn to_pal_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.colors.len() * 2];
        for (slot, color) in out.chunks_exact_mut(2).zip(self.to_amiga_words()) {
            BigEndian::write_u16(slot, color.0);
        }
        out
    }
}

/// Locate a palette appended to raw pixel data.
///
/// Returns the byte range of the trailing colour words, `None` when the input
/// is exactly `pixel_len` bytes, and a size mismatch for any other length.
pub fn detect_trailing_palette(
    file_len: usize,
    pixel_len: usize,
    colors: usize,
) -> Result<Option<Range<usize>>> {
    let with_palette = pixel_len + colors * 2;
    if file_len == with_palette {
        Ok(Some(pixel_len..with_palette))
    } else if file_len == pixel_len {
        Ok(None)
    } else {
        Err(IlbmError::SizeMismatch {
            actual: file_len,
            expected: pixel_len,
            expected_with_palette: with_palette,
        })
    }
}

/// Split raw input into its pixel bytes and an optional trailing palette.
pub fn split_trailing_palette(
    input: &[u8],
    pixel_len: usize,
    colors: usize,
) -> Result<(&[u8], Option<Palette>)> {
    let palette = detect_trailing_palette(input.len(), pixel_len, colors)?
        .map(|range| Palette::from_amiga_words(&input[range]));
    Ok((&input[..pixel_len], palette))
}
