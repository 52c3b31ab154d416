//! Backend-neutral pixel formats and surface size arithmetic

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureDimension {
    /// One-dimensional texture
    D1,
    /// Two-dimensional texture (including arrays and cubemaps)
    D2,
    /// Volume texture
    D3,
}

/// Pixel formats understood by the engine.
///
/// The set covers what the DDS container can describe and what the
/// two backends can create; anything else is reported as unsupported
/// at decode time rather than silently remapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum PixelFormat {
    R8Unorm,
    A8Unorm,
    R8G8Unorm,
    R8G8Snorm,
    R8G8B8A8Unorm,
    R8G8B8A8UnormSrgb,
    R8G8B8A8Snorm,
    B8G8R8A8Unorm,
    B8G8R8A8UnormSrgb,
    B8G8R8X8Unorm,
    B5G6R5Unorm,
    B5G5R5A1Unorm,
    B4G4R4A4Unorm,
    R10G10B10A2Unorm,
    R16Unorm,
    R16Float,
    R16G16Unorm,
    R16G16Snorm,
    R16G16Float,
    R16G16B16A16Unorm,
    R16G16B16A16Snorm,
    R16G16B16A16Float,
    R32Float,
    R32G32Float,
    R32G32B32A32Float,
    // Packed 4:2:2 formats; one element covers two horizontal pixels
    R8G8B8G8Unorm,
    G8R8G8B8Unorm,
    Yuy2,
    // Block-compressed formats, 4x4 texel blocks
    Bc1Unorm,
    Bc1UnormSrgb,
    Bc2Unorm,
    Bc2UnormSrgb,
    Bc3Unorm,
    Bc3UnormSrgb,
    Bc4Unorm,
    Bc4Snorm,
    Bc5Unorm,
    Bc5Snorm,
    Bc6hUf16,
    Bc6hSf16,
    Bc7Unorm,
    Bc7UnormSrgb,
}

/// Byte layout of one 2D surface (a single mip of a single slice)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceLayout {
    /// Bytes per row (for block formats: per row of blocks)
    pub row_pitch: usize,
    /// Number of rows (for block formats: rows of blocks)
    pub rows: usize,
    /// Total bytes for the surface
    pub size: usize,
}

impl PixelFormat {
    /// Whether the format stores 4x4 blocks instead of texels
    pub fn is_block_compressed(self) -> bool {
        self.block_bytes().is_some()
    }

    /// Bytes per 4x4 block for block-compressed formats
    pub fn block_bytes(self) -> Option<usize> {
        use PixelFormat::*;
        match self {
            Bc1Unorm | Bc1UnormSrgb | Bc4Unorm | Bc4Snorm => Some(8),
            Bc2Unorm | Bc2UnormSrgb | Bc3Unorm | Bc3UnormSrgb | Bc5Unorm | Bc5Snorm
            | Bc6hUf16 | Bc6hSf16 | Bc7Unorm | Bc7UnormSrgb => Some(16),
            _ => None,
        }
    }

    /// Bytes per element for packed formats, where one element covers
    /// two horizontal pixels
    pub fn packed_element_bytes(self) -> Option<usize> {
        use PixelFormat::*;
        match self {
            R8G8B8G8Unorm | G8R8G8B8Unorm | Yuy2 => Some(4),
            _ => None,
        }
    }

    /// Bits per texel for plain (non-block, non-packed) formats
    pub fn bits_per_pixel(self) -> usize {
        use PixelFormat::*;
        match self {
            R8Unorm | A8Unorm => 8,
            R8G8Unorm | R8G8Snorm | B5G6R5Unorm | B5G5R5A1Unorm | B4G4R4A4Unorm | R16Unorm
            | R16Float => 16,
            R8G8B8A8Unorm | R8G8B8A8UnormSrgb | R8G8B8A8Snorm | B8G8R8A8Unorm
            | B8G8R8A8UnormSrgb | B8G8R8X8Unorm | R10G10B10A2Unorm | R16G16Unorm | R16G16Snorm
            | R16G16Float | R32Float | R8G8B8G8Unorm | G8R8G8B8Unorm | Yuy2 => 32,
            R16G16B16A16Unorm | R16G16B16A16Snorm | R16G16B16A16Float | R32G32Float => 64,
            R32G32B32A32Float => 128,
            // Effective rates for the block formats, used only for
            // diagnostics; sizing goes through block_bytes
            Bc1Unorm | Bc1UnormSrgb | Bc4Unorm | Bc4Snorm => 4,
            Bc2Unorm | Bc2UnormSrgb | Bc3Unorm | Bc3UnormSrgb | Bc5Unorm | Bc5Snorm
            | Bc6hUf16 | Bc6hSf16 | Bc7Unorm | Bc7UnormSrgb => 8,
        }
    }

    /// Compute the byte layout of a single `width` x `height` surface.
    ///
    /// Block-compressed formats count 4x4 blocks with a minimum of
    /// one block per axis; packed formats count two-pixel elements;
    /// everything else is `(width * bpp + 7) / 8` bytes per row.
    pub fn surface_layout(self, width: u32, height: u32) -> SurfaceLayout {
        let (row_pitch, rows) = if let Some(block_bytes) = self.block_bytes() {
            let blocks_wide = usize::max(1, (width as usize + 3) / 4);
            let blocks_high = usize::max(1, (height as usize + 3) / 4);
            (blocks_wide * block_bytes, blocks_high)
        } else if let Some(element_bytes) = self.packed_element_bytes() {
            let elements = (width as usize + 1) / 2;
            (elements * element_bytes, height as usize)
        } else {
            let row_bytes = (width as usize * self.bits_per_pixel() + 7) / 8;
            (row_bytes, height as usize)
        };
        SurfaceLayout {
            row_pitch,
            rows,
            size: row_pitch * rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_compressed_rounds_to_blocks() {
        // 1x1 BC1 still occupies a whole 8-byte block
        let layout = PixelFormat::Bc1Unorm.surface_layout(1, 1);
        assert_eq!(layout, SurfaceLayout { row_pitch: 8, rows: 1, size: 8 });

        // 5 texels wide needs two blocks per row
        let layout = PixelFormat::Bc7Unorm.surface_layout(5, 4);
        assert_eq!(layout.row_pitch, 32);
        assert_eq!(layout.rows, 1);
    }

    #[test]
    fn test_packed_format_pairs_pixels() {
        let layout = PixelFormat::Yuy2.surface_layout(3, 2);
        assert_eq!(layout.row_pitch, 8);
        assert_eq!(layout.size, 16);
    }

    #[test]
    fn test_plain_format_row_bytes() {
        let layout = PixelFormat::R8G8B8A8Unorm.surface_layout(7, 3);
        assert_eq!(layout.row_pitch, 28);
        assert_eq!(layout.size, 84);
    }
}
