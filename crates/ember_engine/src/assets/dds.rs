//! DDS texture container decoding
//!
//! Parses a DDS byte stream into a backend-neutral
//! [`TextureDescription`]: dimensions, mip/array counts, pixel format
//! and one byte-range record per (array slice, mip level) image. No
//! GPU work happens here; the copy engine consumes the records to
//! build its staging uploads. The caller keeps ownership of the byte
//! buffer and the records index into it.

use thiserror::Error;

use crate::render::format::{PixelFormat, TextureDimension};

/// `"DDS "` little-endian
const DDS_MAGIC: u32 = 0x2053_4444;
/// `"DX10"` little-endian, marks the extended header
const FOURCC_DX10: u32 = 0x3031_5844;

const HEADER_SIZE: usize = 124;
const PIXEL_FORMAT_SIZE: u32 = 32;
const DX10_HEADER_SIZE: usize = 20;

// Pixel-format flag bits
const DDPF_ALPHAPIXELS: u32 = 0x1;
const DDPF_ALPHA: u32 = 0x2;
const DDPF_FOURCC: u32 = 0x4;
const DDPF_RGB: u32 = 0x40;
const DDPF_LUMINANCE: u32 = 0x2_0000;
const DDPF_BUMPDUDV: u32 = 0x8_0000;

// Header flag / caps bits
const DDSD_DEPTH: u32 = 0x80_0000;
const DDSCAPS2_CUBEMAP: u32 = 0x200;
const DDSCAPS2_CUBEMAP_ALLFACES: u32 = 0xFC00;
const DDSCAPS2_VOLUME: u32 = 0x20_0000;

// DX10 header values
const DDS_DIMENSION_TEXTURE1D: u32 = 2;
const DDS_DIMENSION_TEXTURE2D: u32 = 3;
const DDS_DIMENSION_TEXTURE3D: u32 = 4;
const DDS_RESOURCE_MISC_TEXTURECUBE: u32 = 0x4;

// Hardware-derived maxima
const MAX_MIP_LEVELS: u32 = 15;
const MAX_DIMENSION_1D_2D: u32 = 16384;
const MAX_DIMENSION_3D: u32 = 2048;
const MAX_ARRAY_LAYERS: u32 = 2048;

/// DDS decode failures.
///
/// `NotSupported` marks well-formed files the engine chooses not to
/// handle; `InvalidData` marks files that violate the container
/// format itself. Callers may treat them differently.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DdsError {
    /// The file is valid DDS but uses an unsupported feature
    #[error("unsupported DDS content: {0}")]
    NotSupported(&'static str),

    /// The file violates the DDS container format
    #[error("invalid DDS data: {0}")]
    InvalidData(&'static str),
}

/// Byte range and layout of one decoded image (one mip of one slice)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubresourceData {
    /// Array slice this image belongs to (cubemap faces count as slices)
    pub array_layer: u32,
    /// Mip level within the slice
    pub mip_level: u32,
    /// Absolute byte offset into the source buffer
    pub offset: usize,
    /// Byte length of the image
    pub len: usize,
    /// Bytes per row (per block row for compressed formats)
    pub row_pitch: usize,
    /// Row count (block rows for compressed formats)
    pub rows: usize,
    /// Texel width of this mip
    pub width: u32,
    /// Texel height of this mip
    pub height: u32,
    /// Texel depth of this mip
    pub depth: u32,
}

/// Backend-neutral description of a decoded DDS texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDescription {
    /// Top-level width in texels
    pub width: u32,
    /// Top-level height in texels
    pub height: u32,
    /// Top-level depth in texels (1 unless 3D)
    pub depth: u32,
    /// Number of mip levels per slice
    pub mip_levels: u32,
    /// Number of array slices (faces included for cubemaps)
    pub array_layers: u32,
    /// Decoded pixel format
    pub format: PixelFormat,
    /// 1D, 2D or 3D
    pub dimension: TextureDimension,
    /// Whether the texture is a cubemap (array_layers is a multiple of 6)
    pub cubemap: bool,
    /// Byte offset of the first image in the source buffer
    pub data_offset: usize,
    /// Per-image byte ranges, array slices outer, mip levels inner
    pub images: Vec<SubresourceData>,
}

impl TextureDescription {
    /// Sum of all image byte lengths
    pub fn data_len(&self) -> usize {
        self.images.iter().map(|image| image.len).sum()
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

const fn four_cc(tag: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*tag)
}

/// Legacy pixel-format sub-header
struct DdsPixelFormat {
    flags: u32,
    four_cc: u32,
    rgb_bit_count: u32,
    r_mask: u32,
    g_mask: u32,
    b_mask: u32,
    a_mask: u32,
}

impl DdsPixelFormat {
    fn masks(&self) -> (u32, u32, u32, u32) {
        (self.r_mask, self.g_mask, self.b_mask, self.a_mask)
    }
}

/// Infer a pixel format from the legacy bitmask/FourCC rules
fn format_from_legacy(pf: &DdsPixelFormat) -> Result<PixelFormat, DdsError> {
    if pf.flags & DDPF_RGB != 0 {
        return match pf.rgb_bit_count {
            32 => match pf.masks() {
                (0xFF, 0xFF00, 0xFF_0000, 0xFF00_0000) => Ok(PixelFormat::R8G8B8A8Unorm),
                (0xFF_0000, 0xFF00, 0xFF, 0xFF00_0000) => Ok(PixelFormat::B8G8R8A8Unorm),
                (0xFF_0000, 0xFF00, 0xFF, 0) => Ok(PixelFormat::B8G8R8X8Unorm),
                (0x3FF, 0xF_FC00, 0x3FF0_0000, _) => Ok(PixelFormat::R10G10B10A2Unorm),
                (0xFFFF, 0xFFFF_0000, 0, 0) => Ok(PixelFormat::R16G16Unorm),
                (0xFFFF_FFFF, 0, 0, 0) => Ok(PixelFormat::R32Float),
                _ => Err(DdsError::NotSupported("unrecognized 32-bit RGB masks")),
            },
            24 => Err(DdsError::NotSupported("24-bit RGB formats")),
            16 => match pf.masks() {
                (0x7C00, 0x3E0, 0x1F, 0x8000) => Ok(PixelFormat::B5G5R5A1Unorm),
                (0xF800, 0x7E0, 0x1F, 0) => Ok(PixelFormat::B5G6R5Unorm),
                (0xF00, 0xF0, 0xF, 0xF000) => Ok(PixelFormat::B4G4R4A4Unorm),
                _ => Err(DdsError::NotSupported("unrecognized 16-bit RGB masks")),
            },
            _ => Err(DdsError::NotSupported("unrecognized RGB bit count")),
        };
    }

    if pf.flags & DDPF_LUMINANCE != 0 {
        return match pf.rgb_bit_count {
            8 if pf.r_mask == 0xFF && pf.flags & DDPF_ALPHAPIXELS == 0 => Ok(PixelFormat::R8Unorm),
            16 if pf.r_mask == 0xFFFF => Ok(PixelFormat::R16Unorm),
            16 if pf.r_mask == 0xFF && pf.a_mask == 0xFF00 => Ok(PixelFormat::R8G8Unorm),
            _ => Err(DdsError::NotSupported("unrecognized luminance format")),
        };
    }

    if pf.flags & DDPF_ALPHA != 0 {
        return if pf.rgb_bit_count == 8 {
            Ok(PixelFormat::A8Unorm)
        } else {
            Err(DdsError::NotSupported("unrecognized alpha-only format"))
        };
    }

    if pf.flags & DDPF_BUMPDUDV != 0 {
        return match pf.rgb_bit_count {
            16 if pf.r_mask == 0xFF && pf.g_mask == 0xFF00 => Ok(PixelFormat::R8G8Snorm),
            32 => match pf.masks() {
                (0xFF, 0xFF00, 0xFF_0000, 0xFF00_0000) => Ok(PixelFormat::R8G8B8A8Snorm),
                (0xFFFF, 0xFFFF_0000, 0, 0) => Ok(PixelFormat::R16G16Snorm),
                _ => Err(DdsError::NotSupported("unrecognized bump-map masks")),
            },
            _ => Err(DdsError::NotSupported("unrecognized bump-map format")),
        };
    }

    if pf.flags & DDPF_FOURCC != 0 {
        return match pf.four_cc {
            tag if tag == four_cc(b"DXT1") => Ok(PixelFormat::Bc1Unorm),
            tag if tag == four_cc(b"DXT2") || tag == four_cc(b"DXT3") => Ok(PixelFormat::Bc2Unorm),
            tag if tag == four_cc(b"DXT4") || tag == four_cc(b"DXT5") => Ok(PixelFormat::Bc3Unorm),
            tag if tag == four_cc(b"ATI1") || tag == four_cc(b"BC4U") => Ok(PixelFormat::Bc4Unorm),
            tag if tag == four_cc(b"BC4S") => Ok(PixelFormat::Bc4Snorm),
            tag if tag == four_cc(b"ATI2") || tag == four_cc(b"BC5U") => Ok(PixelFormat::Bc5Unorm),
            tag if tag == four_cc(b"BC5S") => Ok(PixelFormat::Bc5Snorm),
            tag if tag == four_cc(b"RGBG") => Ok(PixelFormat::R8G8B8G8Unorm),
            tag if tag == four_cc(b"GRGB") => Ok(PixelFormat::G8R8G8B8Unorm),
            tag if tag == four_cc(b"YUY2") => Ok(PixelFormat::Yuy2),
            // Legacy numeric D3DFMT codes
            36 => Ok(PixelFormat::R16G16B16A16Unorm),
            110 => Ok(PixelFormat::R16G16B16A16Snorm),
            111 => Ok(PixelFormat::R16Float),
            112 => Ok(PixelFormat::R16G16Float),
            113 => Ok(PixelFormat::R16G16B16A16Float),
            114 => Ok(PixelFormat::R32Float),
            115 => Ok(PixelFormat::R32G32Float),
            116 => Ok(PixelFormat::R32G32B32A32Float),
            _ => Err(DdsError::NotSupported("unrecognized FourCC")),
        };
    }

    Err(DdsError::NotSupported("pixel format flags name no format"))
}

/// Map a DXGI format code from the DX10 header to a pixel format
fn format_from_dxgi(dxgi: u32) -> Result<PixelFormat, DdsError> {
    use PixelFormat::*;
    match dxgi {
        2 => Ok(R32G32B32A32Float),
        10 => Ok(R16G16B16A16Float),
        11 => Ok(R16G16B16A16Unorm),
        13 => Ok(R16G16B16A16Snorm),
        16 => Ok(R32G32Float),
        24 => Ok(R10G10B10A2Unorm),
        28 => Ok(R8G8B8A8Unorm),
        29 => Ok(R8G8B8A8UnormSrgb),
        31 => Ok(R8G8B8A8Snorm),
        34 => Ok(R16G16Float),
        35 => Ok(R16G16Unorm),
        37 => Ok(R16G16Snorm),
        41 => Ok(R32Float),
        49 => Ok(R8G8Unorm),
        51 => Ok(R8G8Snorm),
        54 => Ok(R16Float),
        56 => Ok(R16Unorm),
        61 => Ok(R8Unorm),
        65 => Ok(A8Unorm),
        68 => Ok(R8G8B8G8Unorm),
        69 => Ok(G8R8G8B8Unorm),
        71 => Ok(Bc1Unorm),
        72 => Ok(Bc1UnormSrgb),
        74 => Ok(Bc2Unorm),
        75 => Ok(Bc2UnormSrgb),
        77 => Ok(Bc3Unorm),
        78 => Ok(Bc3UnormSrgb),
        80 => Ok(Bc4Unorm),
        81 => Ok(Bc4Snorm),
        83 => Ok(Bc5Unorm),
        84 => Ok(Bc5Snorm),
        85 => Ok(B5G6R5Unorm),
        86 => Ok(B5G5R5A1Unorm),
        87 => Ok(B8G8R8A8Unorm),
        88 => Ok(B8G8R8X8Unorm),
        91 => Ok(B8G8R8A8UnormSrgb),
        95 => Ok(Bc6hUf16),
        96 => Ok(Bc6hSf16),
        98 => Ok(Bc7Unorm),
        99 => Ok(Bc7UnormSrgb),
        107 => Ok(Yuy2),
        // Planar and sub-sampled video formats cannot be sliced into
        // per-mip images with this container walk
        100..=106 | 108..=115 => Err(DdsError::NotSupported("planar or sub-sampled video format")),
        _ => Err(DdsError::NotSupported("unrecognized DXGI format")),
    }
}

/// Decode a DDS byte stream into a [`TextureDescription`].
///
/// Validates the magic number and both fixed header sizes, resolves
/// the pixel format from either the DX10 extension header or the
/// legacy bitmask/FourCC rules, and slices the pixel payload into
/// per-(slice, mip) byte ranges. Fails with
/// [`DdsError::InvalidData`] if any computed image would run past the
/// end of `bytes`.
pub fn decode_dds(bytes: &[u8]) -> Result<TextureDescription, DdsError> {
    if bytes.len() < 4 + HEADER_SIZE {
        return Err(DdsError::InvalidData("file shorter than the DDS header"));
    }
    if read_u32(bytes, 0) != DDS_MAGIC {
        return Err(DdsError::InvalidData("bad magic number"));
    }

    let header = &bytes[4..4 + HEADER_SIZE];
    if read_u32(header, 0) as usize != HEADER_SIZE {
        return Err(DdsError::InvalidData("header size field is not 124"));
    }

    let flags = read_u32(header, 4);
    let height = read_u32(header, 8);
    let width = read_u32(header, 12);
    let header_depth = read_u32(header, 20);
    let mip_count = read_u32(header, 24);
    let caps2 = read_u32(header, 108);

    if read_u32(header, 72) != PIXEL_FORMAT_SIZE {
        return Err(DdsError::InvalidData("pixel format size field is not 32"));
    }
    let pixel_format = DdsPixelFormat {
        flags: read_u32(header, 76),
        four_cc: read_u32(header, 80),
        rgb_bit_count: read_u32(header, 84),
        r_mask: read_u32(header, 88),
        g_mask: read_u32(header, 92),
        b_mask: read_u32(header, 96),
        a_mask: read_u32(header, 100),
    };

    // A reported mip count of zero means "just the top level"
    let mip_levels = if mip_count == 0 { 1 } else { mip_count };
    if mip_levels > MAX_MIP_LEVELS {
        return Err(DdsError::NotSupported("mip count exceeds hardware limit"));
    }

    let has_dx10 =
        pixel_format.flags & DDPF_FOURCC != 0 && pixel_format.four_cc == FOURCC_DX10;

    let mut array_layers = 1u32;
    let mut cubemap = false;
    let mut depth = 1u32;
    let dimension;
    let format;
    let data_offset;

    if has_dx10 {
        if bytes.len() < 4 + HEADER_SIZE + DX10_HEADER_SIZE {
            return Err(DdsError::InvalidData("file truncates the DX10 header"));
        }
        let dx10 = &bytes[4 + HEADER_SIZE..4 + HEADER_SIZE + DX10_HEADER_SIZE];
        let dxgi_format = read_u32(dx10, 0);
        let resource_dimension = read_u32(dx10, 4);
        let misc_flag = read_u32(dx10, 8);
        array_layers = read_u32(dx10, 12);

        if array_layers == 0 {
            return Err(DdsError::InvalidData("DX10 header declares zero array size"));
        }

        format = format_from_dxgi(dxgi_format)?;
        dimension = match resource_dimension {
            DDS_DIMENSION_TEXTURE1D => TextureDimension::D1,
            DDS_DIMENSION_TEXTURE2D => TextureDimension::D2,
            DDS_DIMENSION_TEXTURE3D => TextureDimension::D3,
            _ => return Err(DdsError::InvalidData("unrecognized resource dimension")),
        };

        if dimension == TextureDimension::D2 && misc_flag & DDS_RESOURCE_MISC_TEXTURECUBE != 0 {
            cubemap = true;
            array_layers = array_layers
                .checked_mul(6)
                .ok_or(DdsError::InvalidData("cubemap array size overflows"))?;
        }
        if dimension == TextureDimension::D3 {
            if flags & DDSD_DEPTH == 0 {
                return Err(DdsError::InvalidData("3D texture without a depth field"));
            }
            depth = header_depth.max(1);
        }
        data_offset = 4 + HEADER_SIZE + DX10_HEADER_SIZE;
    } else {
        format = format_from_legacy(&pixel_format)?;
        if flags & DDSD_DEPTH != 0 || caps2 & DDSCAPS2_VOLUME != 0 {
            dimension = TextureDimension::D3;
            depth = header_depth.max(1);
        } else {
            dimension = TextureDimension::D2;
            if caps2 & DDSCAPS2_CUBEMAP != 0 {
                // Partial cubemaps were legal in old writers; the GPU
                // side needs all six faces
                if caps2 & DDSCAPS2_CUBEMAP_ALLFACES != DDSCAPS2_CUBEMAP_ALLFACES {
                    return Err(DdsError::NotSupported("cubemap with missing faces"));
                }
                cubemap = true;
                array_layers = 6;
            }
        }
        data_offset = 4 + HEADER_SIZE;
    }

    let height = if dimension == TextureDimension::D1 { 1 } else { height };
    check_dimensions(dimension, width, height, depth, array_layers)?;

    let mut images = Vec::with_capacity((array_layers * mip_levels) as usize);
    let mut offset = data_offset;
    for array_layer in 0..array_layers {
        let mut mip_width = width;
        let mut mip_height = height;
        let mut mip_depth = depth;
        for mip_level in 0..mip_levels {
            let layout = format.surface_layout(mip_width, mip_height);
            let len = layout.size * mip_depth as usize;
            if offset + len > bytes.len() {
                return Err(DdsError::InvalidData("image data runs past end of file"));
            }
            images.push(SubresourceData {
                array_layer,
                mip_level,
                offset,
                len,
                row_pitch: layout.row_pitch,
                rows: layout.rows,
                width: mip_width,
                height: mip_height,
                depth: mip_depth,
            });
            offset += len;
            mip_width = (mip_width >> 1).max(1);
            mip_height = (mip_height >> 1).max(1);
            mip_depth = (mip_depth >> 1).max(1);
        }
    }

    log::debug!(
        "decoded DDS: {}x{}x{} {:?}, {} mips, {} layers, {} bytes of image data",
        width,
        height,
        depth,
        format,
        mip_levels,
        array_layers,
        offset - data_offset
    );

    Ok(TextureDescription {
        width,
        height,
        depth,
        mip_levels,
        array_layers,
        format,
        dimension,
        cubemap,
        data_offset,
        images,
    })
}

fn check_dimensions(
    dimension: TextureDimension,
    width: u32,
    height: u32,
    depth: u32,
    array_layers: u32,
) -> Result<(), DdsError> {
    if width == 0 || height == 0 || depth == 0 {
        return Err(DdsError::InvalidData("zero-sized dimension"));
    }
    match dimension {
        TextureDimension::D1 => {
            if width > MAX_DIMENSION_1D_2D {
                return Err(DdsError::NotSupported("1D width exceeds hardware limit"));
            }
        }
        TextureDimension::D2 => {
            if width > MAX_DIMENSION_1D_2D || height > MAX_DIMENSION_1D_2D {
                return Err(DdsError::NotSupported("2D extent exceeds hardware limit"));
            }
        }
        TextureDimension::D3 => {
            if width > MAX_DIMENSION_3D || height > MAX_DIMENSION_3D || depth > MAX_DIMENSION_3D {
                return Err(DdsError::NotSupported("3D extent exceeds hardware limit"));
            }
            if array_layers != 1 {
                return Err(DdsError::NotSupported("arrays of 3D textures"));
            }
        }
    }
    if array_layers > MAX_ARRAY_LAYERS {
        return Err(DdsError::NotSupported("array layer count exceeds hardware limit"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put_u32(bytes: &mut [u8], offset: usize, value: u32) {
        bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    struct HeaderSpec {
        width: u32,
        height: u32,
        depth: u32,
        mip_count: u32,
        flags: u32,
        caps2: u32,
        pf_flags: u32,
        four_cc: u32,
        bit_count: u32,
        masks: (u32, u32, u32, u32),
        dx10: Option<(u32, u32, u32, u32)>, // dxgi, dimension, misc, array
    }

    impl Default for HeaderSpec {
        fn default() -> Self {
            Self {
                width: 4,
                height: 4,
                depth: 1,
                mip_count: 1,
                flags: 0,
                caps2: 0,
                pf_flags: DDPF_RGB | DDPF_ALPHAPIXELS,
                four_cc: 0,
                bit_count: 32,
                masks: (0xFF, 0xFF00, 0xFF_0000, 0xFF00_0000),
                dx10: None,
            }
        }
    }

    fn build_dds(spec: &HeaderSpec, data_len: usize) -> Vec<u8> {
        let header_len = if spec.dx10.is_some() { 148 } else { 128 };
        let mut bytes = vec![0u8; header_len + data_len];
        put_u32(&mut bytes, 0, DDS_MAGIC);
        put_u32(&mut bytes, 4, 124);
        put_u32(&mut bytes, 8, spec.flags);
        put_u32(&mut bytes, 12, spec.height);
        put_u32(&mut bytes, 16, spec.width);
        put_u32(&mut bytes, 24, spec.depth);
        put_u32(&mut bytes, 28, spec.mip_count);
        put_u32(&mut bytes, 76, 32);
        put_u32(&mut bytes, 80, spec.pf_flags);
        put_u32(&mut bytes, 84, spec.four_cc);
        put_u32(&mut bytes, 88, spec.bit_count);
        put_u32(&mut bytes, 92, spec.masks.0);
        put_u32(&mut bytes, 96, spec.masks.1);
        put_u32(&mut bytes, 100, spec.masks.2);
        put_u32(&mut bytes, 104, spec.masks.3);
        put_u32(&mut bytes, 112, spec.caps2);
        if let Some((dxgi, dimension, misc, array)) = spec.dx10 {
            put_u32(&mut bytes, 128, dxgi);
            put_u32(&mut bytes, 132, dimension);
            put_u32(&mut bytes, 136, misc);
            put_u32(&mut bytes, 140, array);
        }
        bytes
    }

    fn bc1_spec(width: u32, height: u32, mips: u32) -> HeaderSpec {
        HeaderSpec {
            width,
            height,
            mip_count: mips,
            pf_flags: DDPF_FOURCC,
            four_cc: four_cc(b"DXT1"),
            bit_count: 0,
            masks: (0, 0, 0, 0),
            ..Default::default()
        }
    }

    fn bc1_chain_len(mut width: u32, mut height: u32, mips: u32) -> usize {
        let mut total = 0;
        for _ in 0..mips {
            total += PixelFormat::Bc1Unorm.surface_layout(width, height).size;
            width = (width >> 1).max(1);
            height = (height >> 1).max(1);
        }
        total
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = build_dds(&HeaderSpec::default(), 64);
        put_u32(&mut bytes, 0, 0xDEAD_BEEF);
        assert_eq!(
            decode_dds(&bytes),
            Err(DdsError::InvalidData("bad magic number"))
        );
    }

    #[test]
    fn test_rejects_wrong_header_size() {
        let mut bytes = build_dds(&HeaderSpec::default(), 64);
        put_u32(&mut bytes, 4, 125);
        assert!(matches!(decode_dds(&bytes), Err(DdsError::InvalidData(_))));
    }

    #[test]
    fn test_rejects_wrong_pixel_format_size() {
        let mut bytes = build_dds(&HeaderSpec::default(), 64);
        put_u32(&mut bytes, 76, 24);
        assert!(matches!(decode_dds(&bytes), Err(DdsError::InvalidData(_))));
    }

    #[test]
    fn test_rejects_sixteen_mips() {
        let spec = bc1_spec(0x8000, 0x8000, 16);
        let bytes = build_dds(&spec, 0);
        assert!(decode_dds(&bytes).is_err());
    }

    #[test]
    fn test_mip_count_zero_defaults_to_one() {
        let spec = HeaderSpec {
            mip_count: 0,
            ..Default::default()
        };
        let bytes = build_dds(&spec, 4 * 4 * 4);
        let desc = decode_dds(&bytes).unwrap();
        assert_eq!(desc.mip_levels, 1);
        assert_eq!(desc.images.len(), 1);
    }

    #[test]
    fn test_bc1_mip_chain_scenario() {
        // 128x128 BC1 with 4 mips: 8192 + 2048 + 512 + 128 bytes
        let data_len = bc1_chain_len(128, 128, 4);
        assert_eq!(data_len, 10880);
        let bytes = build_dds(&bc1_spec(128, 128, 4), data_len);
        let desc = decode_dds(&bytes).unwrap();

        assert_eq!(desc.mip_levels, 4);
        assert_eq!(desc.array_layers, 1);
        assert_eq!(desc.format, PixelFormat::Bc1Unorm);
        assert_eq!(desc.images[0].width, 128);
        assert_eq!(desc.images[3].width, 16);
        assert_eq!(desc.data_len(), bytes.len() - 128);
    }

    #[test]
    fn test_uncompressed_accounting_has_no_gaps() {
        let spec = HeaderSpec {
            width: 8,
            height: 4,
            ..Default::default()
        };
        let bytes = build_dds(&spec, 8 * 4 * 4);
        let desc = decode_dds(&bytes).unwrap();
        assert_eq!(desc.data_len(), bytes.len() - desc.data_offset);

        // Images tile the payload back to back
        let mut expected_offset = desc.data_offset;
        for image in &desc.images {
            assert_eq!(image.offset, expected_offset);
            expected_offset += image.len;
        }
    }

    #[test]
    fn test_mip_chain_monotonicity() {
        let data_len: usize = {
            let (mut w, mut h) = (10u32, 7u32);
            let mut total = 0;
            for _ in 0..4 {
                total += (w * h * 4) as usize;
                w = (w >> 1).max(1);
                h = (h >> 1).max(1);
            }
            total
        };
        let spec = HeaderSpec {
            width: 10,
            height: 7,
            mip_count: 4,
            ..Default::default()
        };
        let desc = decode_dds(&build_dds(&spec, data_len)).unwrap();
        for pair in desc.images.windows(2) {
            assert_eq!(pair[1].width, (pair[0].width >> 1).max(1));
            assert_eq!(pair[1].height, (pair[0].height >> 1).max(1));
        }
    }

    #[test]
    fn test_truncated_payload_is_invalid_data() {
        let bytes = build_dds(&bc1_spec(128, 128, 4), 10880 - 1);
        assert_eq!(
            decode_dds(&bytes),
            Err(DdsError::InvalidData("image data runs past end of file"))
        );
    }

    #[test]
    fn test_dx10_cubemap_multiplies_layers() {
        let spec = HeaderSpec {
            width: 8,
            height: 8,
            pf_flags: DDPF_FOURCC,
            four_cc: FOURCC_DX10,
            dx10: Some((28, DDS_DIMENSION_TEXTURE2D, DDS_RESOURCE_MISC_TEXTURECUBE, 1)),
            ..Default::default()
        };
        let bytes = build_dds(&spec, 6 * 8 * 8 * 4);
        let desc = decode_dds(&bytes).unwrap();
        assert!(desc.cubemap);
        assert_eq!(desc.array_layers, 6);
        assert_eq!(desc.images.len(), 6);
        assert_eq!(desc.format, PixelFormat::R8G8B8A8Unorm);
    }

    #[test]
    fn test_dx10_cubemap_layer_count_overflow_rejected() {
        // arraySize * 6 would wrap a u32; must report bad data, not wrap
        let spec = HeaderSpec {
            width: 8,
            height: 8,
            pf_flags: DDPF_FOURCC,
            four_cc: FOURCC_DX10,
            dx10: Some((
                28,
                DDS_DIMENSION_TEXTURE2D,
                DDS_RESOURCE_MISC_TEXTURECUBE,
                0x2AAA_AAAB,
            )),
            ..Default::default()
        };
        let bytes = build_dds(&spec, 64);
        assert_eq!(
            decode_dds(&bytes),
            Err(DdsError::InvalidData("cubemap array size overflows"))
        );
    }

    #[test]
    fn test_dx10_zero_array_size_rejected() {
        let spec = HeaderSpec {
            pf_flags: DDPF_FOURCC,
            four_cc: FOURCC_DX10,
            dx10: Some((28, DDS_DIMENSION_TEXTURE2D, 0, 0)),
            ..Default::default()
        };
        let bytes = build_dds(&spec, 64);
        assert!(matches!(decode_dds(&bytes), Err(DdsError::InvalidData(_))));
    }

    #[test]
    fn test_legacy_numeric_fourcc() {
        let spec = HeaderSpec {
            pf_flags: DDPF_FOURCC,
            four_cc: 113,
            ..Default::default()
        };
        let bytes = build_dds(&spec, 4 * 4 * 8);
        let desc = decode_dds(&bytes).unwrap();
        assert_eq!(desc.format, PixelFormat::R16G16B16A16Float);
    }

    #[test]
    fn test_oversize_dimension_rejected() {
        let spec = HeaderSpec {
            width: 32768,
            height: 4,
            ..Default::default()
        };
        let bytes = build_dds(&spec, 0);
        assert_eq!(
            decode_dds(&bytes),
            Err(DdsError::NotSupported("2D extent exceeds hardware limit"))
        );
    }

    #[test]
    fn test_planar_video_format_rejected() {
        let spec = HeaderSpec {
            pf_flags: DDPF_FOURCC,
            four_cc: FOURCC_DX10,
            dx10: Some((103, DDS_DIMENSION_TEXTURE2D, 0, 1)), // NV12
            ..Default::default()
        };
        let bytes = build_dds(&spec, 64);
        assert!(matches!(decode_dds(&bytes), Err(DdsError::NotSupported(_))));
    }

    #[test]
    fn test_volume_texture_halves_depth() {
        let spec = HeaderSpec {
            width: 4,
            height: 4,
            depth: 4,
            mip_count: 3,
            flags: DDSD_DEPTH,
            ..Default::default()
        };
        let data_len = 4 * 4 * 4 * 4 + 2 * 2 * 2 * 4 + 1 * 1 * 1 * 4;
        let desc = decode_dds(&build_dds(&spec, data_len)).unwrap();
        assert_eq!(desc.dimension, TextureDimension::D3);
        assert_eq!(desc.images[0].depth, 4);
        assert_eq!(desc.images[1].depth, 2);
        assert_eq!(desc.images[2].depth, 1);
        assert_eq!(desc.data_len(), data_len);
    }

    #[test]
    fn test_legacy_cubemap_requires_all_faces() {
        let spec = HeaderSpec {
            caps2: DDSCAPS2_CUBEMAP | 0x400, // one face only
            ..Default::default()
        };
        let bytes = build_dds(&spec, 4 * 4 * 4);
        assert!(matches!(decode_dds(&bytes), Err(DdsError::NotSupported(_))));
    }
}
