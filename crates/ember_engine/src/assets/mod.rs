//! Asset loading: file reading and texture container decoding

pub mod dds;

use std::path::Path;

use thiserror::Error;

pub use dds::{decode_dds, DdsError, SubresourceData, TextureDescription};

/// Errors produced by the asset layer
#[derive(Debug, Error)]
pub enum AssetError {
    /// The file could not be read
    #[error("failed to read asset file: {0}")]
    Io(#[from] std::io::Error),

    /// The file contents could not be decoded
    #[error(transparent)]
    Dds(#[from] DdsError),
}

/// Read a whole file into memory.
///
/// Used for compiled shader bytecode and raw DDS bytes; decoding is a
/// separate step so callers can source bytes from elsewhere.
pub fn read_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, AssetError> {
    let path = path.as_ref();
    log::debug!("reading asset file: {:?}", path);
    Ok(std::fs::read(path)?)
}

/// Read and decode a DDS file in one step.
///
/// Returns the description together with the raw bytes the image
/// records index into; the caller keeps the bytes alive until any
/// GPU upload has completed.
pub fn load_dds<P: AsRef<Path>>(path: P) -> Result<(TextureDescription, Vec<u8>), AssetError> {
    let bytes = read_bytes(path)?;
    let description = decode_dds(&bytes)?;
    Ok((description, bytes))
}
