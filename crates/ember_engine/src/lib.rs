//! # Ember Engine
//!
//! Rendering core with two native backends behind one trait: Vulkan
//! everywhere, DirectX 12 on Windows.
//!
//! The engine owns GPU resources behind opaque handles and performs
//! no implicit state tracking; callers declare every resource state
//! transition explicitly. Texture data arrives through the DDS
//! decoder and the synchronous copy engine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ember_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RendererConfig::default();
//!     let mut renderer = create_renderer(GraphicsApi::Vulkan, &config, None)?;
//!
//!     let (description, bytes) = ember_engine::assets::load_dds("assets/brick.dds")?;
//!     let texture = renderer.create_texture(&TextureDesc::from_dds(&description))?;
//!     renderer.upload_texture(texture, &description, &bytes)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions, clippy::similar_names)]

pub mod assets;
pub mod config;
pub mod render;
pub mod util;

pub use config::{ConfigError, DescriptorCapacities, RendererConfig};
pub use render::{create_renderer, GraphicsApi, RenderBackend, RenderError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::assets::{decode_dds, TextureDescription};
    pub use crate::config::RendererConfig;
    pub use crate::render::{
        create_renderer, BufferDesc, BufferUsage, DescriptorUpdate, DescriptorWrite, GraphicsApi,
        MemoryUsage, PixelFormat, RenderBackend, RenderError, ResourceRef, ResourceState,
        ResourceTransition, SamplerDesc, TextureDesc, TextureUsage, UpdateFrequency,
    };
}
