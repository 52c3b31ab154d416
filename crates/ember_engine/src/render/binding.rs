//! Shader resource binding vocabulary shared by both backends
//!
//! Descriptor sets (Vulkan) and descriptor tables (DirectX) are
//! partitioned by update frequency. Root-signature and
//! pipeline-layout slot numbering depends on which frequencies a
//! pipeline actually uses, so the numbering lives here as one shared
//! function instead of per backend.

use crate::render::resources::{BufferHandle, SamplerHandle, TextureHandle};

/// How often descriptors in a partition are rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateFrequency {
    /// Written once, never updated
    None,
    /// Rewritten for every draw
    PerDraw,
    /// Rewritten once per frame
    PerFrame,
    /// Static sampler partition
    Sampler,
}

impl UpdateFrequency {
    /// Number of distinct frequencies
    pub const COUNT: usize = 4;

    /// All frequencies in slot-numbering order
    pub const ALL: [Self; Self::COUNT] = [Self::None, Self::PerDraw, Self::PerFrame, Self::Sampler];

    /// Stable ordinal of this frequency
    pub fn index(self) -> usize {
        match self {
            Self::None => 0,
            Self::PerDraw => 1,
            Self::PerFrame => 2,
            Self::Sampler => 3,
        }
    }

    /// Whether a write of the given kind belongs in this partition.
    ///
    /// The sampler partition holds only samplers; the resource
    /// partitions hold everything else.
    pub fn accepts(self, update: &DescriptorUpdate) -> bool {
        let is_sampler = matches!(update, DescriptorUpdate::Sampler { .. });
        (self == Self::Sampler) == is_sampler
    }
}

/// Assign consecutive binding-slot numbers to the present frequencies.
///
/// A pipeline layout only declares the partitions it uses, so the
/// set/root-parameter index of a frequency shifts depending on which
/// lower-ordered frequencies exist. Pipeline-layout and
/// root-signature construction sit above the resource core, so the
/// numbering is exported for that layer; both backends must agree on
/// it, which is why it is one shared function here rather than two
/// private copies.
pub fn binding_slots(present: [bool; UpdateFrequency::COUNT]) -> [Option<u32>; UpdateFrequency::COUNT] {
    let mut slots = [None; UpdateFrequency::COUNT];
    let mut next = 0u32;
    for (index, present) in present.iter().enumerate() {
        if *present {
            slots[index] = Some(next);
            next += 1;
        }
    }
    slots
}

/// One descriptor write, tagged by the kind of resource bound
#[derive(Debug, Clone, Copy)]
pub enum DescriptorUpdate {
    /// Bind a buffer range as a uniform/constant buffer
    UniformBuffer {
        /// Buffer to bind
        buffer: BufferHandle,
        /// Byte offset of the bound range
        offset: u64,
        /// Byte length of the bound range
        range: u64,
    },
    /// Bind a buffer range as a storage buffer
    StorageBuffer {
        /// Buffer to bind
        buffer: BufferHandle,
        /// Byte offset of the bound range
        offset: u64,
        /// Byte length of the bound range
        range: u64,
    },
    /// Bind a texture for sampled reads
    SampledTexture {
        /// Texture to bind
        texture: TextureHandle,
    },
    /// Bind a texture for unordered access
    StorageTexture {
        /// Texture to bind
        texture: TextureHandle,
    },
    /// Bind a sampler
    Sampler {
        /// Sampler to bind
        sampler: SamplerHandle,
    },
}

/// A descriptor write targeting one binding slot of a set
#[derive(Debug, Clone, Copy)]
pub struct DescriptorWrite {
    /// Binding number within the set layout
    pub binding: u32,
    /// Array element within the binding
    pub array_element: u32,
    /// What to bind
    pub update: DescriptorUpdate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_frequencies_number_consecutively() {
        let slots = binding_slots([true; 4]);
        assert_eq!(slots, [Some(0), Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn test_absent_frequencies_shift_numbering() {
        // No per-draw partition: per-frame and sampler move down
        let slots = binding_slots([true, false, true, true]);
        assert_eq!(slots[UpdateFrequency::None.index()], Some(0));
        assert_eq!(slots[UpdateFrequency::PerDraw.index()], None);
        assert_eq!(slots[UpdateFrequency::PerFrame.index()], Some(1));
        assert_eq!(slots[UpdateFrequency::Sampler.index()], Some(2));
    }

    #[test]
    fn test_empty_layout() {
        assert_eq!(binding_slots([false; 4]), [None; 4]);
    }

    #[test]
    fn test_sampler_partition_only_accepts_samplers() {
        let sampler = DescriptorUpdate::Sampler {
            sampler: SamplerHandle::default(),
        };
        let buffer = DescriptorUpdate::UniformBuffer {
            buffer: BufferHandle::default(),
            offset: 0,
            range: 64,
        };
        assert!(UpdateFrequency::Sampler.accepts(&sampler));
        assert!(!UpdateFrequency::Sampler.accepts(&buffer));
        assert!(UpdateFrequency::PerFrame.accepts(&buffer));
        assert!(!UpdateFrequency::PerFrame.accepts(&sampler));
        assert!(UpdateFrequency::None.accepts(&buffer));
    }
}
