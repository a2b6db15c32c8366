use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use ash::vk;

/// Number of floats in the shader parameter block. The block is a versioned
/// wire contract shared with the compute kernel: exactly this many floats are
/// uploaded per call, whatever the caller supplied.
pub const PARAM_COUNT: usize = 20;

/// Entries per tone-curve lookup table (one per 8-bit sample value).
pub const LUT_SIZE: usize = 256;

/// Slot assignments inside [`ShaderParams`]. Slots 0-10 and 13 are tunable
/// adjustments and opaque to this crate beyond their position; the kernel
/// source under `shaders/` documents the conventional meaning of each.
pub const PARAM_IMAGE_WIDTH: usize = 11;
pub const PARAM_IMAGE_HEIGHT: usize = 12;
pub const PARAM_CROP_LEFT: usize = 14;
pub const PARAM_CROP_TOP: usize = 15;
pub const PARAM_CROP_RIGHT: usize = 16;
pub const PARAM_CROP_BOTTOM: usize = 17;

/// The packed uniform block uploaded to the kernel, 80 bytes.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShaderParams {
    pub values: [f32; PARAM_COUNT],
}

/// Per-channel tone curve lookup tables (RGB composite plus red/green/blue).
#[derive(Clone)]
pub struct ToneCurves {
    pub rgb: [u8; LUT_SIZE],
    pub red: [u8; LUT_SIZE],
    pub green: [u8; LUT_SIZE],
    pub blue: [u8; LUT_SIZE],
}

impl ToneCurves {
    /// The neutral element: every table maps each sample to itself.
    pub fn identity() -> Self {
        let mut lut = [0u8; LUT_SIZE];
        for (i, entry) in lut.iter_mut().enumerate() {
            *entry = i as u8;
        }
        Self {
            rgb: lut,
            red: lut,
            green: lut,
            blue: lut,
        }
    }
}

impl Default for ToneCurves {
    fn default() -> Self {
        Self::identity()
    }
}

/// Normalized crop rectangle. Valid rectangles satisfy
/// `0 <= left < right <= 1` and `0 <= top < bottom <= 1`; anything else is
/// silently repaired to the full frame before use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl CropRect {
    /// The full-frame rectangle (no crop).
    pub const FULL: CropRect = CropRect {
        left: 0.0,
        top: 0.0,
        right: 1.0,
        bottom: 1.0,
    };

    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

impl Default for CropRect {
    fn default() -> Self {
        Self::FULL
    }
}

/// An RGBA image produced by a processing call. Tightly packed, row-major,
/// four bytes per pixel; dropping the value releases the buffer.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Construction options for [`GpuProcessor`].
#[derive(Debug, Clone, Default)]
pub struct GpuOptions {
    /// Pin a physical device by enumeration index instead of taking the
    /// first compute-capable one.
    pub device_index: Option<usize>,
    /// Explicit path to the compiled compute kernel, checked before the
    /// built-in search locations.
    pub shader_path: Option<PathBuf>,
}

/// Details of the selected physical device, for diagnostics and UIs.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub device_type: String,
    pub api_version: String,
    pub queue_family_index: u32,
}

/// GPU-accelerated photographic develop pipeline.
///
/// Owns the whole Vulkan execution environment: instance, device, compute
/// queue, pools, layouts, the compiled kernel, and one reusable command
/// buffer. Per-call buffers are created and destroyed inside each processing
/// call; nothing per-call outlives the call that made it.
pub struct GpuProcessor {
    /// Keeps the loaded Vulkan library alive for the instance's lifetime.
    #[allow(dead_code)]
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: ash::Device,
    pub(crate) queue: vk::Queue,
    pub(crate) queue_family_index: u32,
    pub(crate) command_pool: vk::CommandPool,
    pub(crate) descriptor_pool: vk::DescriptorPool,
    pub(crate) descriptor_set_layout: vk::DescriptorSetLayout,
    pub(crate) pipeline_layout: vk::PipelineLayout,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) shader_module: vk::ShaderModule,
    pub(crate) command_buffer: vk::CommandBuffer,
    pub(crate) device_info: DeviceInfo,
    // One call in flight at a time; losers are rejected, not queued.
    pub(crate) in_flight: AtomicBool,
}
