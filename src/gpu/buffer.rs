use ash::vk;

use crate::errors::{GpuError, Result, VulkanOp};
use crate::gpu::types::GpuProcessor;

/// Uniform block size in bytes (20 floats).
pub(crate) const UNIFORM_BUFFER_SIZE: vk::DeviceSize = 80;

/// Tone-curve LUT size in bytes.
pub(crate) const LUT_BUFFER_SIZE: vk::DeviceSize = 256;

/// Byte size of the device-local input buffer for a `width` x `height` RGB
/// image, rounded up to a 4-byte boundary for storage-buffer word access.
pub(crate) fn input_buffer_size(width: u32, height: u32) -> vk::DeviceSize {
    let bytes = width as vk::DeviceSize * height as vk::DeviceSize * 3;
    bytes.div_ceil(4) * 4
}

/// Byte size of the device-local output buffer for the cropped RGBA result.
/// Four bytes per pixel keeps this word-aligned already.
pub(crate) fn output_buffer_size(width: u32, height: u32) -> vk::DeviceSize {
    width as vk::DeviceSize * height as vk::DeviceSize * 4
}

/// First memory type index whose bit is set in `type_filter` and whose
/// property flags are a superset of `properties`.
pub(crate) fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory_properties.memory_type_count).find(|&i| {
        type_filter & (1 << i) != 0
            && memory_properties.memory_types[i as usize]
                .property_flags
                .contains(properties)
    })
}

/// A `vk::Buffer` with its backing memory, released on drop.
///
/// Every per-call buffer goes through this wrapper so that partial
/// allocation failures unwind whatever was created so far without any
/// hand-written teardown at the failure sites.
pub(crate) struct GpuBuffer {
    device: ash::Device,
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

impl GpuBuffer {
    pub fn new(
        processor: &GpuProcessor,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
        label: &'static str,
    ) -> Result<Self> {
        let device = processor.device.clone();

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.create_buffer(&buffer_info, None) }.vk_op(label)?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_properties = unsafe {
            processor
                .instance
                .get_physical_device_memory_properties(processor.physical_device)
        };
        let Some(memory_type_index) = find_memory_type(
            &memory_properties,
            requirements.memory_type_bits,
            properties,
        ) else {
            unsafe { device.destroy_buffer(buffer, None) };
            log::error!("No compatible memory type for {}", label);
            return Err(GpuError::NoCompatibleMemoryType);
        };

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        let memory = match unsafe { device.allocate_memory(&alloc_info, None) }.vk_op(label) {
            Ok(memory) => memory,
            Err(err) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(err);
            }
        };

        let bound = unsafe { device.bind_buffer_memory(buffer, memory, 0) }.vk_op(label);
        if let Err(err) = bound {
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return Err(err);
        }

        Ok(Self {
            device,
            buffer,
            memory,
            size,
        })
    }

    /// Map/copy/unmap host bytes into a host-visible buffer.
    pub fn write_bytes(&self, data: &[u8]) -> Result<()> {
        debug_assert!(data.len() as vk::DeviceSize <= self.size);
        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
                .vk_op("map_memory (write)")?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.cast::<u8>(), data.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Map a host-visible buffer and copy `len` bytes out into a fresh Vec.
    pub fn read_bytes(&self, len: usize) -> Result<Vec<u8>> {
        debug_assert!(len as vk::DeviceSize <= self.size);
        let mut out = vec![0u8; len];
        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
                .vk_op("map_memory (read)")?;
            std::ptr::copy_nonoverlapping(mapped.cast::<u8>(), out.as_mut_ptr(), len);
            self.device.unmap_memory(self.memory);
        }
        Ok(out)
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
