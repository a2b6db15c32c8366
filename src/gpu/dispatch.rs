use std::sync::atomic::{AtomicBool, Ordering};

use ash::vk;

use crate::errors::{GpuError, Result, VulkanOp};
use crate::gpu::buffer::{
    input_buffer_size, output_buffer_size, GpuBuffer, LUT_BUFFER_SIZE, UNIFORM_BUFFER_SIZE,
};
use crate::gpu::params::pack_params;
use crate::gpu::types::{CropRect, GpuProcessor, ProcessedImage, ToneCurves};
use crate::logging;

/// Compute kernel tile edge; the dispatch grid is sized from the output
/// geometry in tiles of this many pixels per axis.
const WORKGROUP_SIZE: u32 = 16;

/// Releases the in-flight flag on every exit path.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    /// Race-free try-lock with immediate-fail semantics: a concurrent call
    /// is rejected, never queued.
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| {
                log::warn!("Processing call rejected: another call is in flight");
                GpuError::Busy
            })?;
        Ok(Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Frees the per-call descriptor set and resets the shared command buffer,
/// on success and on every failure path alike.
struct CallResources<'a> {
    device: &'a ash::Device,
    descriptor_pool: vk::DescriptorPool,
    descriptor_set: vk::DescriptorSet,
    command_buffer: vk::CommandBuffer,
}

impl Drop for CallResources<'_> {
    fn drop(&mut self) {
        unsafe {
            let _ = self
                .device
                .free_descriptor_sets(self.descriptor_pool, &[self.descriptor_set]);
            let _ = self
                .device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty());
        }
    }
}

fn validate_input(input: &[u8], width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(GpuError::InvalidInput {
            message: format!("image dimensions {width}x{height}"),
        });
    }
    let expected = width as usize * height as usize * 3;
    if input.len() != expected {
        return Err(GpuError::InvalidInput {
            message: format!(
                "expected {expected} bytes of RGB data for {width}x{height}, got {}",
                input.len()
            ),
        });
    }
    Ok(())
}

impl GpuProcessor {
    /// Applies the adjustment vector to an RGB image, producing RGBA.
    /// Tone curves default to identity; no cropping.
    pub fn process_image(
        &self,
        input: &[u8],
        width: u32,
        height: u32,
        adjustments: &[f32],
    ) -> Result<ProcessedImage> {
        self.process_internal(input, width, height, adjustments, &ToneCurves::identity(), None)
    }

    /// Applies the adjustment vector and per-channel tone curves. Output
    /// dimensions equal input dimensions.
    pub fn process_with_curves(
        &self,
        input: &[u8],
        width: u32,
        height: u32,
        adjustments: &[f32],
        curves: &ToneCurves,
    ) -> Result<ProcessedImage> {
        self.process_internal(input, width, height, adjustments, curves, None)
    }

    /// Full form: adjustments, tone curves, and a normalized crop. The
    /// returned image carries the cropped dimensions.
    pub fn process_with_curves_and_crop(
        &self,
        input: &[u8],
        width: u32,
        height: u32,
        adjustments: &[f32],
        crop: CropRect,
        curves: &ToneCurves,
    ) -> Result<ProcessedImage> {
        self.process_internal(input, width, height, adjustments, curves, Some(crop))
    }

    fn process_internal(
        &self,
        input: &[u8],
        width: u32,
        height: u32,
        adjustments: &[f32],
        curves: &ToneCurves,
        crop: Option<CropRect>,
    ) -> Result<ProcessedImage> {
        validate_input(input, width, height)?;
        let _guard = InFlightGuard::acquire(&self.in_flight)?;

        let rect = crop.map(CropRect::sanitized).unwrap_or(CropRect::FULL);
        let (output_width, output_height) = rect.output_dims(width, height);
        if logging::verbose() {
            log::debug!(
                "Processing {}x{} -> {}x{} with {} adjustments",
                width,
                height,
                output_width,
                output_height,
                adjustments.len()
            );
        }

        let params = pack_params(adjustments, width, height, rect);
        let input_len = width as usize * height as usize * 3;
        let output_len = output_width as usize * output_height as usize * 4;

        let device = &self.device;
        let host_visible =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;

        // Device-local image buffers; pixel data crosses the boundary through
        // the staging pair below.
        let input_buffer = GpuBuffer::new(
            self,
            input_buffer_size(width, height),
            vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            "create_buffer (input)",
        )?;
        let output_buffer = GpuBuffer::new(
            self,
            output_buffer_size(output_width, output_height),
            vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            "create_buffer (output)",
        )?;

        // Small fixed-size host-visible buffers are written by direct mapping.
        let uniform_buffer = GpuBuffer::new(
            self,
            UNIFORM_BUFFER_SIZE,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            host_visible,
            "create_buffer (params)",
        )?;
        uniform_buffer.write_bytes(bytemuck::bytes_of(&params))?;

        let lut_usage =
            vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST;
        let rgb_lut = GpuBuffer::new(self, LUT_BUFFER_SIZE, lut_usage, host_visible, "create_buffer (rgb_lut)")?;
        rgb_lut.write_bytes(&curves.rgb)?;
        let red_lut = GpuBuffer::new(self, LUT_BUFFER_SIZE, lut_usage, host_visible, "create_buffer (red_lut)")?;
        red_lut.write_bytes(&curves.red)?;
        let green_lut = GpuBuffer::new(self, LUT_BUFFER_SIZE, lut_usage, host_visible, "create_buffer (green_lut)")?;
        green_lut.write_bytes(&curves.green)?;
        let blue_lut = GpuBuffer::new(self, LUT_BUFFER_SIZE, lut_usage, host_visible, "create_buffer (blue_lut)")?;
        blue_lut.write_bytes(&curves.blue)?;

        let staging_in = GpuBuffer::new(
            self,
            input_len as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            host_visible,
            "create_buffer (staging in)",
        )?;
        staging_in.write_bytes(input)?;
        let staging_out = GpuBuffer::new(
            self,
            output_len as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_DST,
            host_visible,
            "create_buffer (staging out)",
        )?;

        // Descriptor sets are allocated fresh per call, never cached.
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.descriptor_pool)
            .set_layouts(std::slice::from_ref(&self.descriptor_set_layout));
        let descriptor_set = unsafe { device.allocate_descriptor_sets(&alloc_info) }
            .vk_op("allocate_descriptor_sets")?[0];
        let _call = CallResources {
            device,
            descriptor_pool: self.descriptor_pool,
            descriptor_set,
            command_buffer: self.command_buffer,
        };

        let buffer_infos = [
            descriptor_info(&input_buffer, vk::WHOLE_SIZE),
            descriptor_info(&output_buffer, vk::WHOLE_SIZE),
            descriptor_info(&uniform_buffer, UNIFORM_BUFFER_SIZE),
            descriptor_info(&rgb_lut, LUT_BUFFER_SIZE),
            descriptor_info(&red_lut, LUT_BUFFER_SIZE),
            descriptor_info(&green_lut, LUT_BUFFER_SIZE),
            descriptor_info(&blue_lut, LUT_BUFFER_SIZE),
        ];
        let writes = [
            buffer_write(descriptor_set, 0, vk::DescriptorType::STORAGE_BUFFER, &buffer_infos[0]),
            buffer_write(descriptor_set, 1, vk::DescriptorType::STORAGE_BUFFER, &buffer_infos[1]),
            buffer_write(descriptor_set, 2, vk::DescriptorType::UNIFORM_BUFFER, &buffer_infos[2]),
            buffer_write(descriptor_set, 3, vk::DescriptorType::STORAGE_BUFFER, &buffer_infos[3]),
            buffer_write(descriptor_set, 4, vk::DescriptorType::STORAGE_BUFFER, &buffer_infos[4]),
            buffer_write(descriptor_set, 5, vk::DescriptorType::STORAGE_BUFFER, &buffer_infos[5]),
            buffer_write(descriptor_set, 6, vk::DescriptorType::STORAGE_BUFFER, &buffer_infos[6]),
        ];
        unsafe { device.update_descriptor_sets(&writes, &[]) };

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { device.begin_command_buffer(self.command_buffer, &begin_info) }
            .vk_op("begin_command_buffer")?;

        unsafe {
            let upload = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size: input_len as vk::DeviceSize,
            };
            device.cmd_copy_buffer(
                self.command_buffer,
                staging_in.buffer,
                input_buffer.buffer,
                std::slice::from_ref(&upload),
            );

            // Transfer writes -> compute shader reads, whole memory domain.
            let barrier = vk::MemoryBarrier::default()
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::SHADER_READ);
            device.cmd_pipeline_barrier(
                self.command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::DependencyFlags::empty(),
                std::slice::from_ref(&barrier),
                &[],
                &[],
            );

            device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                self.pipeline,
            );
            device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                self.pipeline_layout,
                0,
                std::slice::from_ref(&descriptor_set),
                &[],
            );

            // The grid covers the post-crop output geometry.
            device.cmd_dispatch(
                self.command_buffer,
                output_width.div_ceil(WORKGROUP_SIZE),
                output_height.div_ceil(WORKGROUP_SIZE),
                1,
            );

            // Compute shader writes -> transfer reads.
            let barrier = vk::MemoryBarrier::default()
                .src_access_mask(vk::AccessFlags::SHADER_WRITE)
                .dst_access_mask(vk::AccessFlags::TRANSFER_READ);
            device.cmd_pipeline_barrier(
                self.command_buffer,
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                std::slice::from_ref(&barrier),
                &[],
                &[],
            );

            let download = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size: output_len as vk::DeviceSize,
            };
            device.cmd_copy_buffer(
                self.command_buffer,
                output_buffer.buffer,
                staging_out.buffer,
                std::slice::from_ref(&download),
            );
        }

        unsafe { device.end_command_buffer(self.command_buffer) }.vk_op("end_command_buffer")?;

        let submit_info =
            vk::SubmitInfo::default().command_buffers(std::slice::from_ref(&self.command_buffer));
        unsafe {
            device.queue_submit(self.queue, std::slice::from_ref(&submit_info), vk::Fence::null())
        }
        .vk_op("queue_submit")?;
        // Synchronous semantics: block until the queue drains.
        unsafe { device.queue_wait_idle(self.queue) }.vk_op("queue_wait_idle")?;

        let pixels = staging_out.read_bytes(output_len)?;
        if logging::verbose() {
            log::debug!("Processing complete ({} output bytes)", pixels.len());
        }

        Ok(ProcessedImage {
            pixels,
            width: output_width,
            height: output_height,
        })
    }
}

fn descriptor_info(buffer: &GpuBuffer, range: vk::DeviceSize) -> vk::DescriptorBufferInfo {
    vk::DescriptorBufferInfo {
        buffer: buffer.buffer,
        offset: 0,
        range,
    }
}

fn buffer_write<'a>(
    set: vk::DescriptorSet,
    binding: u32,
    descriptor_type: vk::DescriptorType,
    info: &'a vk::DescriptorBufferInfo,
) -> vk::WriteDescriptorSet<'a> {
    vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .descriptor_type(descriptor_type)
        .buffer_info(std::slice::from_ref(info))
}
