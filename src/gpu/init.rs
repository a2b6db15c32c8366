use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use ash::vk;

use crate::errors::{GpuError, Result, VulkanOp};
use crate::gpu::info::query_device_info;
use crate::gpu::types::{GpuOptions, GpuProcessor};
use crate::logging;

/// File name of the compiled compute kernel.
pub(crate) const SHADER_FILE_NAME: &str = "develop.spv";

const SPIRV_MAGIC: u32 = 0x0723_0203;

impl GpuProcessor {
    /// Creates the full GPU execution environment: instance, device, compute
    /// queue, pools, layouts, the compiled kernel, and one reusable command
    /// buffer. Construction failure tears down whatever was created.
    pub fn new(options: &GpuOptions) -> Result<Self> {
        let entry = unsafe { ash::Entry::load() }.map_err(|err| GpuError::LibraryLoad {
            message: err.to_string(),
        })?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"rdevelop")
            .application_version(vk::make_api_version(0, 0, 3, 0))
            .engine_name(c"rdevelop")
            .engine_version(vk::make_api_version(0, 0, 3, 0))
            .api_version(vk::API_VERSION_1_2);
        let create_info = vk::InstanceCreateInfo::default().application_info(&app_info);
        let instance =
            unsafe { entry.create_instance(&create_info, None) }.vk_op("create_instance")?;

        // Until the processor struct exists, failures unwind the instance by
        // hand; everything after that is released by Drop.
        let (physical_device, queue_family_index) =
            match select_physical_device(&instance, options) {
                Ok(selected) => selected,
                Err(err) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(err);
                }
            };

        let device = match create_logical_device(&instance, physical_device, queue_family_index) {
            Ok(device) => device,
            Err(err) => {
                unsafe { instance.destroy_instance(None) };
                return Err(err);
            }
        };

        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };
        let device_info = query_device_info(&instance, physical_device, queue_family_index);

        let mut processor = GpuProcessor {
            entry,
            instance,
            physical_device,
            device,
            queue,
            queue_family_index,
            command_pool: vk::CommandPool::null(),
            descriptor_pool: vk::DescriptorPool::null(),
            descriptor_set_layout: vk::DescriptorSetLayout::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
            shader_module: vk::ShaderModule::null(),
            command_buffer: vk::CommandBuffer::null(),
            device_info,
            in_flight: AtomicBool::new(false),
        };
        processor.create_pipeline_objects(options)?;

        log::info!(
            "GPU initialized: {} ({})",
            processor.device_info.name,
            processor.device_info.device_type
        );
        Ok(processor)
    }

    /// Best-effort capability probe: attempts to create a throwaway instance
    /// and immediately destroys it. Touches no persistent state.
    pub fn is_available() -> bool {
        let Ok(entry) = (unsafe { ash::Entry::load() }) else {
            return false;
        };
        let app_info = vk::ApplicationInfo::default().api_version(vk::API_VERSION_1_0);
        let create_info = vk::InstanceCreateInfo::default().application_info(&app_info);
        match unsafe { entry.create_instance(&create_info, None) } {
            Ok(instance) => {
                unsafe { instance.destroy_instance(None) };
                true
            }
            Err(_) => false,
        }
    }

    fn create_pipeline_objects(&mut self, options: &GpuOptions) -> Result<()> {
        let device = &self.device;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(self.queue_family_index);
        self.command_pool =
            unsafe { device.create_command_pool(&pool_info, None) }.vk_op("create_command_pool")?;

        // Binding 0: input image, 1: output image, 2: adjustment parameters,
        // 3-6: tone curve LUTs (rgb, red, green, blue).
        let bindings = [
            storage_binding(0),
            storage_binding(1),
            vk::DescriptorSetLayoutBinding::default()
                .binding(2)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::COMPUTE),
            storage_binding(3),
            storage_binding(4),
            storage_binding(5),
            storage_binding(6),
        ];
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        self.descriptor_set_layout =
            unsafe { device.create_descriptor_set_layout(&layout_info, None) }
                .vk_op("create_descriptor_set_layout")?;

        let pipeline_layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(std::slice::from_ref(&self.descriptor_set_layout));
        self.pipeline_layout = unsafe { device.create_pipeline_layout(&pipeline_layout_info, None) }
            .vk_op("create_pipeline_layout")?;

        let words = load_shader_words(options)?;
        let shader_info = vk::ShaderModuleCreateInfo::default().code(&words);
        self.shader_module = unsafe { device.create_shader_module(&shader_info, None) }
            .vk_op("create_shader_module")?;

        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(self.shader_module)
            .name(c"main");
        let pipeline_info = vk::ComputePipelineCreateInfo::default()
            .stage(stage)
            .layout(self.pipeline_layout);
        self.pipeline = unsafe {
            device.create_compute_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&pipeline_info),
                None,
            )
        }
        .map_err(|(_, result)| {
            log::error!("Vulkan error in create_compute_pipelines: {}", result);
            GpuError::Vulkan {
                operation: "create_compute_pipelines",
                result,
            }
        })?[0];

        // Sized for repeated per-call descriptor set churn.
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_BUFFER,
                descriptor_count: 30,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 10,
            },
        ];
        let descriptor_pool_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(10)
            .pool_sizes(&pool_sizes);
        self.descriptor_pool = unsafe { device.create_descriptor_pool(&descriptor_pool_info, None) }
            .vk_op("create_descriptor_pool")?;

        let cmd_alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        self.command_buffer = unsafe { device.allocate_command_buffers(&cmd_alloc_info) }
            .vk_op("allocate_command_buffers")?[0];

        Ok(())
    }
}

impl Drop for GpuProcessor {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            if self.command_pool != vk::CommandPool::null() {
                self.device.destroy_command_pool(self.command_pool, None);
            }
            if self.descriptor_pool != vk::DescriptorPool::null() {
                self.device.destroy_descriptor_pool(self.descriptor_pool, None);
            }
            if self.shader_module != vk::ShaderModule::null() {
                self.device.destroy_shader_module(self.shader_module, None);
            }
            if self.pipeline != vk::Pipeline::null() {
                self.device.destroy_pipeline(self.pipeline, None);
            }
            if self.pipeline_layout != vk::PipelineLayout::null() {
                self.device.destroy_pipeline_layout(self.pipeline_layout, None);
            }
            if self.descriptor_set_layout != vk::DescriptorSetLayout::null() {
                self.device
                    .destroy_descriptor_set_layout(self.descriptor_set_layout, None);
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

fn storage_binding(binding: u32) -> vk::DescriptorSetLayoutBinding<'static> {
    vk::DescriptorSetLayoutBinding::default()
        .binding(binding)
        .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
        .descriptor_count(1)
        .stage_flags(vk::ShaderStageFlags::COMPUTE)
}

fn select_physical_device(
    instance: &ash::Instance,
    options: &GpuOptions,
) -> Result<(vk::PhysicalDevice, u32)> {
    let devices = unsafe { instance.enumerate_physical_devices() }
        .vk_op("enumerate_physical_devices")?;
    if devices.is_empty() {
        log::error!("No Vulkan devices found");
        return Err(GpuError::NoSuitableDevice);
    }

    if let Some(index) = options.device_index {
        let device = *devices.get(index).ok_or(GpuError::NoSuitableDevice)?;
        let family = compute_queue_family(instance, device).ok_or(GpuError::NoComputeQueueFamily)?;
        return Ok((device, family));
    }

    // First device exposing a compute-capable queue family wins.
    for device in devices {
        if let Some(family) = compute_queue_family(instance, device) {
            return Ok((device, family));
        }
    }
    log::error!("No Vulkan device exposes a compute queue family");
    Err(GpuError::NoComputeQueueFamily)
}

fn compute_queue_family(instance: &ash::Instance, device: vk::PhysicalDevice) -> Option<u32> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    families
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::COMPUTE))
        .map(|index| index as u32)
}

fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
) -> Result<ash::Device> {
    let priorities = [1.0f32];
    let queue_info = vk::DeviceQueueCreateInfo::default()
        .queue_family_index(queue_family_index)
        .queue_priorities(&priorities);
    let features = vk::PhysicalDeviceFeatures::default();
    let device_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(std::slice::from_ref(&queue_info))
        .enabled_features(&features);
    unsafe { instance.create_device(physical_device, &device_info, None) }.vk_op("create_device")
}

/// Ordered list of locations probed for the compiled kernel. An explicit
/// option override is checked first, then fixed install-relative paths,
/// then the source tree (development builds and tests).
pub(crate) fn shader_candidates(options: &GpuOptions) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = &options.shader_path {
        candidates.push(path.clone());
    }
    for relative in [
        "shaders/develop.spv",
        "build/shaders/develop.spv",
        "../shaders/develop.spv",
        "bundle/data/shaders/develop.spv",
    ] {
        candidates.push(PathBuf::from(relative));
    }
    candidates.push(
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("shaders")
            .join(SHADER_FILE_NAME),
    );
    candidates
}

pub(crate) fn load_shader_words(options: &GpuOptions) -> Result<Vec<u32>> {
    let candidates = shader_candidates(options);
    for path in &candidates {
        let Ok(bytes) = fs::read(path) else { continue };
        if logging::verbose() {
            log::debug!("Found compute kernel at {}", path.display());
        }
        return spirv_words(&bytes);
    }
    log::error!(
        "Compute kernel {} not found in any search location",
        SHADER_FILE_NAME
    );
    Err(GpuError::ShaderNotFound {
        searched: candidates.len(),
    })
}

/// Reinterprets the kernel file as little-endian SPIR-V words, rejecting
/// files that cannot be a module before they reach the driver.
pub(crate) fn spirv_words(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.len() < 4 || bytes.len() % 4 != 0 {
        return Err(GpuError::InvalidShader {
            message: format!("{} bytes is not a whole number of words", bytes.len()),
        });
    }
    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    if words[0] != SPIRV_MAGIC {
        return Err(GpuError::InvalidShader {
            message: format!("bad magic {:#010x}", words[0]),
        });
    }
    Ok(words)
}
