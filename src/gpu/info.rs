use std::ffi::CStr;

use ash::vk;

use crate::gpu::types::{DeviceInfo, GpuProcessor};

impl GpuProcessor {
    /// Details of the physical device this processor runs on.
    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }
}

pub(crate) fn query_device_info(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
) -> DeviceInfo {
    let props = unsafe { instance.get_physical_device_properties(physical_device) };

    let name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned();

    let device_type = match props.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
        vk::PhysicalDeviceType::CPU => "CPU",
        _ => "Unknown",
    }
    .to_string();

    let api_version = format!(
        "{}.{}.{}",
        vk::api_version_major(props.api_version),
        vk::api_version_minor(props.api_version),
        vk::api_version_patch(props.api_version)
    );

    DeviceInfo {
        name,
        device_type,
        api_version,
        queue_family_index,
    }
}
