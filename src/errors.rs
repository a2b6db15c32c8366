use ash::vk;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GpuError {
    #[error("Failed to load the Vulkan library: {message}")]
    LibraryLoad { message: String },

    #[error("No Vulkan physical device available")]
    NoSuitableDevice,

    #[error("No compute-capable queue family on the selected device")]
    NoComputeQueueFamily,

    #[error("Compute shader binary not found ({searched} locations probed)")]
    ShaderNotFound { searched: usize },

    #[error("Compute shader binary is not valid SPIR-V: {message}")]
    InvalidShader { message: String },

    #[error("No memory type satisfies the requested property flags")]
    NoCompatibleMemoryType,

    #[error("A processing call is already in flight")]
    Busy,

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Vulkan error in {operation}: {result}")]
    Vulkan {
        operation: &'static str,
        result: vk::Result,
    },
}

pub type Result<T> = std::result::Result<T, GpuError>;

impl GpuError {
    /// Returns true if retrying the same call later can reasonably succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GpuError::Busy
                | GpuError::Vulkan {
                    result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
                        | vk::Result::ERROR_OUT_OF_HOST_MEMORY,
                    ..
                }
        )
    }
}

/// Attaches the failing operation name to a raw `vk::Result`.
pub(crate) trait VulkanOp<T> {
    fn vk_op(self, operation: &'static str) -> Result<T>;
}

impl<T> VulkanOp<T> for std::result::Result<T, vk::Result> {
    fn vk_op(self, operation: &'static str) -> Result<T> {
        self.map_err(|result| {
            log::error!("Vulkan error in {}: {}", operation, result);
            GpuError::Vulkan { operation, result }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let error = GpuError::ShaderNotFound { searched: 5 };
        assert!(error.to_string().contains("5 locations"));
        assert!(!error.is_recoverable());

        let busy = GpuError::Busy;
        assert!(busy.is_recoverable());
        assert!(busy.to_string().contains("already in flight"));
    }

    #[test]
    fn test_vk_op_context() {
        let failed: std::result::Result<(), vk::Result> =
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        let err = failed.vk_op("allocate_memory").unwrap_err();
        match err {
            GpuError::Vulkan { operation, result } => {
                assert_eq!(operation, "allocate_memory");
                assert_eq!(result, vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_recoverable());
    }
}
