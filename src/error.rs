// error.rs — error types for library loading and configuration.
//
// Nothing here is fatal to registry construction. A `LoadError` describes
// why one (device, library) pair did not make it into the registry; the
// registry logs it, keeps a copy for diagnostics and moves on.

use std::path::PathBuf;

use thiserror::Error;

/// A kernel library could not be loaded onto one device.
#[derive(Debug, Error)]
#[error("cannot load kernel library on {device}: {reason}")]
pub struct LoadError {
    /// Display name of the device the load was attempted on.
    pub device: String,
    pub reason: LoadFailure,
}

impl LoadError {
    pub fn new(device: impl Into<String>, reason: LoadFailure) -> Self {
        LoadError { device: device.into(), reason }
    }
}

/// Why a kernel library was refused.
///
/// Treated as a permanent property of the (device, library) pair: the
/// registry never retries.
#[derive(Debug, Error)]
pub enum LoadFailure {
    #[error("library not found at {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Neither `.spv` nor `.wgsl`.
    #[error("unsupported library format: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("malformed library: {0}")]
    Parse(String),

    /// The module needs capabilities the device does not offer.
    #[error("library incompatible with device: {0}")]
    Invalid(String),

    #[error("entry point `{entry}` needs {total} invocations per workgroup, device allows {max}")]
    WorkgroupTooLarge { entry: String, total: u32, max: u32 },

    #[error(
        "entry point `{entry}` workgroup {}×{}×{} exceeds per-axis limit {}×{}×{}",
        .size[0], .size[1], .size[2], .max[0], .max[1], .max[2]
    )]
    WorkgroupDimTooLarge { entry: String, size: [u32; 3], max: [u32; 3] },

    #[error("device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// The native framework refused the module after it passed our checks.
    #[error("rejected by driver: {0}")]
    Rejected(String),
}

/// Invalid value in an environment override.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: unknown device profile `{value}` (expected `native` or `rpi`)")]
    UnknownProfile { var: &'static str, value: String },

    #[error("{var}: expected a boolean, got `{value}`")]
    NotABool { var: &'static str, value: String },
}

/// Errors from `WgpuLibrary::create_pipeline`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no compute entry point named `{0}` in library")]
    UnknownEntryPoint(String),

    #[error("pipeline creation rejected by driver: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_message_names_device_and_reason() {
        let err = LoadError::new(
            "Radeon RX 7900",
            LoadFailure::NotFound { path: PathBuf::from("/opt/share/kernels/image_ops.spv") },
        );
        let msg = err.to_string();
        assert!(msg.contains("Radeon RX 7900"), "{msg}");
        assert!(msg.contains("/opt/share/kernels/image_ops.spv"), "{msg}");
    }

    #[test]
    fn workgroup_message_reports_both_limits() {
        let f = LoadFailure::WorkgroupTooLarge { entry: "blur".into(), total: 1024, max: 256 };
        assert_eq!(
            f.to_string(),
            "entry point `blur` needs 1024 invocations per workgroup, device allows 256"
        );
    }
}
