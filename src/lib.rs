// gpu-registry: compute device bootstrap for the image-processing pipeline.
//
// Finds the GPUs this process can see, loads the shipped kernel library onto
// each, and hands back a `Registry` of the devices that accepted it. Devices
// that refuse the library are logged and left out; an empty registry means
// "run on the CPU".
//
//   let config = RegistryConfig::from_env()?;
//   let registry = Registry::from_config(&config, &EnvResolver::default());
//   if registry.is_empty() { /* CPU path */ }
//
// All diagnostics go through the `log` facade on target `LOG_TARGET`:
//   RUST_LOG=gpu_registry::gpu=debug

pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod gpu;
pub mod library;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod paths;
pub mod registry;

/// Log target for everything this crate reports.
pub const LOG_TARGET: &str = "gpu_registry::gpu";

pub use backend::{ComputeBackend, DeviceHandle, KernelEntry, KernelLibrary, KernelStage, StableId};
pub use config::RegistryConfig;
pub use diagnostics::{describe, list_devices, log_devices, DeviceSummary};
pub use error::{ConfigError, LoadError, LoadFailure, PipelineError};
pub use gpu::device::{DeviceProfile, WgpuBackend};
pub use paths::{EnvResolver, FixedDir, LibraryLocation, PathResolver};
pub use registry::{DeviceRecord, Registry, RegistryStatus};
