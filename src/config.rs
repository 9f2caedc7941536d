// config.rs — registry configuration.
//
// Defaults suit a desktop with a real GPU. Environment variables override
// individual fields so the same binary can be pointed at a software
// adapter in CI or at Pi limits on a laptop without recompiling:
//
//   WGPU_BACKEND                 vulkan,metal,dx12,gl (comma list)
//   GPU_REGISTRY_PROFILE         native | rpi
//   GPU_REGISTRY_ALLOW_SOFTWARE  1/true/yes | 0/false/no
//   GPU_REGISTRY_LIBRARY         kernel library file name

use std::env;

use crate::error::ConfigError;
use crate::gpu::device::DeviceProfile;
use crate::paths::LibraryLocation;

pub const BACKEND_VAR: &str = "WGPU_BACKEND";
pub const PROFILE_VAR: &str = "GPU_REGISTRY_PROFILE";
pub const ALLOW_SOFTWARE_VAR: &str = "GPU_REGISTRY_ALLOW_SOFTWARE";
pub const LIBRARY_VAR: &str = "GPU_REGISTRY_LIBRARY";

/// Configuration for [`Registry::from_config`](crate::registry::Registry::from_config).
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Which native APIs to enumerate adapters on.
    pub backends: wgpu::Backends,
    /// Limit profile requested from every device.
    pub profile: DeviceProfile,
    /// Register software rasterizers (llvmpipe, WARP) as compute devices.
    pub allow_software: bool,
    /// Where the kernel library sits under the shared-resource dir.
    pub library: LibraryLocation,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            backends: wgpu::Backends::PRIMARY,
            profile: DeviceProfile::Native,
            allow_software: false,
            library: LibraryLocation::default(),
        }
    }
}

impl RegistryConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = RegistryConfig::default();
        config.apply_overrides(|var| env::var(var).ok())?;
        Ok(config)
    }

    /// Overlay values returned by `lookup` (variable name → value).
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(list) = get(BACKEND_VAR) {
            self.backends = wgpu::util::parse_backends_from_comma_list(&list);
        }
        if let Some(value) = get(PROFILE_VAR) {
            self.profile = DeviceProfile::from_name(&value)
                .ok_or(ConfigError::UnknownProfile { var: PROFILE_VAR, value })?;
        }
        if let Some(value) = get(ALLOW_SOFTWARE_VAR) {
            self.allow_software = parse_bool(&value)
                .ok_or(ConfigError::NotABool { var: ALLOW_SOFTWARE_VAR, value })?;
        }
        if let Some(name) = get(LIBRARY_VAR) {
            self.library.file_name = name;
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
