// gpu/device.rs — wgpu compute backend.
//
// Responsibilities:
//   - Enumerate adapters for the configured backend set, log every one, and
//     drop software rasterizers unless explicitly allowed.
//   - Give each adapter a `StableId` built from (backend, vendor, device) plus
//     an ordinal for identical boards.
//   - Load the kernel library onto an adapter: check it against the limits we
//     are about to request, open the logical device, create the shader module
//     inside a validation error scope.
//   - `DeviceProfile` caps the requested limits to simulate a smaller target
//     (Raspberry Pi) on a development machine.
//
// ADAPTER FILTERING:
// llvmpipe/softpipe show up as perfectly valid Vulkan adapters with
// DeviceType::Cpu. Registering them would make "GPU available" true on
// machines that have no GPU, so they are skipped by default. Set
// `allow_software` to keep them (useful in CI containers).
//
// DEVICE LIMITS:
// Under a non-Native profile we request *lower* limits than the hardware
// supports. wgpu validates every dispatch against the requested limits, so a
// kernel that would not fit on the Pi fails on the laptop too. The library
// workgroup check uses the same requested limits.
//
// LOADING ORDER:
// The library is read and checked *before* `request_device`. A missing or
// oversized library then costs one file read per adapter instead of a full
// logical-device bring-up.

use std::borrow::Cow;
use std::fmt;
use std::path::Path;

use crate::backend::{assign_ordinals, ComputeBackend, DeviceHandle, StableId};
use crate::config::RegistryConfig;
use crate::error::{LoadError, LoadFailure};
use crate::gpu::library::WgpuLibrary;
use crate::library::{DeviceCaps, LibraryFormat, LibrarySource};
use crate::LOG_TARGET;

/// Hardware profile controlling requested device limits.
///
/// Use `Native` for best performance on your development machine.
/// Use `RaspberryPi` to simulate RPi 4/5 constraints — wgpu will reject
/// any dispatch that exceeds the RPi's actual Vulkan limits, catching
/// problems before you deploy to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceProfile {
    /// wgpu default limits. No artificial caps.
    #[default]
    Native,
    /// Broadcom VideoCore VI/VII under V3DV: 256 invocations per workgroup.
    RaspberryPi,
}

impl DeviceProfile {
    /// Parse the names accepted in configuration: `native`, `rpi`,
    /// `raspberrypi` (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "native" => Some(DeviceProfile::Native),
            "rpi" | "raspberrypi" | "raspberry-pi" => Some(DeviceProfile::RaspberryPi),
            _ => None,
        }
    }

    /// V3D adapters always get the RaspberryPi profile, so a default
    /// configuration works unchanged on the Pi.
    fn resolve_for(self, adapter_name: &str) -> Self {
        match self {
            DeviceProfile::Native if adapter_name.to_ascii_lowercase().contains("v3d") => {
                log::debug!(target: LOG_TARGET, "V3D adapter detected, using RaspberryPi profile");
                DeviceProfile::RaspberryPi
            }
            other => other,
        }
    }
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceProfile::Native => write!(f, "Native"),
            DeviceProfile::RaspberryPi => write!(f, "RaspberryPi (simulated limits)"),
        }
    }
}

/// Cached adapter information for logging and debugging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor: u32,
    pub device: u32,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
    pub driver: String,
}

impl From<wgpu::AdapterInfo> for AdapterInfo {
    fn from(raw: wgpu::AdapterInfo) -> Self {
        AdapterInfo {
            name: raw.name,
            vendor: raw.vendor,
            device: raw.device,
            device_type: raw.device_type,
            backend: raw.backend,
            driver: raw.driver,
        }
    }
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.backend, self.device_type)?;
        if !self.driver.is_empty() {
            write!(f, " driver {}", self.driver)?;
        }
        Ok(())
    }
}

/// One enumerated wgpu adapter.
pub struct WgpuAdapter {
    adapter: wgpu::Adapter,
    info: AdapterInfo,
    id: StableId,
}

impl WgpuAdapter {
    pub fn info(&self) -> &AdapterInfo {
        &self.info
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }
}

impl DeviceHandle for WgpuAdapter {
    fn name(&self) -> String {
        self.info.name.clone()
    }

    fn stable_id(&self) -> StableId {
        self.id
    }
}

impl fmt::Debug for WgpuAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuAdapter").field("info", &self.info).field("id", &self.id).finish()
    }
}

/// The wgpu backend: one `wgpu::Instance` plus enumeration policy.
///
/// # Field drop order
/// Rust drops struct fields in declaration order (top → bottom).
/// `instance` is declared last, and the registry declares its backend after
/// its device records, so the Vulkan instance outlives every device and
/// queue. dzn (the D3D12-to-Vulkan layer on WSL2) crashes when the instance
/// goes first.
pub struct WgpuBackend {
    backends: wgpu::Backends,
    profile: DeviceProfile,
    allow_software: bool,
    instance: wgpu::Instance,
}

impl WgpuBackend {
    pub fn new(config: &RegistryConfig) -> Self {
        // Debug builds get the validation layer for shader error feedback.
        // ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER lets dzn through on WSL2,
        // which declares itself non-conformant but runs compute fine.
        let flags = if cfg!(debug_assertions) {
            wgpu::InstanceFlags::VALIDATION
                | wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        } else {
            wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        };

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: config.backends,
            flags,
            ..Default::default()
        });

        WgpuBackend {
            backends: config.backends,
            profile: config.profile,
            allow_software: config.allow_software,
            instance,
        }
    }

    pub fn profile(&self) -> DeviceProfile {
        self.profile
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    async fn load_async(
        &self,
        handle: &WgpuAdapter,
        path: &Path,
    ) -> Result<WgpuLibrary, LoadFailure> {
        let profile = self.profile.resolve_for(&handle.info.name);
        let limits = limits_for_profile(profile);

        // Only optional feature the kernels may use; requested when present.
        let required_features = handle.adapter.features() & wgpu::Features::SHADER_F64;

        let source = LibrarySource::read(path)?;
        let checked = source.check(&device_caps(&limits, required_features))?;

        let (device, queue): (wgpu::Device, wgpu::Queue) = handle
            .adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some(handle.info.name.as_str()),
                    required_features,
                    required_limits: limits,
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let shader_source = match source.format() {
            LibraryFormat::Wgsl => wgpu::ShaderSource::Wgsl(Cow::Borrowed(source.wgsl_text()?)),
            // Already parsed by naga above, so length and magic are sane.
            LibraryFormat::SpirV => wgpu::util::make_spirv(source.bytes()),
        };

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: source.path().file_name().and_then(|n| n.to_str()),
            source: shader_source,
        });
        if let Some(err) = device.pop_error_scope().await {
            return Err(LoadFailure::Rejected(err.to_string()));
        }

        Ok(WgpuLibrary::new(
            module,
            checked.entries,
            device,
            queue,
            profile,
            handle.info.clone(),
        ))
    }
}

impl ComputeBackend for WgpuBackend {
    type Handle = WgpuAdapter;
    type Library = WgpuLibrary;

    fn enumerate(&self) -> Vec<WgpuAdapter> {
        let mut visible = Vec::new();
        for adapter in self.instance.enumerate_adapters(self.backends) {
            let info = AdapterInfo::from(adapter.get_info());
            log::debug!(target: LOG_TARGET, "adapter: {info}");
            if info.device_type == wgpu::DeviceType::Cpu && !self.allow_software {
                log::debug!(target: LOG_TARGET, "skipping software adapter {}", info.name);
                continue;
            }
            visible.push((adapter, info));
        }

        let keys: Vec<_> = visible
            .iter()
            .map(|(_, info)| (info.backend, info.vendor, info.device))
            .collect();
        visible
            .into_iter()
            .zip(assign_ordinals(&keys))
            .map(|((adapter, info), ordinal)| {
                let id = StableId {
                    backend: info.backend.to_str(),
                    vendor: info.vendor,
                    device: info.device,
                    ordinal,
                };
                WgpuAdapter { adapter, info, id }
            })
            .collect()
    }

    fn load_library(&self, device: &WgpuAdapter, path: &Path) -> Result<WgpuLibrary, LoadError> {
        log::debug!(target: LOG_TARGET, "creating library for device: {}", device.info.name);
        pollster::block_on(self.load_async(device, path))
            .map_err(|reason| LoadError::new(device.name(), reason))
    }
}

// ============================================================
// Limits helpers
// ============================================================

/// Build wgpu limits for the given profile.
fn limits_for_profile(profile: DeviceProfile) -> wgpu::Limits {
    match profile {
        DeviceProfile::Native => wgpu::Limits::default(),

        DeviceProfile::RaspberryPi => wgpu::Limits {
            // VideoCore VI/VII: vulkaninfo reports 256 max invocations.
            max_compute_invocations_per_workgroup: 256,
            // V3DV also caps individual workgroup dimensions at 256.
            max_compute_workgroup_size_x: 256,
            max_compute_workgroup_size_y: 256,
            max_compute_workgroup_size_z: 64,
            // VideoCore VI caps textures at 4096×4096 (vs wgpu default 8192).
            max_texture_dimension_2d: 4096,
            // 128 MiB out of the 4 GiB shared with the CPU.
            max_storage_buffer_binding_size: 128 << 20,
            ..wgpu::Limits::default()
        },
    }
}

/// What the library checks need to know about a device opened with
/// `limits` and `features`.
fn device_caps(limits: &wgpu::Limits, features: wgpu::Features) -> DeviceCaps {
    let mut capabilities = naga::valid::Capabilities::empty();
    if features.contains(wgpu::Features::SHADER_F64) {
        capabilities |= naga::valid::Capabilities::FLOAT64;
    }
    DeviceCaps {
        capabilities,
        max_invocations: limits.max_compute_invocations_per_workgroup,
        max_workgroup_size: [
            limits.max_compute_workgroup_size_x,
            limits.max_compute_workgroup_size_y,
            limits.max_compute_workgroup_size_z,
        ],
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    // Tests that need an actual adapter are `#[ignore]`d so `cargo test`
    // passes in CI without Vulkan. Run with:
    //   cargo test -- --include-ignored

    #[test]
    fn rpi_limits_cap_invocations() {
        let limits = limits_for_profile(DeviceProfile::RaspberryPi);
        assert_eq!(limits.max_compute_invocations_per_workgroup, 256);
        assert_eq!(limits.max_compute_workgroup_size_x, 256);
        assert_eq!(limits.max_compute_workgroup_size_y, 256);
    }

    #[test]
    fn native_limits_are_default() {
        let limits = limits_for_profile(DeviceProfile::Native);
        assert_eq!(limits, wgpu::Limits::default());
    }

    #[test]
    fn caps_follow_requested_limits() {
        let caps = device_caps(&limits_for_profile(DeviceProfile::RaspberryPi), wgpu::Features::empty());
        assert_eq!(caps.max_invocations, 256);
        assert_eq!(caps.max_workgroup_size, [256, 256, 64]);
        assert!(caps.capabilities.is_empty());

        let caps = device_caps(&wgpu::Limits::default(), wgpu::Features::SHADER_F64);
        assert!(caps.capabilities.contains(naga::valid::Capabilities::FLOAT64));
    }

    #[test]
    fn profile_names() {
        assert_eq!(DeviceProfile::from_name("native"), Some(DeviceProfile::Native));
        assert_eq!(DeviceProfile::from_name(" RPi "), Some(DeviceProfile::RaspberryPi));
        assert_eq!(DeviceProfile::from_name("raspberrypi"), Some(DeviceProfile::RaspberryPi));
        assert_eq!(DeviceProfile::from_name("jetson"), None);
    }

    #[test]
    fn v3d_adapter_switches_profile() {
        assert_eq!(
            DeviceProfile::Native.resolve_for("V3D 7.1.7"),
            DeviceProfile::RaspberryPi
        );
        assert_eq!(
            DeviceProfile::Native.resolve_for("NVIDIA GeForce RTX 4090"),
            DeviceProfile::Native
        );
    }

    #[test]
    #[ignore = "requires a real GPU adapter"]
    fn enumerate_real_adapters() {
        let backend = WgpuBackend::new(&RegistryConfig::default());
        for handle in backend.enumerate() {
            println!("{} -> {}", handle.stable_id(), handle.info());
            assert_ne!(handle.info().device_type, wgpu::DeviceType::Cpu);
        }
    }
}
