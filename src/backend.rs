// backend.rs — the capability surface a GPU framework must offer.
//
// The registry and the loader never see a native pointer. Each framework
// backend picks its own handle and library types through the associated
// types below, so `Registry<WgpuBackend>` and `Registry<MockBackend>` run
// exactly the same construction code.
//
//   ComputeBackend
//     ├── enumerate()          -> Vec<Handle>        (Device Enumerator)
//     └── load_library(h, p)   -> Result<Library>    (Library Loader)
//   DeviceHandle::name / stable_id                   (accessors)
//   KernelLibrary::entry_points                      (diagnostics)

use std::fmt;
use std::path::Path;

use crate::error::LoadError;

/// Framework-assigned identity of one physical device, valid for the
/// process lifetime.
///
/// `ordinal` separates identical boards of the same backend: the second
/// card with the same vendor/device pair gets ordinal 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StableId {
    pub backend: &'static str,
    pub vendor: u32,
    pub device: u32,
    pub ordinal: u32,
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:04x}:{:04x}/{}", self.backend, self.vendor, self.device, self.ordinal)
    }
}

/// Assign ordinals to device keys in enumeration order. Keys seen for the
/// first time get 0, repeats count up.
pub fn assign_ordinals<K: PartialEq>(keys: &[K]) -> Vec<u32> {
    let mut seen: Vec<(&K, u32)> = Vec::new();
    keys.iter()
        .map(|key| match seen.iter_mut().find(|(k, _)| *k == key) {
            Some((_, n)) => {
                *n += 1;
                *n
            }
            None => {
                seen.push((key, 0));
                0
            }
        })
        .collect()
}

/// Pipeline stage an entry point was compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelStage {
    Compute,
    Vertex,
    Fragment,
}

impl fmt::Display for KernelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelStage::Compute => write!(f, "compute"),
            KernelStage::Vertex => write!(f, "vertex"),
            KernelStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// One entry point declared by a loaded kernel library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelEntry {
    pub name: String,
    pub stage: KernelStage,
    /// `[1, 1, 1]` for non-compute stages.
    pub workgroup_size: [u32; 3],
}

impl fmt::Display for KernelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            KernelStage::Compute => {
                let [x, y, z] = self.workgroup_size;
                write!(f, "{} ({}, {x}×{y}×{z})", self.name, self.stage)
            }
            _ => write!(f, "{} ({})", self.name, self.stage),
        }
    }
}

/// A device as reported by enumeration.
pub trait DeviceHandle {
    /// Human-readable name as reported by the driver.
    fn name(&self) -> String;
    fn stable_id(&self) -> StableId;
}

/// A kernel library bound to exactly one device.
pub trait KernelLibrary {
    fn entry_points(&self) -> &[KernelEntry];
}

/// A GPU framework the registry can bootstrap.
pub trait ComputeBackend {
    type Handle: DeviceHandle;
    type Library: KernelLibrary;

    /// All compute devices visible right now, in the framework's order.
    /// An empty vector is a valid answer.
    fn enumerate(&self) -> Vec<Self::Handle>;

    /// Load the library at `path` onto `device`.
    fn load_library(&self, device: &Self::Handle, path: &Path) -> Result<Self::Library, LoadError>;
}
