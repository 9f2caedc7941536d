// registry.rs — the set of devices the pipeline may dispatch to.
//
// CONSTRUCTION
// ────────────
// `Registry::initialize` runs once, on one thread, at subsystem start-up:
//
//   enumerate ──► for each handle, in order:
//                   load_library ──ok──► push DeviceRecord
//                                └─err─► log, keep in `skipped`, continue
//
// A record exists iff its library loaded. Nothing is added or removed after
// construction, so the record list is read without locking.
//
// An empty registry is a normal outcome (no GPU, or every device refused the
// library). Callers check `is_empty()` and take their CPU path.
//
// LOCKING
// ───────
// Each record carries its own `Mutex` around the loaded library. Work on one
// device is serialized through that lock; two devices never share one.
// Guards release on every exit path, including unwinding. A poisoned lock
// is recovered rather than propagated: a panicking dispatcher cannot leave
// the library half-updated, since all of its state lives on the device.
//
// TEARDOWN
// ────────
// Records drop first (library, queue, logical device), the backend last.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use crate::backend::{ComputeBackend, DeviceHandle, KernelLibrary, StableId};
use crate::config::RegistryConfig;
use crate::error::LoadError;
use crate::gpu::device::WgpuBackend;
use crate::paths::PathResolver;
use crate::LOG_TARGET;

/// One device whose kernel library loaded successfully.
pub struct DeviceRecord<B: ComputeBackend> {
    id: StableId,
    handle: B::Handle,
    library: Mutex<B::Library>,
}

impl<B: ComputeBackend> DeviceRecord<B> {
    pub fn id(&self) -> StableId {
        self.id
    }

    pub fn handle(&self) -> &B::Handle {
        &self.handle
    }

    /// Device name, read from the handle.
    pub fn name(&self) -> String {
        self.handle.name()
    }

    /// Acquire this device's lock. Blocks while another thread holds it.
    pub fn lock(&self) -> MutexGuard<'_, B::Library> {
        self.library.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire this device's lock if it is free.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, B::Library>> {
        match self.library.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Run `f` with the lock held; released when `f` returns or unwinds.
    pub fn with_library<R>(&self, f: impl FnOnce(&mut B::Library) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }
}

impl<B: ComputeBackend> fmt::Debug for DeviceRecord<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRecord")
            .field("id", &self.id)
            .field("name", &self.handle.name())
            .finish_non_exhaustive()
    }
}

/// Outcome of registry construction, for logs and fallback decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryStatus {
    /// This many devices are ready.
    Ready(usize),
    /// Enumeration found no compute devices.
    NoDevices,
    /// Devices were found but every one of them (this many) failed to load.
    AllDevicesFailed(usize),
}

/// Immutable-after-construction set of loaded devices.
pub struct Registry<B: ComputeBackend> {
    devices: Vec<DeviceRecord<B>>,
    skipped: Vec<LoadError>,
    enumerated: usize,
    library_path: PathBuf,
    // Declared last: dropped after every record.
    backend: B,
}

impl<B: ComputeBackend> Registry<B> {
    /// Enumerate `backend`'s devices and load the library at `library_path`
    /// onto each. Never fails; see [`status`](Self::status).
    pub fn initialize(backend: B, library_path: impl Into<PathBuf>) -> Self {
        let library_path = library_path.into();
        log::info!(target: LOG_TARGET, "initializing compute devices");
        log::debug!(target: LOG_TARGET, "kernel library: {}", library_path.display());

        let handles = backend.enumerate();
        log::debug!(target: LOG_TARGET, "{} device(s) enumerated", handles.len());

        let enumerated = handles.len();
        let mut devices = Vec::with_capacity(enumerated);
        let mut skipped = Vec::new();

        for handle in handles {
            let id = handle.stable_id();
            match backend.load_library(&handle, &library_path) {
                Ok(library) => {
                    log::debug!(target: LOG_TARGET, "device {} [{id}]: library loaded", handle.name());
                    for entry in library.entry_points() {
                        log::debug!(target: LOG_TARGET, "  function: {entry}");
                    }
                    devices.push(DeviceRecord { id, handle, library: Mutex::new(library) });
                }
                Err(err) => {
                    log::warn!(target: LOG_TARGET, "device {} [{id}] skipped: {}", err.device, err.reason);
                    skipped.push(err);
                }
            }
        }

        let registry = Registry { devices, skipped, enumerated, library_path, backend };
        match registry.status() {
            RegistryStatus::Ready(n) => {
                log::info!(target: LOG_TARGET, "{n} of {enumerated} compute device(s) ready")
            }
            RegistryStatus::NoDevices => {
                log::info!(target: LOG_TARGET, "no compute devices found, GPU acceleration unavailable")
            }
            RegistryStatus::AllDevicesFailed(n) => log::warn!(
                target: LOG_TARGET,
                "all {n} compute device(s) failed to load the kernel library, GPU acceleration unavailable"
            ),
        }
        registry
    }

    pub fn status(&self) -> RegistryStatus {
        match (self.devices.len(), self.enumerated) {
            (0, 0) => RegistryStatus::NoDevices,
            (0, n) => RegistryStatus::AllDevicesFailed(n),
            (n, _) => RegistryStatus::Ready(n),
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// True when no device is usable and callers must fall back to CPU.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Records in enumeration order.
    pub fn devices(&self) -> &[DeviceRecord<B>] {
        &self.devices
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DeviceRecord<B>> {
        self.devices.iter()
    }

    pub fn get(&self, id: StableId) -> Option<&DeviceRecord<B>> {
        self.devices.iter().find(|r| r.id == id)
    }

    /// Number of devices enumeration reported, loaded or not.
    pub fn enumerated(&self) -> usize {
        self.enumerated
    }

    /// Load failures, one per device that was dropped, in enumeration order.
    pub fn skipped(&self) -> &[LoadError] {
        &self.skipped
    }

    pub fn library_path(&self) -> &Path {
        &self.library_path
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl Registry<WgpuBackend> {
    /// Build the wgpu backend from `config` and load the library found
    /// under `resolver`'s shared-resource directory.
    pub fn from_config(config: &RegistryConfig, resolver: &impl PathResolver) -> Self {
        let path = config.library.resolve(resolver);
        Registry::initialize(WgpuBackend::new(config), path)
    }
}

impl<'a, B: ComputeBackend> IntoIterator for &'a Registry<B> {
    type Item = &'a DeviceRecord<B>;
    type IntoIter = std::slice::Iter<'a, DeviceRecord<B>>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.iter()
    }
}

impl<B: ComputeBackend> fmt::Display for Registry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Registry {{ devices: {}/{}, library: {} }}",
            self.devices.len(),
            self.enumerated,
            self.library_path.display()
        )
    }
}

impl<B: ComputeBackend> Drop for Registry<B> {
    fn drop(&mut self) {
        if !self.devices.is_empty() {
            log::debug!(target: LOG_TARGET, "releasing {} device record(s)", self.devices.len());
        }
        // Explicit, so the order does not depend on field layout.
        self.devices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockDevice};

    fn library(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("k.wgsl");
        std::fs::write(
            &path,
            "@compute @workgroup_size(8, 8) fn noop(@builtin(global_invocation_id) g: vec3<u32>) {}",
        )
        .unwrap();
        path
    }

    #[test]
    fn status_distinguishes_empty_cases() {
        let dir = tempfile::tempdir().unwrap();
        let path = library(&dir);

        let none = Registry::initialize(MockBackend::new(vec![]), &path);
        assert_eq!(none.status(), RegistryStatus::NoDevices);

        let failed = Registry::initialize(
            MockBackend::new(vec![MockDevice::rejecting("D1", "x"), MockDevice::rejecting("D2", "y")]),
            &path,
        );
        assert_eq!(failed.status(), RegistryStatus::AllDevicesFailed(2));
        assert!(failed.is_empty());

        let ready = Registry::initialize(MockBackend::new(vec![MockDevice::new("D1")]), &path);
        assert_eq!(ready.status(), RegistryStatus::Ready(1));
    }

    #[test]
    fn try_lock_reports_busy() {
        let dir = tempfile::tempdir().unwrap();
        let reg = Registry::initialize(MockBackend::new(vec![MockDevice::new("D1")]), library(&dir));
        let rec = &reg.devices()[0];
        let held = rec.lock();
        assert!(rec.try_lock().is_none());
        drop(held);
        assert!(rec.try_lock().is_some());
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let dir = tempfile::tempdir().unwrap();
        let reg = Registry::initialize(MockBackend::new(vec![MockDevice::new("D1")]), library(&dir));
        let rec = &reg.devices()[0];

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            rec.with_library(|lib| {
                lib.dispatch("noop");
                panic!("dispatcher failed");
            })
        }));
        assert!(result.is_err());

        // Lock was released during unwinding and is usable again.
        assert_eq!(rec.with_library(|lib| lib.dispatch("noop")), Some(2));
    }

    #[test]
    fn display_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = library(&dir);
        let reg = Registry::initialize(
            MockBackend::new(vec![MockDevice::new("D1"), MockDevice::rejecting("D2", "no")]),
            &path,
        );
        assert_eq!(reg.to_string(), format!("Registry {{ devices: 1/2, library: {} }}", path.display()));
    }
}
