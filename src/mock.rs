// mock.rs — in-memory compute backend.
//
// Stands in for the GPU framework on machines without one (CI, headless
// servers) and in tests. Devices are declared up front; library loading runs
// the real file checks from `library.rs` against each device's `DeviceCaps`,
// then applies the device's scripted outcome.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::backend::{assign_ordinals, ComputeBackend, DeviceHandle, KernelEntry, KernelLibrary, StableId};
use crate::error::{LoadError, LoadFailure};
use crate::library::{DeviceCaps, LibrarySource};

/// A fake device description.
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub name: String,
    pub vendor: u32,
    pub device: u32,
    pub caps: DeviceCaps,
    /// When set, the driver rejects every library with this message.
    pub reject: Option<String>,
}

impl MockDevice {
    pub fn new(name: impl Into<String>) -> Self {
        MockDevice {
            name: name.into(),
            vendor: 0x1af4,
            device: 0x1050,
            caps: DeviceCaps::default(),
            reject: None,
        }
    }

    /// A device whose driver refuses any library.
    pub fn rejecting(name: impl Into<String>, reason: impl Into<String>) -> Self {
        MockDevice { reject: Some(reason.into()), ..MockDevice::new(name) }
    }

    pub fn with_ids(mut self, vendor: u32, device: u32) -> Self {
        self.vendor = vendor;
        self.device = device;
        self
    }

    pub fn with_caps(mut self, caps: DeviceCaps) -> Self {
        self.caps = caps;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MockHandle {
    desc: MockDevice,
    id: StableId,
}

impl DeviceHandle for MockHandle {
    fn name(&self) -> String {
        self.desc.name.clone()
    }

    fn stable_id(&self) -> StableId {
        self.id
    }
}

/// A library "loaded" on a mock device. Counts dispatches so tests can
/// observe what happened under the record's lock, and bumps the backend's
/// release counter when dropped.
#[derive(Debug)]
pub struct MockLibrary {
    entries: Vec<KernelEntry>,
    dispatches: u64,
    released: Arc<AtomicUsize>,
}

impl MockLibrary {
    /// Pretend to run `entry`. Returns the dispatch count after this call.
    pub fn dispatch(&mut self, entry: &str) -> Option<u64> {
        self.entries.iter().find(|e| e.name == entry)?;
        self.dispatches += 1;
        Some(self.dispatches)
    }

    pub fn dispatches(&self) -> u64 {
        self.dispatches
    }
}

impl Drop for MockLibrary {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl KernelLibrary for MockLibrary {
    fn entry_points(&self) -> &[KernelEntry] {
        &self.entries
    }
}

/// Backend over a fixed list of fake devices.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    devices: Vec<MockDevice>,
    released: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        MockBackend { devices, released: Arc::default() }
    }

    /// Shared count of `MockLibrary` values dropped so far. Clones of the
    /// backend share it.
    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.released)
    }
}

impl ComputeBackend for MockBackend {
    type Handle = MockHandle;
    type Library = MockLibrary;

    fn enumerate(&self) -> Vec<MockHandle> {
        let pairs: Vec<_> = self.devices.iter().map(|d| (d.vendor, d.device)).collect();
        self.devices
            .iter()
            .zip(assign_ordinals(&pairs))
            .map(|(d, ordinal)| MockHandle {
                desc: d.clone(),
                id: StableId { backend: "mock", vendor: d.vendor, device: d.device, ordinal },
            })
            .collect()
    }

    fn load_library(&self, device: &MockHandle, path: &Path) -> Result<MockLibrary, LoadError> {
        let fail = |reason| LoadError::new(device.name(), reason);
        let checked = LibrarySource::read(path)
            .and_then(|src| src.check(&device.desc.caps))
            .map_err(fail)?;
        if let Some(msg) = &device.desc.reject {
            return Err(fail(LoadFailure::Rejected(msg.clone())));
        }
        Ok(MockLibrary {
            entries: checked.entries,
            dispatches: 0,
            released: Arc::clone(&self.released),
        })
    }
}
