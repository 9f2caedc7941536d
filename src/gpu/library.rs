// gpu/library.rs — a kernel library resident on one wgpu device.
//
// `WgpuLibrary` owns the logical device it was loaded onto. There is exactly
// one library per registered device, so the library *is* the per-device
// state the registry lock protects: queue submissions, pipeline creation
// and error scopes all go through it.
//
// Field order matters for the same reason as in `WgpuBackend`: the shader
// module goes before the queue, the queue before the device.

use crate::backend::{KernelEntry, KernelLibrary, KernelStage};
use crate::error::PipelineError;
use crate::gpu::device::{AdapterInfo, DeviceProfile};

pub struct WgpuLibrary {
    module: wgpu::ShaderModule,
    entries: Vec<KernelEntry>,
    pub queue: wgpu::Queue,
    pub device: wgpu::Device,
    pub profile: DeviceProfile,
    pub adapter_info: AdapterInfo,
}

impl WgpuLibrary {
    pub(crate) fn new(
        module: wgpu::ShaderModule,
        entries: Vec<KernelEntry>,
        device: wgpu::Device,
        queue: wgpu::Queue,
        profile: DeviceProfile,
        adapter_info: AdapterInfo,
    ) -> Self {
        WgpuLibrary { module, entries, queue, device, profile, adapter_info }
    }

    pub fn module(&self) -> &wgpu::ShaderModule {
        &self.module
    }

    fn compute_entry(&self, name: &str) -> Result<&KernelEntry, PipelineError> {
        self.entries
            .iter()
            .find(|e| e.name == name && e.stage == KernelStage::Compute)
            .ok_or_else(|| PipelineError::UnknownEntryPoint(name.to_string()))
    }

    /// Build a compute pipeline for `entry` with an automatic layout.
    ///
    /// Call with the device record's lock held; the error scope pushed here
    /// is per-device state.
    pub fn create_pipeline(&self, entry: &str) -> Result<wgpu::ComputePipeline, PipelineError> {
        let entry = self.compute_entry(entry)?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label:               Some(entry.name.as_str()),
            layout:              None,
            module:              &self.module,
            entry_point:         &entry.name,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache:               None,
        });
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(PipelineError::Rejected(err.to_string())),
            None => Ok(pipeline),
        }
    }

    /// Number of workgroups needed to cover a `img_w`×`img_h` image with
    /// `entry`'s declared workgroup size.
    ///
    /// Ceiling division: the shader must guard against out-of-bounds IDs:
    /// ```wgsl
    /// if gid.x >= width || gid.y >= height { return; }
    /// ```
    pub fn dispatch_size(&self, entry: &str, img_w: u32, img_h: u32) -> Result<(u32, u32), PipelineError> {
        let [wx, wy, _] = self.compute_entry(entry)?.workgroup_size;
        Ok(dispatch_grid([wx, wy], img_w, img_h))
    }
}

fn dispatch_grid([wx, wy]: [u32; 2], img_w: u32, img_h: u32) -> (u32, u32) {
    (img_w.div_ceil(wx), img_h.div_ceil(wy))
}

impl KernelLibrary for WgpuLibrary {
    fn entry_points(&self) -> &[KernelEntry] {
        &self.entries
    }
}
