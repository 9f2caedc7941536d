// gpu/mod.rs — wgpu implementation of the compute backend.
//
// `device` enumerates adapters and loads the kernel library onto them;
// `library` is what a registered device record holds afterwards. The
// registry itself is framework-agnostic and lives in the crate root.

pub mod device;
pub mod library;
