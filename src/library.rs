// library.rs — reading and checking a compiled kernel library.
//
// A kernel library is one file holding every compute kernel the pipeline
// ships. Two encodings are accepted, chosen by file extension:
//
//   .spv   SPIR-V binary — the precompiled artifact installed with the app
//   .wgsl  WGSL text     — convenient for development trees
//
// Everything in this file is framework-independent: it turns the file into a
// `naga::Module`, checks it against what a particular device can execute and
// lists its entry points. The wgpu backend then hands the same bytes to the
// driver; the mock backend stops here.
//
// CHECK ORDER
// ───────────
//   read   -> NotFound / Io / UnsupportedFormat
//   parse  -> Parse
//   validate against device capabilities -> Invalid
//   workgroup sizes against device limits -> WorkgroupTooLarge /
//                                            WorkgroupDimTooLarge
//
// The first failing step decides the `LoadFailure` reported for the device.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::backend::{KernelEntry, KernelStage};
use crate::error::LoadFailure;

/// On-disk encoding of a kernel library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryFormat {
    SpirV,
    Wgsl,
}

impl LibraryFormat {
    /// Pick the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "spv" => Some(LibraryFormat::SpirV),
            "wgsl" => Some(LibraryFormat::Wgsl),
            _ => None,
        }
    }
}

/// What a device can execute, as far as library checks are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCaps {
    pub capabilities: Capabilities,
    pub max_invocations: u32,
    pub max_workgroup_size: [u32; 3],
}

impl Default for DeviceCaps {
    /// WebGPU baseline: no optional capabilities, 256 invocations,
    /// 256×256×64 per dimension.
    fn default() -> Self {
        DeviceCaps {
            capabilities: Capabilities::empty(),
            max_invocations: 256,
            max_workgroup_size: [256, 256, 64],
        }
    }
}

/// The raw bytes of a kernel library plus where they came from.
#[derive(Debug, Clone)]
pub struct LibrarySource {
    path: PathBuf,
    format: LibraryFormat,
    bytes: Vec<u8>,
}

/// A library that passed every check for one device.
#[derive(Debug)]
pub struct CheckedLibrary {
    pub entries: Vec<KernelEntry>,
}

impl LibrarySource {
    pub fn read(path: &Path) -> Result<Self, LoadFailure> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => LoadFailure::NotFound { path: path.to_path_buf() },
            _ => LoadFailure::Io { path: path.to_path_buf(), source: e },
        })?;
        let format = LibraryFormat::from_path(path)
            .ok_or_else(|| LoadFailure::UnsupportedFormat { path: path.to_path_buf() })?;
        Ok(LibrarySource { path: path.to_path_buf(), format, bytes })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> LibraryFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// WGSL source text. Fails for SPIR-V libraries or non-UTF-8 files.
    pub fn wgsl_text(&self) -> Result<&str, LoadFailure> {
        match self.format {
            LibraryFormat::Wgsl => std::str::from_utf8(&self.bytes)
                .map_err(|e| LoadFailure::Parse(format!("{}: not UTF-8: {e}", self.path.display()))),
            LibraryFormat::SpirV => Err(LoadFailure::Parse(format!(
                "{}: SPIR-V library has no WGSL text",
                self.path.display()
            ))),
        }
    }

    pub fn parse(&self) -> Result<naga::Module, LoadFailure> {
        match self.format {
            LibraryFormat::Wgsl => {
                let text = self.wgsl_text()?;
                naga::front::wgsl::parse_str(text)
                    .map_err(|e| LoadFailure::Parse(e.emit_to_string(text)))
            }
            LibraryFormat::SpirV => {
                naga::front::spv::parse_u8_slice(&self.bytes, &naga::front::spv::Options::default())
                    .map_err(|e| LoadFailure::Parse(e.to_string()))
            }
        }
    }

    /// Parse, validate and size-check the library for a device with `caps`.
    pub fn check(&self, caps: &DeviceCaps) -> Result<CheckedLibrary, LoadFailure> {
        let module = self.parse()?;
        validate(&module, caps.capabilities)?;
        check_workgroups(&module, caps)?;
        let entries = entry_points(&module);
        Ok(CheckedLibrary { entries })
    }
}

pub fn validate(module: &naga::Module, capabilities: Capabilities) -> Result<(), LoadFailure> {
    Validator::new(ValidationFlags::all(), capabilities)
        .validate(module)
        .map(|_| ())
        .map_err(|e| LoadFailure::Invalid(e.into_inner().to_string()))
}

/// Reject compute entry points whose workgroup does not fit the device.
pub fn check_workgroups(module: &naga::Module, caps: &DeviceCaps) -> Result<(), LoadFailure> {
    for ep in module.entry_points.iter().filter(|ep| ep.stage == naga::ShaderStage::Compute) {
        let [x, y, z] = ep.workgroup_size;
        let total = x.saturating_mul(y).saturating_mul(z);
        if total > caps.max_invocations {
            return Err(LoadFailure::WorkgroupTooLarge {
                entry: ep.name.clone(),
                total,
                max: caps.max_invocations,
            });
        }
        let per_axis_ok = ep
            .workgroup_size
            .iter()
            .zip(caps.max_workgroup_size.iter())
            .all(|(size, max)| size <= max);
        if !per_axis_ok {
            return Err(LoadFailure::WorkgroupDimTooLarge {
                entry: ep.name.clone(),
                size: ep.workgroup_size,
                max: caps.max_workgroup_size,
            });
        }
    }
    Ok(())
}

/// Entry points in declaration order.
pub fn entry_points(module: &naga::Module) -> Vec<KernelEntry> {
    module
        .entry_points
        .iter()
        .map(|ep| {
            let stage = match ep.stage {
                naga::ShaderStage::Compute => KernelStage::Compute,
                naga::ShaderStage::Vertex => KernelStage::Vertex,
                naga::ShaderStage::Fragment => KernelStage::Fragment,
            };
            let workgroup_size = match stage {
                KernelStage::Compute => ep.workgroup_size,
                _ => [1, 1, 1],
            };
            KernelEntry { name: ep.name.clone(), stage, workgroup_size }
        })
        .collect()
}
