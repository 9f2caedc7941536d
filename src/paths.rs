// paths.rs — where the kernel library lives on disk.
//
// The shared-resource directory belongs to the surrounding application; we
// only consume it through `PathResolver`. The library path is always
//
//   <shared resource dir>/<relative dir>/<file name>
//
// e.g. /usr/share/gpu-registry/kernels/image_ops.wgsl

use std::env;
use std::path::{Path, PathBuf};

/// Environment variable read by [`EnvResolver::default`].
pub const SHARE_DIR_VAR: &str = "GPU_REGISTRY_SHARE_DIR";

/// Yields the installation's shared-resource directory.
pub trait PathResolver {
    fn shared_resource_dir(&self) -> PathBuf;
}

/// A directory known up front.
#[derive(Debug, Clone)]
pub struct FixedDir(pub PathBuf);

impl PathResolver for FixedDir {
    fn shared_resource_dir(&self) -> PathBuf {
        self.0.clone()
    }
}

/// Reads the directory from an environment variable, falling back to the
/// conventional `<exe dir>/../share/gpu-registry` install layout.
#[derive(Debug, Clone)]
pub struct EnvResolver {
    pub var: String,
}

impl Default for EnvResolver {
    fn default() -> Self {
        EnvResolver { var: SHARE_DIR_VAR.to_string() }
    }
}

impl PathResolver for EnvResolver {
    fn shared_resource_dir(&self) -> PathBuf {
        match env::var_os(&self.var) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => install_share_dir(),
        }
    }
}

fn install_share_dir() -> PathBuf {
    // current_exe can fail on exotic platforms; the relative path then
    // resolves against the working directory, which is good enough for a
    // development checkout.
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    exe_dir.join("..").join("share").join("gpu-registry")
}

/// Location of the kernel library relative to the shared-resource dir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryLocation {
    pub relative_dir: PathBuf,
    pub file_name: String,
}

impl Default for LibraryLocation {
    fn default() -> Self {
        LibraryLocation {
            relative_dir: PathBuf::from("kernels"),
            file_name: "image_ops.wgsl".to_string(),
        }
    }
}

impl LibraryLocation {
    pub fn resolve(&self, resolver: &impl PathResolver) -> PathBuf {
        resolver
            .shared_resource_dir()
            .join(&self.relative_dir)
            .join(&self.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_path_composition() {
        let loc = LibraryLocation::default();
        let path = loc.resolve(&FixedDir(PathBuf::from("/opt/app/share")));
        assert_eq!(path, PathBuf::from("/opt/app/share/kernels/image_ops.wgsl"));
    }

    #[test]
    fn env_resolver_prefers_variable() {
        // Unique name so parallel tests never race on it.
        let var = "GPU_REGISTRY_TEST_SHARE_DIR_PREFERS";
        env::set_var(var, "/tmp/share-test");
        let r = EnvResolver { var: var.to_string() };
        assert_eq!(r.shared_resource_dir(), PathBuf::from("/tmp/share-test"));
        env::remove_var(var);
    }

    #[test]
    fn env_resolver_falls_back_to_install_layout() {
        let r = EnvResolver { var: "GPU_REGISTRY_TEST_SHARE_DIR_UNSET".to_string() };
        let dir = r.shared_resource_dir();
        assert!(dir.ends_with("share/gpu-registry"), "{}", dir.display());
    }
}
