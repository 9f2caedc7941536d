// demos/list_devices.rs — print every compute device and kernel function.
//
// Run:
//   RUST_LOG=gpu_registry::gpu=debug cargo run --example list_devices
//
// The library is looked up under $GPU_REGISTRY_SHARE_DIR (default
// <exe>/../share/gpu-registry). From a checkout:
//   GPU_REGISTRY_SHARE_DIR=share/gpu-registry cargo run --example list_devices

use gpu_registry::{describe, log_devices, EnvResolver, Registry, RegistryConfig, RegistryStatus};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = RegistryConfig::from_env()?;
    let registry = Registry::from_config(&config, &EnvResolver::default());
    log_devices(&registry);

    println!("{registry}");
    for summary in describe(&registry) {
        println!("{summary}");
        for entry in &summary.entry_points {
            println!("    {entry}");
        }
    }
    for err in registry.skipped() {
        println!("skipped: {err}");
    }

    match registry.status() {
        RegistryStatus::Ready(_) => {}
        RegistryStatus::NoDevices => println!("no GPU found, pipeline would run on the CPU"),
        RegistryStatus::AllDevicesFailed(n) => {
            println!("{n} GPU(s) found but none accepted the kernel library, pipeline would run on the CPU")
        }
    }
    Ok(())
}
