use anyhow::Result;

pub mod config;
pub mod run;

pub fn show_how_to_get_started() -> Result<()> {
    println!("🔁 device-restarter - apply a device configuration change with retry");
    println!();
    println!("To get started:");
    println!("  ⚙️  device-restarter config init   # Write device-restarter.toml");
    println!("  👁️  device-restarter config show   # Print the effective configuration");
    println!("  🚀 device-restarter run           # Drive the workflow until stopped");
    println!();
    println!("Set the device password with DEVICE_RESTARTER__DEVICE__PASSWORD.");
    println!("💡 Use 'device-restarter run --exit-on-success' for a one-shot restart.");
    Ok(())
}
