//! Show or persist the effective configuration.

use mediashrink_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig, save: bool) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);

    if save {
        config.save()?;
        println!();
        println!("Saved to {}", config_file_path().display());
    }

    Ok(())
}
