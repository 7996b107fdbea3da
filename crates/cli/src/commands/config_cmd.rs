//! `stepwise config` — print the effective configuration.

use stepwise_config::AppConfig;

use super::{CliResult, load_config};

pub fn run() -> CliResult {
    let config = load_config()?;
    println!(
        "# {}",
        AppConfig::config_dir().join("config.toml").display()
    );
    println!("{}", config.to_redacted_toml());
    Ok(())
}
