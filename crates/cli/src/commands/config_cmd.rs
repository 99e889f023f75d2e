//! `strata config`: print configuration.

use strata_config::AppConfig;

pub fn show(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    println!("{toml_str}");
    Ok(())
}

pub fn show_default() {
    println!("{}", AppConfig::default_toml());
}
