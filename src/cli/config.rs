//! Config command
//!
//! Prints the effective configuration or writes a default one.

use colored::Colorize;
use vpnshell_core::config::toml_config::{config_exists, get_config_dir, get_config_path, load_config, save_config};
use vpnshell_core::config::VpnConfig;
use vpnshell_core::error::VpnShellError;

/// Run the config command
pub fn run_config(init: bool) -> Result<(), VpnShellError> {
    if init {
        return init_config();
    }

    let config = load_config()?;
    let config_path = get_config_path()?;

    println!("Configuration");
    println!("=============");
    if config_path.exists() {
        println!("File:            {}", config_path.display());
    } else {
        println!("File:            {} {}", config_path.display(), "(not created, using defaults)".yellow());
    }

    match which::which(&config.openvpn_binary) {
        Ok(resolved) => println!("OpenVPN binary:  {}", resolved.display()),
        Err(_) => println!(
            "OpenVPN binary:  {} {}",
            config.openvpn_binary.display(),
            "(not found)".red()
        ),
    }

    let profile_state = if config.profile.exists() {
        "".normal()
    } else {
        "(missing, import a profile first)".red()
    };
    println!("Profile:         {} {}", config.profile.display(), profile_state);
    println!("Credentials:     {}", config.credentials_file.display());
    println!("Status file:     {}", config.status_file.display());
    println!("Verbosity:       {}", config.verbosity);
    println!("Status interval: {}s", config.status_interval_secs);
    println!("Poll interval:   {}ms", config.poll_interval_ms);
    println!(
        "Credentials are {} after disconnect",
        if config.retain_credentials { "kept" } else { "removed" }
    );
    if !config.extra_args.is_empty() {
        println!("Extra arguments: {}", config.extra_args.join(" "));
    }

    Ok(())
}

fn init_config() -> Result<(), VpnShellError> {
    if config_exists()? {
        println!("⚠️  Configuration already exists at {}", get_config_path()?.display());
        return Ok(());
    }

    let config = VpnConfig::with_base_dir(&get_config_dir()?);
    let path = save_config(&config)?;

    println!("✅ Wrote default configuration to {}", path.display());
    println!("Place your OpenVPN profile at {}", config.profile.display());
    Ok(())
}
