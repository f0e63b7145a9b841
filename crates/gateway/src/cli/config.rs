//! `config validate` / `config show` subcommands.

use ir_domain::config::{Config, ConfigSeverity};

/// Print every validation issue; returns `false` when any is fatal.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("{config_path}: OK");
        return true;
    }

    for issue in &issues {
        println!("{issue}");
    }

    let fatal = issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error);
    if fatal {
        println!("{config_path}: FAILED");
    } else {
        println!("{config_path}: OK (warnings only)");
    }
    !fatal
}

/// Dump the resolved configuration (defaults applied) as TOML.
pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(raw) => println!("{raw}"),
        Err(e) => eprintln!("failed to serialize config: {e}"),
    }
}
