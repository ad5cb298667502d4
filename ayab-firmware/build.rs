//! Build script for ayab-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Deserializes machine.toml into a `FirmwareConfig` and bakes it in as a constant

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use ayab_core::config::{ConfigError, FirmwareConfig};

fn main() {
    setup_linker();
    let config = load_config();
    generate_config(&config);
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Read, check and convert machine.toml
fn load_config() -> FirmwareConfig {
    println!("cargo:rerun-if-changed=machine.toml");

    let config_path = Path::new("machine.toml");
    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: machine.toml not found!                                  ║\n\
            ║                                                                  ║\n\
            ║  The firmware requires a machine.toml configuration file.        ║\n\
            ║  Please create one in the ayab-firmware directory.               ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read machine.toml                              ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let value: toml::Value = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in machine.toml                      ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&e.to_string())
            );
        }
    };

    let mut errors = Vec::new();
    let config = read_config(&value, &mut errors);
    report("Invalid machine.toml", &errors);

    if let Err(e) = config.validate() {
        report("Inconsistent machine.toml", &[describe(e)]);
    }

    println!("cargo:warning=machine.toml validated successfully");
    config
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.chars().count() > 64 {
                format!("{}...", line.chars().take(61).collect::<String>())
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Panic with a boxed list of errors, if any
fn report(title: &str, errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

fn describe(error: ConfigError) -> String {
    match error {
        ConfigError::ZeroControlPeriod => "[timing] control_period_ms must be at least 1".into(),
        ConfigError::IntervalTooShort => "[timing] intervals must be >= control_period_ms".into(),
        ConfigError::TimeoutTooShort => "[timing] timeouts must be 0 or >= status_interval_ms".into(),
        ConfigError::InvalidBaudRate => "[serial] baud_rate must not be 0".into(),
        ConfigError::InvalidI2cAddress(address) => {
            format!("[solenoids] address 0x{:02X} outside 0x20-0x27", address)
        }
        ConfigError::DuplicateI2cAddress => "[solenoids] addresses must differ".into(),
    }
}

/// machine.toml sections and keys, with the `FirmwareConfig` field each sets
const FIELDS: &[(&str, &str, &str)] = &[
    ("timing", "control_period_ms", "control_period_ms"),
    ("timing", "status_interval_ms", "status_interval_ms"),
    ("timing", "test_interval_ms", "test_interval_ms"),
    ("timing", "stall_timeout_ms", "stall_timeout_ms"),
    ("timing", "line_timeout_ms", "line_timeout_ms"),
    ("beeper", "enabled", "beeper_enabled"),
    ("serial", "baud_rate", "baud_rate"),
    ("solenoids", "addresses", "solenoid_addresses"),
];

/// Flatten the sections onto the defaults and deserialize the result
///
/// Missing keys keep their default; unknown sections and keys are errors.
fn read_config(value: &toml::Value, errors: &mut Vec<String>) -> FirmwareConfig {
    let defaults = FirmwareConfig::DEFAULT;
    let mut fields = match toml::Value::try_from(defaults) {
        Ok(toml::Value::Table(table)) => table,
        other => panic!("FirmwareConfig must serialize to a table, got {:?}", other),
    };

    let Some(root) = value.as_table() else {
        errors.push("machine.toml must be a table of sections".into());
        return defaults;
    };

    for (name, section) in root {
        if !FIELDS.iter().any(|&(s, _, _)| s == name) {
            errors.push(format!("unknown section [{}]", name));
            continue;
        }
        let Some(section) = section.as_table() else {
            errors.push(format!("[{}] must be a table", name));
            continue;
        };
        for (key, item) in section {
            match FIELDS.iter().find(|&&(s, k, _)| s == name && k == key) {
                Some(&(_, _, field)) => {
                    fields.insert(field.to_string(), item.clone());
                }
                None => errors.push(format!("[{}] unknown key {}", name, key)),
            }
        }
    }

    match toml::Value::Table(fields).try_into::<FirmwareConfig>() {
        Ok(config) => config,
        Err(e) => {
            errors.extend(e.to_string().lines().map(str::to_string));
            defaults
        }
    }
}

/// Write `config.rs` into OUT_DIR for `include!`
fn generate_config(config: &FirmwareConfig) {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let [low, high] = config.solenoid_addresses;

    let source = format!(
        "/// Configuration compiled from machine.toml\n\
        pub const FIRMWARE_CONFIG: FirmwareConfig = FirmwareConfig {{\n    \
            control_period_ms: {},\n    \
            status_interval_ms: {},\n    \
            test_interval_ms: {},\n    \
            stall_timeout_ms: {},\n    \
            line_timeout_ms: {},\n    \
            beeper_enabled: {},\n    \
            baud_rate: {},\n    \
            solenoid_addresses: [0x{:02X}, 0x{:02X}],\n\
        }};\n",
        config.control_period_ms,
        config.status_interval_ms,
        config.test_interval_ms,
        config.stall_timeout_ms,
        config.line_timeout_ms,
        config.beeper_enabled,
        config.baud_rate,
        low,
        high,
    );

    fs::write(out_dir.join("config.rs"), source).unwrap();
}
