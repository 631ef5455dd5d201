use std::sync::{Mutex, MutexGuard};
use utils::app_config::*;

// 配置是全局状态，测试之间串行执行
static CONFIG_LOCK: Mutex<()> = Mutex::new(());

pub fn initialize() -> MutexGuard<'static, ()> {
    let guard = CONFIG_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    // Reset to original test configuration
    let config_contents = include_str!("resources/test_config.toml");
    AppConfig::init(Some(config_contents)).unwrap();
    guard
}

#[test]
fn fetch_config() {
    let _guard = initialize();

    let config = AppConfig::fetch().unwrap();

    assert_eq!(config.log.level, "info");
    assert!(!config.log.file);

    assert_eq!(config.command.shell.as_deref(), Some("sh"));
    assert_eq!(config.command.shell_arg.as_deref(), Some("-c"));
    assert_eq!(config.command.powershell.as_deref(), Some("pwsh"));

    assert_eq!(config.plist.plutil, "/usr/bin/plutil");
}

#[test]
fn verify_get() {
    let _guard = initialize();

    assert_eq!(AppConfig::get::<String>("log.level").unwrap(), "info");
    assert_eq!(AppConfig::get::<bool>("log.file").unwrap(), false);
    assert_eq!(AppConfig::get::<String>("command.powershell").unwrap(), "pwsh");
    assert_eq!(
        AppConfig::get::<String>("plist.plutil").unwrap(),
        "/usr/bin/plutil"
    );
}

#[test]
fn verify_set() {
    let _guard = initialize();

    AppConfig::set("command.shell", "bash").unwrap();
    AppConfig::set("plist.plutil", "plutil").unwrap();

    let config = AppConfig::fetch().unwrap();
    assert_eq!(config.command.shell.as_deref(), Some("bash"));
    assert_eq!(config.plist.plutil, "plutil");
}

#[test]
fn test_nested_configuration_access() {
    let _guard = initialize();

    let log_config = AppConfig::get::<LogConfig>("log").unwrap();
    assert_eq!(log_config.level, "info");

    let command_config = AppConfig::get::<CommandConfig>("command").unwrap();
    assert_eq!(command_config.shell.as_deref(), Some("sh"));
    assert_eq!(command_config.powershell.as_deref(), Some("pwsh"));

    let settings = descriptor::host::CommandSettings::from(&command_config);
    assert_eq!(settings.powershell, "pwsh");
}

#[test]
fn test_missing_key_is_an_error() {
    let _guard = initialize();

    assert!(AppConfig::get::<String>("plist.nonexistent").is_err());
}

#[test]
fn test_unset_command_fields_use_platform_defaults() {
    let _guard = initialize();
    AppConfig::init(Some("[log]\nlevel = \"info\"\n\n[plist]\nplutil = \"plutil\"\n")).unwrap();

    let config = AppConfig::fetch().unwrap();
    assert!(config.command.shell.is_none());
    assert_eq!(
        descriptor::host::CommandSettings::from(&config.command),
        descriptor::host::CommandSettings::default()
    );

    let partial = CommandConfig {
        powershell: Some("pwsh-preview".to_string()),
        ..CommandConfig::default()
    };
    let settings = descriptor::host::CommandSettings::from(&partial);
    assert_eq!(settings.powershell, "pwsh-preview");
    assert_eq!(settings.shell, descriptor::host::CommandSettings::default().shell);
}

#[test]
fn test_embedded_defaults_leave_commands_to_the_platform() {
    let _guard = initialize();
    AppConfig::init(Some(include_str!("../../src/resources/default_config.toml"))).unwrap();

    let config = AppConfig::fetch().unwrap();
    assert_eq!(
        descriptor::host::CommandSettings::from(&config.command),
        descriptor::host::CommandSettings::default()
    );
}
