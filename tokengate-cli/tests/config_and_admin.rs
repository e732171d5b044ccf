//! Configuration loading and administrative commands

use std::io::Write;

use tokengate::config::{AuthMode, StoreSettings};
use tokengate::secrets::ClientCredentials;
use tokengate_cli_lib::commands::{ProvisionCommand, RotateCommand, ShowConfigCommand};
use tokengate_cli_lib::load_config;

fn sqlite_settings(dir: &tempfile::TempDir) -> StoreSettings {
    StoreSettings {
        database_url: format!("sqlite://{}", dir.path().join("admin.db").display()),
        ..StoreSettings::default()
    }
}

#[test]
fn test_load_config_from_explicit_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[server]
bind_address = "0.0.0.0:9000"

[auth]
mode = "development"
session_lifetime_secs = 3600
"#
    )
    .unwrap();

    let config = load_config(Some(file.path())).unwrap();
    assert_eq!(config.server.bind_address, "0.0.0.0:9000");
    assert_eq!(config.auth.mode, AuthMode::Development);
    assert_eq!(config.auth.session_lifetime_secs, 3600);
    assert_eq!(config.auth.login_path, "/Auth/Login");
}

#[test]
fn test_load_config_rejects_invalid_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[auth]\nmode = \"sometimes\"").unwrap();

    assert!(load_config(Some(file.path())).is_err());
}

#[test]
fn test_show_config_renders_loaded_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[store]\nmax_attempts = 7").unwrap();

    let config = load_config(Some(file.path())).unwrap();
    let rendered = ShowConfigCommand::new(config).render().unwrap();
    assert!(rendered.contains("max_attempts = 7"));
    assert!(rendered.contains("[provider]"));
}

#[tokio::test]
async fn test_provisioning_twice_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let settings = sqlite_settings(&dir);

    ProvisionCommand::new(settings.clone(), ClientCredentials::new("id", "secret"))
        .execute()
        .await
        .unwrap();

    let err = ProvisionCommand::new(settings, ClientCredentials::new("other", "secret"))
        .execute()
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "OAuth already configured");
}

#[tokio::test]
async fn test_rotate_secret_on_fresh_store() {
    let dir = tempfile::tempdir().unwrap();

    RotateCommand::new(sqlite_settings(&dir))
        .execute()
        .await
        .unwrap();
}
