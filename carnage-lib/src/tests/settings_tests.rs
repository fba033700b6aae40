use super::*;
use std::collections::HashMap;

fn no_env(_: &str) -> Option<String> {
    None
}

fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

fn load(path: &Path, overrides: &Overrides, env: &HashMap<&str, &str>) -> Result<Settings, SettingsError> {
    Settings::load_with_env(Some(path), overrides, &|var| env.get(var).map(|v| v.to_string()))
}

#[test]
fn test_empty_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "");
    let s = Settings::load_with_env(Some(&path), &Overrides::default(), &no_env).unwrap();

    assert_eq!(s.watch.extension, "xml");
    assert_eq!(s.watch.quiet_period, Duration::from_millis(1500));
    assert_eq!(s.watch.inter_match_delay, Duration::from_secs(3));
    assert_eq!(s.watch.release_grace, Duration::from_secs(5));
    assert_eq!(s.watch.release_grace_on_cleanup_failure, Duration::from_secs(10));
    assert_eq!(s.watch.max_redrives, 3);
    assert!(!s.watch.process_existing);
    assert_eq!(s.webhook.url, None);
    assert!(s.session.enabled);
    assert_eq!(s.session.bridge_url, "http://127.0.0.1:3311");
    assert_eq!(s.session.probe_interval, Duration::from_secs(300));
    assert_eq!(s.session.handshake_timeout, Duration::from_secs(180));
    assert_eq!(s.render.timeout, Duration::from_secs(30));
    assert_eq!((s.render.width, s.render.height), (1200, 1000));
    assert_eq!(s.retry, RetryPolicy::default());
    assert!(s.database_path.ends_with("matches.db"));
    assert_eq!(s.control.addr, None);
    assert_eq!(s.source("webhook.url"), SettingSource::Default);
    assert_eq!(s.file.as_deref(), Some(path.as_path()));
}

#[test]
fn test_file_values_are_used() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[watch]
dir = "/games/reports"
extension = ".XML"
quiet_period_ms = 2500

[webhook]
url = "https://hooks.example/abc"

[session]
chat_id = "group@g.us"
bridge_command = ["node", "bridge.js"]

[retry]
max_attempts = 2

[control]
addr = "127.0.0.1:3000"
api_key = "secret"
"#,
    );
    let s = Settings::load_with_env(Some(&path), &Overrides::default(), &no_env).unwrap();
    assert_eq!(s.watch.dir, PathBuf::from("/games/reports"));
    assert_eq!(s.watch.extension, "XML");
    assert_eq!(s.watch.quiet_period, Duration::from_millis(2500));
    assert_eq!(s.webhook.url.as_deref(), Some("https://hooks.example/abc"));
    assert_eq!(s.session.chat_id.as_deref(), Some("group@g.us"));
    assert_eq!(
        s.session.bridge_command,
        Some(vec!["node".to_string(), "bridge.js".to_string()])
    );
    assert_eq!(s.retry.max_attempts, 2);
    assert_eq!(s.control.addr, Some("127.0.0.1:3000".parse().unwrap()));
    assert_eq!(s.control.api_key.as_deref(), Some("secret"));
    assert_eq!(s.source("webhook.url"), SettingSource::File);
    assert_eq!(s.source("control.addr"), SettingSource::File);
}

#[test]
fn test_priority_cli_over_env_over_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[watch]
dir = "/from/file"

[webhook]
url = "https://file.example/hook"

[database]
path = "/from/file.db"
"#,
    );
    let env = HashMap::from([
        (ENV_WATCH_DIR, "/from/env"),
        (ENV_WEBHOOK_URL, "https://env.example/hook"),
    ]);
    let overrides = Overrides {
        watch_dir: Some(PathBuf::from("/from/cli")),
        ..Overrides::default()
    };
    let s = load(&path, &overrides, &env).unwrap();

    assert_eq!(s.watch.dir, PathBuf::from("/from/cli"));
    assert_eq!(s.source("watch.dir"), SettingSource::Cli);
    assert_eq!(s.webhook.url.as_deref(), Some("https://env.example/hook"));
    assert_eq!(s.source("webhook.url"), SettingSource::Env(ENV_WEBHOOK_URL));
    assert_eq!(s.database_path, PathBuf::from("/from/file.db"));
    assert_eq!(s.source("database.path"), SettingSource::File);
}

#[test]
fn test_blank_env_var_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[webhook]\nurl = \"https://file.example/hook\"\n");
    let env = HashMap::from([(ENV_WEBHOOK_URL, "  ")]);
    let s = load(&path, &Overrides::default(), &env).unwrap();
    assert_eq!(s.webhook.url.as_deref(), Some("https://file.example/hook"));
}

#[test]
fn test_cli_flags_disable_session_and_set_control() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[control]\naddr = \"127.0.0.1:3000\"\n");
    let overrides = Overrides {
        no_session: true,
        process_existing: true,
        control_addr: Some("0.0.0.0:8080".parse().unwrap()),
        ..Overrides::default()
    };
    let s = load(&path, &overrides, &HashMap::new()).unwrap();
    assert!(!s.session.enabled);
    assert!(s.watch.process_existing);
    assert_eq!(s.control.addr, Some("0.0.0.0:8080".parse().unwrap()));
    assert_eq!(s.source("control.addr"), SettingSource::Cli);
}

#[test]
fn test_nested_sandbox_and_profile_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[render]
sandbox_root = "/var/carnage/browser"

[session]
profile_dir = "/var/carnage/browser/session"
"#,
    );
    let err = Settings::load_with_env(Some(&path), &Overrides::default(), &no_env).unwrap_err();
    assert!(matches!(err, SettingsError::Invalid(_)));

    // irrelevant when the session is off
    let overrides = Overrides {
        no_session: true,
        ..Overrides::default()
    };
    assert!(Settings::load_with_env(Some(&path), &overrides, &no_env).is_ok());
}

#[test]
fn test_unknown_key_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[watch]\ndirr = \"/typo\"\n");
    assert!(matches!(
        Settings::load_with_env(Some(&path), &Overrides::default(), &no_env),
        Err(SettingsError::Parse { .. })
    ));
}

#[test]
fn test_bad_control_addr_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[control]\naddr = \"not-an-addr\"\n");
    assert!(matches!(
        Settings::load_with_env(Some(&path), &Overrides::default(), &no_env),
        Err(SettingsError::Invalid(_))
    ));
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(matches!(
        Settings::load_with_env(Some(&missing), &Overrides::default(), &no_env),
        Err(SettingsError::Read { .. })
    ));
}

#[test]
fn test_source_display() {
    assert_eq!(SettingSource::Env(ENV_DB_PATH).to_string(), "env: CARNAGE_DB_PATH");
    assert_eq!(SettingSource::Cli.to_string(), "command line");
}
