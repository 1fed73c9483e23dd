use figment::providers::Serialized;
use figment::Jail;
use mrclean::config::{Config, MIN_BLOCK_BYTES};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let figment = figment::Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config.io_threads, 4);
    assert_eq!(config.quick_hash_bytes, 64 * 1024);
    assert_eq!(config.chunk_bytes, 128 * 1024);
    assert!(config.hardlink_shortcut);
    assert!(!config.use_trash);
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let toml_content = r#"
io_threads = 8
follow_symlinks = true
exclude = ["node_modules/", "*.tmp"]
use_trash = true
"#;
    fs::write(&config_path, toml_content).unwrap();

    use figment::{
        providers::{Format, Toml},
        Figment,
    };
    let figment =
        Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(&config_path));

    let config: Config = figment.extract().unwrap();

    assert_eq!(config.io_threads, 8);
    assert!(config.follow_symlinks);
    assert!(config.use_trash);
    assert_eq!(config.exclude, vec!["node_modules/", "*.tmp"]);
    // Unset keys keep their defaults.
    assert!(config.hardlink_shortcut);
}

#[test]
fn test_config_invalid_toml_rejected() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "invalid = toml").unwrap();

    let result = Config::load(Some(&config_path));
    assert!(result.is_err());
}

#[test]
fn test_config_wrong_type_rejected() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "io_threads = \"many\"").unwrap();

    let err = Config::load(Some(&config_path)).unwrap_err();
    assert!(format!("{err:#}").contains("Invalid configuration"));
}

#[test]
fn test_config_missing_explicit_file() {
    let err = Config::load(Some(Path::new("/definitely/not/here/mrclean.toml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
}

#[test]
fn test_config_env_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "mrclean.toml",
            r#"
io_threads = 8
use_trash = false
"#,
        )?;
        jail.set_env("MRCLEAN_IO_THREADS", "2");
        jail.set_env("MRCLEAN_USE_TRASH", "true");

        let config = Config::load(Some(Path::new("mrclean.toml"))).map_err(|e| e.to_string())?;
        assert_eq!(config.io_threads, 2);
        assert!(config.use_trash);
        Ok(())
    });
}

#[test]
fn test_config_loaded_values_are_clamped() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "mrclean.toml",
            r#"
io_threads = 0
quick_hash_bytes = 1
chunk_bytes = 0
"#,
        )?;

        let config = Config::load(Some(Path::new("mrclean.toml"))).map_err(|e| e.to_string())?;
        assert_eq!(config.io_threads, 1);
        assert_eq!(config.quick_hash_bytes, MIN_BLOCK_BYTES);
        assert_eq!(config.chunk_bytes, MIN_BLOCK_BYTES);
        Ok(())
    });
}

#[test]
fn test_config_feeds_engine_settings() {
    let config = Config {
        io_threads: 2,
        quick_hash_bytes: 8192,
        hardlink_shortcut: false,
        follow_symlinks: true,
        exclude: vec!["*.bak".to_string()],
        ..Config::default()
    };

    let fingerprint = config.fingerprint_config();
    assert_eq!(fingerprint.io_threads, 2);
    assert_eq!(fingerprint.quick_hash_bytes, 8192);
    assert!(!fingerprint.hardlink_shortcut);

    let walker = config.walker_config();
    assert!(walker.follow_symlinks);
    assert_eq!(walker.exclude, vec!["*.bak"]);
}
