use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use similar_images::config::{Config, ENV_PREFIX};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .extract()
        .unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.cache_max_entries, 100_000);
    assert_eq!(config.flush_every, 500);
}

#[test]
fn test_config_load_from_env() {
    std::env::set_var("SIMILAR_IMAGES_TEST_WORKERS", "16");
    std::env::set_var("SIMILAR_IMAGES_TEST_SKIP_HIDDEN", "false");

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("SIMILAR_IMAGES_TEST_").split("__"))
        .extract()
        .unwrap();

    assert_eq!(config.workers, 16);
    assert!(!config.skip_hidden);

    std::env::remove_var("SIMILAR_IMAGES_TEST_WORKERS");
    std::env::remove_var("SIMILAR_IMAGES_TEST_SKIP_HIDDEN");
    assert_eq!(ENV_PREFIX, "SIMILAR_IMAGES_");
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
workers = 3
cache_path = "/tmp/prints.json"
extensions = ["png", "heic"]
ignore_patterns = ["thumbnails/"]
min_similarity = 75
consider_symmetry = false
"#,
    )
    .unwrap();

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file_exact(&config_path))
        .extract()
        .unwrap();

    assert_eq!(config.workers, 3);
    assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/prints.json")));
    assert_eq!(config.extensions, vec!["png", "heic"]);
    assert_eq!(config.ignore_patterns, vec!["thumbnails/"]);
    assert_eq!(config.min_similarity, 75);
    assert!(!config.consider_symmetry);
    // Unset keys keep their defaults.
    assert!(config.skip_hidden);
}

#[test]
fn test_config_load_rejects_invalid_values() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    fs::write(&config_path, "min_similarity = 120\n").unwrap();
    assert!(Config::load(Some(&config_path)).is_err());

    fs::write(&config_path, "workers = \"many\"\n").unwrap();
    assert!(Config::load(Some(&config_path)).is_err());

    fs::write(&config_path, "cache_max_entries = 0\n").unwrap();
    assert!(Config::load(Some(&config_path)).is_err());
}

#[test]
fn test_config_save_and_load() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let config = Config {
        workers: 2,
        follow_symlinks: true,
        ..Config::default()
    };
    config.save(&config_path).unwrap();

    let loaded = Config::load(Some(&config_path)).unwrap();
    assert_eq!(loaded.workers, 2);
    assert!(loaded.follow_symlinks);
}
