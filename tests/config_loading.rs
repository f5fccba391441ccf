use std::fs;
use std::path::PathBuf;

use hotdag::config::{load_and_validate, load_or_default};
use hotdag::errors::HotdagError;

#[test]
fn loads_and_validates_a_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Hotdag.toml");
    fs::write(
        &path,
        r#"
[build]
base_dir = "app"
out_dir = "dist/server"
exclude = ["**/fixtures/**"]

[watch]
debounce_ms = 120

[reload]
route_root = "static/pages"
page_chunk_pattern = '^static/pages/.*\.js$'
hard_reload_routes = ["/_document"]

[transform.options]
preset = "node"
"#,
    )
    .unwrap();

    let cfg = load_and_validate(&path).unwrap();
    let build = cfg.build_section();
    assert_eq!(build.base_dir, PathBuf::from("app"));
    assert_eq!(build.out_dir, PathBuf::from("dist/server"));
    assert_eq!(build.exclude, vec!["**/fixtures/**".to_string()]);
    assert_eq!(cfg.watch_section().debounce().as_millis(), 120);
    assert_eq!(cfg.reload_section().route_root, "static/pages");
    assert_eq!(
        cfg.transform_section().options.get("preset").map(String::as_str),
        Some("node")
    );
}

#[test]
fn invalid_glob_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Hotdag.toml");
    fs::write(&path, "[build]\nexclude = [\"pages/[\"]\n").unwrap();

    let err = load_and_validate(&path).unwrap_err();
    assert!(
        matches!(&err, HotdagError::ConfigError(msg) if msg.contains("exclude")),
        "{err}"
    );
}

#[test]
fn explicit_missing_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let err = load_or_default(Some(&missing)).unwrap_err();
    assert!(matches!(err, HotdagError::Io { .. }), "{err}");
}

#[test]
fn malformed_toml_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Hotdag.toml");
    fs::write(&path, "[watch\ndebounce_ms = 5\n").unwrap();

    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, HotdagError::TomlError(_)), "{err}");
}
