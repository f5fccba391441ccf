// src/config/validate.rs

use globset::Glob;
use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{HotdagError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::HotdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_extensions(cfg)?;
    validate_asset_lists(cfg)?;
    validate_exclude_globs(cfg)?;
    validate_watch(cfg)?;
    validate_reload(cfg)?;
    Ok(())
}

fn validate_extensions(cfg: &RawConfigFile) -> Result<()> {
    let build = &cfg.build;
    for (field, list) in [
        ("extensions", &build.extensions),
        ("resolve_extensions", &build.resolve_extensions),
        ("copy_assets", &build.copy_assets),
        ("hashed_assets", &build.hashed_assets),
    ] {
        for ext in list {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(HotdagError::ConfigError(format!(
                    "[build].{field} entry '{ext}' must look like \".ext\""
                )));
            }
        }
    }

    if build.resolve_extensions.is_empty() {
        return Err(HotdagError::ConfigError(
            "[build].resolve_extensions must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_asset_lists(cfg: &RawConfigFile) -> Result<()> {
    let build = &cfg.build;
    for ext in build.copy_assets.iter().chain(build.hashed_assets.iter()) {
        if !build.extensions.contains(ext) {
            return Err(HotdagError::ConfigError(format!(
                "asset extension '{ext}' is not in [build].extensions"
            )));
        }
        if build.copy_assets.contains(ext) && build.hashed_assets.contains(ext) {
            return Err(HotdagError::ConfigError(format!(
                "asset extension '{ext}' cannot be both copied and hashed"
            )));
        }
    }
    Ok(())
}

fn validate_exclude_globs(cfg: &RawConfigFile) -> Result<()> {
    for pat in cfg.build.exclude.iter() {
        Glob::new(pat).map_err(|e| {
            HotdagError::ConfigError(format!("invalid [build].exclude glob '{pat}': {e}"))
        })?;
    }
    Ok(())
}

fn validate_watch(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watch.debounce_ms == 0 {
        return Err(HotdagError::ConfigError(
            "[watch].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_reload(cfg: &RawConfigFile) -> Result<()> {
    Regex::new(&cfg.reload.page_chunk_pattern).map_err(|e| {
        HotdagError::ConfigError(format!("invalid [reload].page_chunk_pattern: {e}"))
    })?;

    for route in cfg.reload.hard_reload_routes.iter() {
        if !route.starts_with('/') {
            return Err(HotdagError::ConfigError(format!(
                "[reload].hard_reload_routes entry '{route}' must start with '/'"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml_src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.watch_section().debounce_ms, 50);
        assert_eq!(
            cfg.reload_section().hard_reload_routes,
            vec!["/_error".to_string(), "/_document".to_string()]
        );
        assert!(cfg.build_section().extensions.contains(&".woff".to_string()));
    }

    #[test]
    fn zero_debounce_is_rejected() {
        let err = parse("[watch]\ndebounce_ms = 0\n").unwrap_err();
        assert!(matches!(err, HotdagError::ConfigError(msg) if msg.contains("debounce_ms")));
    }

    #[test]
    fn asset_extension_must_be_allowed() {
        let err = parse(
            r#"
[build]
extensions = [".js"]
copy_assets = [".json"]
hashed_assets = []
"#,
        )
        .unwrap_err();
        assert!(matches!(err, HotdagError::ConfigError(msg) if msg.contains(".json")));
    }

    #[test]
    fn bad_chunk_pattern_is_rejected() {
        let err = parse("[reload]\npage_chunk_pattern = \"(\"\n").unwrap_err();
        assert!(matches!(err, HotdagError::ConfigError(msg) if msg.contains("page_chunk_pattern")));
    }

    #[test]
    fn relative_hard_reload_route_is_rejected() {
        let err = parse("[reload]\nhard_reload_routes = [\"_document\"]\n").unwrap_err();
        assert!(matches!(err, HotdagError::ConfigError(_)));
    }

    #[test]
    fn unknown_keys_are_toml_errors() {
        let err = parse("[build]\nout = \"x\"\n").unwrap_err();
        assert!(matches!(err, HotdagError::TomlError(_)));
    }
}
