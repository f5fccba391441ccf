// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [build]
/// base_dir = "."
/// out_dir = ".hotdag/server"
/// exclude = ["**/__tests__/**", "**/node_modules/**"]
///
/// [watch]
/// debounce_ms = 50
///
/// [reload]
/// route_root = "bundles/pages"
/// hard_reload_routes = ["/_error", "/_document"]
///
/// [transform.options]
/// preset = "node"
/// ```
///
/// All sections are optional and have reasonable defaults. This is the
/// unvalidated form; see [`ConfigFile`].
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub reload: ReloadSection,

    #[serde(default)]
    pub transform: TransformSection,
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// holders can rely on globs and regexes compiling.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    build: BuildSection,
    watch: WatchSection,
    reload: ReloadSection,
    transform: TransformSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            build: raw.build,
            watch: raw.watch,
            reload: raw.reload,
            transform: raw.transform,
        }
    }

    pub fn build_section(&self) -> &BuildSection {
        &self.build
    }

    pub fn watch_section(&self) -> &WatchSection {
        &self.watch
    }

    pub fn reload_section(&self) -> &ReloadSection {
        &self.reload
    }

    pub fn transform_section(&self) -> &TransformSection {
        &self.transform
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(RawConfigFile::default())
    }
}

/// `[build]` section: what the dependency-tracked compiler accepts and where
/// it writes.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Entries and import targets are resolved relative to this directory.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Mirrored output tree.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Extension allow-list; files with any other extension are skipped.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Extensions tried, in order, when an import specifier has none.
    #[serde(default = "default_resolve_extensions")]
    pub resolve_extensions: Vec<String>,

    /// Globs (relative to `base_dir`) that are never compiled.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Assets copied byte-for-byte to the mirrored location.
    #[serde(default = "default_copy_assets")]
    pub copy_assets: Vec<String>,

    /// Assets renamed by content hash, with a shim module left behind.
    #[serde(default = "default_hashed_assets")]
    pub hashed_assets: Vec<String>,

    /// URL prefix of renamed assets, relative to the runtime public path.
    #[serde(default = "default_static_prefix")]
    pub static_prefix: String,

    /// Runtime expression the shim module prepends to the asset URL.
    #[serde(default = "default_public_path")]
    pub public_path: String,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_out_dir() -> PathBuf {
    PathBuf::from(".hotdag/server")
}

fn default_extensions() -> Vec<String> {
    [".js", ".jsx", ".json", ".woff"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_resolve_extensions() -> Vec<String> {
    vec![".js".to_string(), ".jsx".to_string()]
}

fn default_exclude() -> Vec<String> {
    vec![
        "**/__tests__/**".to_string(),
        "**/node_modules/**".to_string(),
    ]
}

fn default_copy_assets() -> Vec<String> {
    vec![".json".to_string()]
}

fn default_hashed_assets() -> Vec<String> {
    vec![".woff".to_string()]
}

fn default_static_prefix() -> String {
    "_static/".to_string()
}

fn default_public_path() -> String {
    "__webpack_public_path__".to_string()
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            out_dir: default_out_dir(),
            extensions: default_extensions(),
            resolve_extensions: default_resolve_extensions(),
            exclude: default_exclude(),
            copy_assets: default_copy_assets(),
            hashed_assets: default_hashed_assets(),
            static_prefix: default_static_prefix(),
            public_path: default_public_path(),
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchSection {
    /// A path must be quiet this long before its change is acted upon.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    50
}

impl WatchSection {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// `[reload]` section: chunk filtering and route mapping.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReloadSection {
    /// Prefix stripped from chunk names to obtain routes.
    #[serde(default = "default_route_root")]
    pub route_root: String,

    /// Only chunks whose name matches take part in diffing.
    #[serde(default = "default_page_chunk_pattern")]
    pub page_chunk_pattern: String,

    /// Routes whose code wraps every other route; never soft-updated.
    #[serde(default = "default_hard_reload_routes")]
    pub hard_reload_routes: Vec<String>,
}

fn default_route_root() -> String {
    "bundles/pages".to_string()
}

fn default_page_chunk_pattern() -> String {
    r"^bundles[/\\]pages.*\.js$".to_string()
}

fn default_hard_reload_routes() -> Vec<String> {
    vec!["/_error".to_string(), "/_document".to_string()]
}

impl Default for ReloadSection {
    fn default() -> Self {
        Self {
            route_root: default_route_root(),
            page_chunk_pattern: default_page_chunk_pattern(),
            hard_reload_routes: default_hard_reload_routes(),
        }
    }
}

/// `[transform]` section, forwarded untouched to the transform adapter.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TransformSection {
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}
