use std::path::{Path, PathBuf};
use std::sync::Arc;

use hotdag::compiler::{CompileOptions, Compiler, Transformer};
use hotdag::config::{ConfigFile, RawConfigFile};
use hotdag::fs::mock::MockFileSystem;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_out_dir(mut self, out_dir: &str) -> Self {
        self.config.build.out_dir = PathBuf::from(out_dir);
        self
    }

    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.config.build.exclude.push(pattern.to_string());
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.config.watch.debounce_ms = ms;
        self
    }

    pub fn with_hard_reload_route(mut self, route: &str) -> Self {
        self.config.reload.hard_reload_routes.push(route.to_string());
        self
    }

    pub fn with_transform_option(mut self, key: &str, value: &str) -> Self {
        self.config
            .transform
            .options
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-memory project rooted at `base`.
///
/// ```ignore
/// let project = ProjectBuilder::new("/p")
///     .file("pages/index.js", "import './a'")
///     .file("pages/a.js", "");
/// let compiler = project.compiler(Arc::new(FakeTransformer::new()));
/// ```
pub struct ProjectBuilder {
    fs: MockFileSystem,
    base: PathBuf,
    config: ConfigFile,
}

impl ProjectBuilder {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        let fs = MockFileSystem::new();
        fs.add_dir(&base);
        Self {
            fs,
            base,
            config: ConfigFile::default(),
        }
    }

    /// Add a file relative to the base directory.
    pub fn file(self, rel: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.fs.add_file(self.base.join(rel), contents);
        self
    }

    pub fn config(mut self, config: ConfigFile) -> Self {
        self.config = config;
        self
    }

    pub fn fs(&self) -> &MockFileSystem {
        &self.fs
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Absolute path of a file in the project.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.base.join(rel)
    }

    /// Absolute path of an output, relative to the output directory.
    pub fn out(&self, rel: &str) -> PathBuf {
        self.options().out_dir.join(rel)
    }

    pub fn options(&self) -> CompileOptions {
        CompileOptions::from_config(&self.config, self.base.clone())
    }

    pub fn compiler(&self, transformer: Arc<dyn Transformer>) -> Compiler {
        Compiler::new(Arc::new(self.fs.clone()), transformer, self.options())
            .expect("Failed to create compiler for test project")
    }
}
