// src/compiler/build.rs

//! The dependency-tracked compiler.
//!
//! A [`Compiler`] is a cheap, cloneable handle to one build session: the
//! filesystem, the transformer, the options and the [`BuildLedger`] shared by
//! every compile issued through it.
//!
//! Entry points:
//! - [`Compiler::compile`]: one explicit build request over entry paths;
//! - [`Compiler::rebuild`]: recompile one known source after it changed;
//! - [`Compiler::handle`]: compile a single file or directory tree and report
//!   how many outputs were produced.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::compiler::assets::{AssetKind, AssetRules, emit_copy, emit_hashed};
use crate::compiler::events::{CompilerEvent, Responder};
use crate::compiler::ledger::{Acquire, BuildLedger, RebuildClaim};
use crate::compiler::resolve::{is_local_specifier, normalize_path, resolve_import};
use crate::compiler::transform::{TransformOptions, Transformer};
use crate::config::ConfigFile;
use crate::errors::{HotdagError, Result};
use crate::fs::FileSystem;
use crate::watch::path_utils::relative_str;

/// Settings of one build session, derived from `[build]` and `[transform]`.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub base_dir: PathBuf,
    pub out_dir: PathBuf,
    pub extensions: Vec<String>,
    pub resolve_extensions: Vec<String>,
    pub exclude: Vec<String>,
    pub assets: AssetRules,
    pub transform_options: BTreeMap<String, String>,
}

impl CompileOptions {
    /// Build options from a validated config.
    ///
    /// `base_dir` is the already-resolved base directory; a relative
    /// `out_dir` is taken relative to it.
    pub fn from_config(cfg: &ConfigFile, base_dir: PathBuf) -> Self {
        let build = cfg.build_section();
        let out_dir = if build.out_dir.is_absolute() {
            build.out_dir.clone()
        } else {
            normalize_path(&base_dir.join(&build.out_dir))
        };

        Self {
            base_dir,
            out_dir,
            extensions: build.extensions.clone(),
            resolve_extensions: build.resolve_extensions.clone(),
            exclude: build.exclude.clone(),
            assets: AssetRules::from_build_section(build),
            transform_options: cfg.transform_section().options.clone(),
        }
    }
}

type CountFuture = Pin<Box<dyn Future<Output = usize> + Send + 'static>>;

struct CompilerInner {
    fs: Arc<dyn FileSystem>,
    transformer: Arc<dyn Transformer>,
    ledger: Arc<BuildLedger>,
    options: CompileOptions,
    exclude: GlobSet,
}

/// Handle to one build session.
#[derive(Clone)]
pub struct Compiler {
    inner: Arc<CompilerInner>,
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("base_dir", &self.inner.options.base_dir)
            .field("out_dir", &self.inner.options.out_dir)
            .field("targets", &self.inner.ledger.len())
            .finish()
    }
}

impl Compiler {
    /// Start a new session with an empty ledger.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        transformer: Arc<dyn Transformer>,
        options: CompileOptions,
    ) -> Result<Self> {
        Self::with_ledger(fs, transformer, options, Arc::new(BuildLedger::new()))
    }

    pub fn with_ledger(
        fs: Arc<dyn FileSystem>,
        transformer: Arc<dyn Transformer>,
        options: CompileOptions,
        ledger: Arc<BuildLedger>,
    ) -> Result<Self> {
        let exclude = build_exclude_set(&options.exclude)?;
        Ok(Self {
            inner: Arc::new(CompilerInner {
                fs,
                transformer,
                ledger,
                options,
                exclude,
            }),
        })
    }

    pub fn ledger(&self) -> &Arc<BuildLedger> {
        &self.inner.ledger
    }

    pub fn options(&self) -> &CompileOptions {
        &self.inner.options
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.inner.fs
    }

    /// Absolute, normalised path of an entry given relative to the base dir.
    pub fn resolve_entry(&self, entry: &Path) -> PathBuf {
        normalize_path(&self.inner.options.base_dir.join(entry))
    }

    /// Output path of a code file: mirrored under `out_dir`, extension `.js`.
    pub fn dest_for(&self, source: &Path) -> Result<PathBuf> {
        let rel = self.relative(source)?;
        Ok(self.inner.options.out_dir.join(rel).with_extension("js"))
    }

    fn relative<'a>(&self, path: &'a Path) -> Result<&'a Path> {
        path.strip_prefix(&self.inner.options.base_dir)
            .map_err(|_| HotdagError::OutsideBase {
                path: path.to_path_buf(),
            })
    }

    fn is_excluded(&self, rel: &Path) -> bool {
        self.inner.exclude.is_match(rel)
    }

    /// Run one build request: compile each entry in order, then send the
    /// terminal `built` event. Returns the total number of outputs produced.
    pub async fn compile(&self, entries: &[PathBuf], responder: &Responder) -> usize {
        let mut total = 0;
        for entry in entries {
            let path = self.resolve_entry(entry);
            total += self.handle(path, None, responder.clone()).await;
        }
        info!(
            request_id = responder.id(),
            entries = entries.len(),
            total,
            "compile request finished"
        );
        responder.send(CompilerEvent::Built {
            total_compiled_files: total,
        });
        total
    }

    /// Recompile a source after it changed on disk.
    ///
    /// Known targets are rebuilt in place (keeping their subscribers and
    /// parents); a rebuild already in flight is not started twice. Unknown
    /// sources go through [`Compiler::handle`].
    pub async fn rebuild(&self, source: &Path, responder: &Responder) -> usize {
        match self.inner.ledger.begin_rebuild(source, responder) {
            RebuildClaim::Started { dest } => {
                debug!(source = %source.display(), dest = ?dest, "rebuilding target");
                self.build_file(source.to_path_buf(), dest, responder.clone())
                    .await
            }
            RebuildClaim::InFlight => {
                debug!(source = %source.display(), "rebuild already in flight; attached");
                0
            }
            RebuildClaim::Unknown => self.handle(source.to_path_buf(), None, responder.clone()).await,
        }
    }

    /// Compile a file or directory and return how many outputs it produced.
    ///
    /// `requester` is the destination whose build imported `path`, if any.
    /// Failures are reported through `responder` and count as 0.
    pub fn handle(&self, path: PathBuf, requester: Option<PathBuf>, responder: Responder) -> CountFuture {
        let this = self.clone();
        Box::pin(async move {
            let fs = Arc::clone(&this.inner.fs);

            if !fs.exists(&path) {
                let err = HotdagError::io(&path, "no such file or directory");
                responder.send(CompilerEvent::file_error(&path, &err));
                return 0;
            }

            let rel = match this.relative(&path) {
                Ok(rel) => rel.to_path_buf(),
                Err(err) => {
                    warn!(path = %path.display(), "refusing to compile outside base dir");
                    responder.send(CompilerEvent::file_error(&path, &err));
                    return 0;
                }
            };
            if this.is_excluded(&rel) {
                debug!(path = %path.display(), "excluded");
                return 0;
            }

            if fs.is_dir(&path) {
                return this.compile_dir(path, responder).await;
            }

            let Some(ext) = dotted_extension(&path) else {
                debug!(path = %path.display(), "no extension; skipped");
                return 0;
            };
            if !this.inner.options.extensions.contains(&ext) {
                debug!(path = %path.display(), ext = %ext, "extension not allowed; skipped");
                return 0;
            }

            if let Some(kind) = this.inner.options.assets.kind_of(&ext) {
                return this.build_asset(&path, &rel, kind, &responder);
            }

            let dest = this.inner.options.out_dir.join(&rel).with_extension("js");
            match this
                .inner
                .ledger
                .acquire(&path, &dest, requester.as_deref(), &responder)
            {
                Acquire::Joined => 0,
                Acquire::Started => this.build_file(path, dest, responder).await,
            }
        })
    }

    async fn compile_dir(&self, dir: PathBuf, responder: Responder) -> usize {
        let files = match self.list_dir(&dir) {
            Ok(files) => files,
            Err(err) => {
                responder.send(CompilerEvent::file_error(&dir, &err));
                return 0;
            }
        };
        debug!(dir = %dir.display(), files = files.len(), "compiling directory");

        let mut set = JoinSet::new();
        for file in files {
            set.spawn(self.handle(file, None, responder.clone()));
        }
        join_counts(&mut set).await
    }

    /// Every file below `dir`, skipping dotfiles and excluded paths.
    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let fs = &self.inner.fs;
        let mut out = Vec::new();
        let mut stack = vec![dir.to_path_buf()];

        while let Some(current) = stack.pop() {
            let entries = fs
                .read_dir(&current)
                .map_err(|e| HotdagError::io(&current, format!("{e:#}")))?;
            for entry in entries {
                let hidden = entry
                    .file_name()
                    .map(|n| n.to_string_lossy().starts_with('.'))
                    .unwrap_or(true);
                if hidden {
                    continue;
                }
                if let Ok(rel) = self.relative(&entry)
                    && self.is_excluded(rel)
                {
                    continue;
                }
                if fs.is_dir(&entry) {
                    stack.push(entry);
                } else {
                    out.push(entry);
                }
            }
        }

        out.sort();
        Ok(out)
    }

    fn build_asset(&self, path: &Path, rel: &Path, kind: AssetKind, responder: &Responder) -> usize {
        let fs = self.inner.fs.as_ref();
        let mirrored = self.inner.options.out_dir.join(rel);
        let res = match kind {
            AssetKind::Copy => emit_copy(fs, path, &mirrored).map(|_| mirrored.clone()),
            AssetKind::Hashed => emit_hashed(
                fs,
                &self.inner.options.assets,
                path,
                &self.inner.options.out_dir,
                &mirrored,
            ),
        };

        match res {
            Ok(written) => {
                debug!(source = %path.display(), dest = ?written, ?kind, "asset emitted");
                1
            }
            Err(err) => {
                warn!(source = %path.display(), error = %err, "asset failed");
                responder.send(CompilerEvent::file_error(path, &err));
                0
            }
        }
    }

    /// Compile an acquired code target and notify everyone attached to it.
    async fn build_file(&self, source: PathBuf, dest: PathBuf, responder: Responder) -> usize {
        let ledger = &self.inner.ledger;

        match self.compile_code(&source, &dest, &responder).await {
            Ok(locals) => {
                if let Some(done) = ledger.finish(&dest, true) {
                    let event = CompilerEvent::FileBuilt {
                        source: source.clone(),
                        dest: dest.clone(),
                        local_dep_count: locals,
                        parents: done.parents,
                    };
                    for r in &done.responders {
                        r.send(event.clone());
                    }
                }
                info!(source = %source.display(), locals, "file built");
                locals + 1
            }
            Err(err) => {
                warn!(source = %source.display(), error = %err, "file failed");
                let event = CompilerEvent::file_error(&source, &err);
                match ledger.finish(&dest, false) {
                    Some(done) => {
                        for r in &done.responders {
                            r.send(event.clone());
                        }
                    }
                    None => responder.send(event),
                }
                0
            }
        }
    }

    /// Read, transform, compile local imports, write. Returns the number of
    /// outputs the local imports produced.
    async fn compile_code(&self, source: &Path, dest: &Path, responder: &Responder) -> Result<usize> {
        let fs = Arc::clone(&self.inner.fs);
        let text = fs
            .read_to_string(source)
            .map_err(|e| HotdagError::io(source, format!("{e:#}")))?;

        let options = self.transform_options(source);
        let output = self
            .inner
            .transformer
            .transform(source, &text, &options)
            .await
            .map_err(|failure| failure.into_error(source))?;

        // Resolve every import before compiling any, so an unresolved import
        // fails the whole file.
        let mut deps = Vec::new();
        for spec in output
            .imported_specifiers
            .iter()
            .filter(|s| is_local_specifier(s))
        {
            deps.push(resolve_import(
                fs.as_ref(),
                source,
                spec,
                &self.inner.options.resolve_extensions,
            )?);
        }

        let mut set = JoinSet::new();
        for dep in deps {
            set.spawn(self.handle(dep, Some(dest.to_path_buf()), responder.clone()));
        }
        let locals = join_counts(&mut set).await;

        fs.write(dest, output.code.as_bytes())
            .map_err(|e| HotdagError::io(dest, format!("{e:#}")))?;
        Ok(locals)
    }

    fn transform_options(&self, source: &Path) -> TransformOptions {
        let opts = &self.inner.options;
        let source_file_name = relative_str(&opts.base_dir, &source.with_extension("js"))
            .unwrap_or_else(|| source.to_string_lossy().replace('\\', "/"));
        TransformOptions {
            source_file_name,
            source_root: opts.base_dir.to_string_lossy().into_owned(),
            extra: opts.transform_options.clone(),
        }
    }
}

async fn join_counts(set: &mut JoinSet<usize>) -> usize {
    let mut total = 0;
    while let Some(res) = set.join_next().await {
        match res {
            Ok(n) => total += n,
            Err(err) => warn!(error = %err, "compile task aborted"),
        }
    }
    total
}

fn dotted_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
}

fn build_exclude_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            HotdagError::ConfigError(format!("invalid exclude glob {pattern:?}: {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| HotdagError::ConfigError(format!("building exclude set: {e}")))
}
