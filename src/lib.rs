// src/lib.rs

pub mod artifacts;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod errors;
pub mod fs;
pub mod hash;
pub mod logging;
pub mod reload;
pub mod types;
pub mod watch;
pub mod worker;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::artifacts::{collect_stats, write_artifacts};
use crate::cli::{CliArgs, Command};
use crate::compiler::{CompileOptions, Compiler, CompilerEvent, ImportScanner};
use crate::config::{ConfigFile, load_or_default};
use crate::fs::{FileSystem, RealFileSystem};
use crate::reload::{BundlePass, Dispatcher, JsonLinesPublisher, PageFilter, ReloadTracker};
use crate::types::CompileCommand;
use crate::watch::{Evictor, FileChange, ModuleCache, NotifyWatcher, PathWatcher};
use crate::worker::{WatchSupport, WatcherFactory, WorkerClient, spawn_worker};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the compiler session and its worker
/// - (for `watch`) the notify watcher, module cache and Ctrl-C handling
/// - (for `diff`) the reload tracker and dispatcher
pub async fn run(args: CliArgs) -> Result<()> {
    let (config_path, cfg) = load_or_default(args.config.as_deref())?;
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    if args.dry_run {
        print_dry_run(&config_path, &cfg);
        return Ok(());
    }

    match args.command {
        Command::Build { files } => {
            let compiler = open_session(Arc::clone(&fs), &config_path, &cfg)?;
            run_build(compiler, files).await
        }
        Command::Watch { files } => {
            let compiler = open_session(Arc::clone(&fs), &config_path, &cfg)?;
            run_watch(compiler, &cfg, files).await
        }
        Command::Diff { previous, current } => run_diff(fs.as_ref(), &cfg, &previous, &current),
    }
}

/// Create the compiler for one build/watch session.
fn open_session(fs: Arc<dyn FileSystem>, config_path: &Path, cfg: &ConfigFile) -> Result<Compiler> {
    let base_dir = config_root_dir(config_path).join(&cfg.build_section().base_dir);
    let base_dir = fs
        .canonicalize(&base_dir)
        .with_context(|| format!("resolving base_dir {:?}", base_dir))?;
    info!(base_dir = %base_dir.display(), "opening build session");

    let options = CompileOptions::from_config(cfg, base_dir);
    let scanner = ImportScanner::new().context("compiling import scanner")?;
    Ok(Compiler::new(fs, Arc::new(scanner), options)?)
}

async fn run_build(compiler: Compiler, files: Vec<PathBuf>) -> Result<()> {
    let fs = Arc::clone(compiler.fs());
    let out_dir = compiler.options().out_dir.clone();

    let (requests, responses) = spawn_worker(compiler, None);
    let client = WorkerClient::connect(requests, responses);
    let report = client.build(files).await?;

    for event in report.built.iter().chain(&report.errors) {
        print_json_line(event)?;
    }
    print_json_line(&CompilerEvent::Built {
        total_compiled_files: report.total_compiled_files,
    })?;

    let stats = collect_stats(fs.as_ref(), &out_dir, &report)?;
    write_artifacts(fs.as_ref(), &out_dir, &stats)?;

    if !report.is_success() {
        bail!("{} file(s) failed to compile", report.errors.len());
    }
    Ok(())
}

async fn run_watch(compiler: Compiler, cfg: &ConfigFile, files: Vec<PathBuf>) -> Result<()> {
    let fs = Arc::clone(compiler.fs());
    let cache = Arc::new(ModuleCache::new());

    let watcher_factory: WatcherFactory = Arc::new(
        || -> Result<(Box<dyn PathWatcher>, mpsc::UnboundedReceiver<FileChange>)> {
            let (tx, rx) = mpsc::unbounded_channel::<FileChange>();
            let watcher: Box<dyn PathWatcher> = Box::new(NotifyWatcher::new(tx)?);
            Ok((watcher, rx))
        },
    );
    let support = WatchSupport {
        evictor: Arc::clone(&cache) as Arc<dyn Evictor>,
        watcher_factory,
        debounce: cfg.watch_section().debounce(),
    };

    let (requests, responses) = spawn_worker(compiler, Some(support));
    let client = WorkerClient::connect(requests, responses);
    let (id, mut events) = client.request(CompileCommand::Watch, files)?;
    info!(request_id = id, "watching; press Ctrl-C to stop");

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(err) = res {
                    warn!(error = %err, "failed to listen for Ctrl-C");
                }
                info!(cached = cache.len(), "shutting down watch session");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else {
                    warn!("worker stopped");
                    break;
                };
                // Reload the fresh output into the cache the rebuild just
                // invalidated.
                if let CompilerEvent::FileBuilt { dest, .. } = &event
                    && let Err(err) = cache.load(fs.as_ref(), dest)
                {
                    debug!(dest = %dest.display(), error = %err, "could not prime module cache");
                }
                print_json_line(&event)?;
            }
        }
    }

    client.forget(id);
    Ok(())
}

fn run_diff(fs: &dyn FileSystem, cfg: &ConfigFile, previous: &Path, current: &Path) -> Result<()> {
    let reload = cfg.reload_section();
    let mut tracker = ReloadTracker::new(PageFilter::new(&reload.page_chunk_pattern)?);

    let previous = read_bundle_pass(fs, previous)?;
    let current = read_bundle_pass(fs, current)?;
    tracker.record(&previous)?;
    let Some(diff) = tracker.record(&current)? else {
        return Ok(());
    };

    let dispatcher = Dispatcher::from_config(reload, Arc::new(JsonLinesPublisher::new(io::stdout())));
    let sent = dispatcher.notify(&diff)?;
    debug!(notifications = sent.len(), "diff complete");
    Ok(())
}

fn read_bundle_pass(fs: &dyn FileSystem, path: &Path) -> Result<BundlePass> {
    let text = fs.read_to_string(path)?;
    serde_json::from_str(&text).with_context(|| format!("parsing bundling pass {:?}", path))
}

fn print_json_line<T: Serialize>(value: &T) -> Result<()> {
    let line = serde_json::to_string(value).context("serialising event")?;
    let mut out = io::stdout().lock();
    writeln!(out, "{line}").context("writing to stdout")?;
    Ok(())
}

/// Directory relative paths in the config are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "configs/Hotdag.toml"),
///   use that directory.
/// - If it's a bare filename like "Hotdag.toml" (parent = ""), fall back to
///   the current working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Dry-run output: the effective configuration.
fn print_dry_run(config_path: &Path, cfg: &ConfigFile) {
    let build = cfg.build_section();
    let reload = cfg.reload_section();

    println!("hotdag dry-run ({})", config_path.display());
    println!("[build]");
    println!("  base_dir = {:?}", build.base_dir);
    println!("  out_dir = {:?}", build.out_dir);
    println!("  extensions = {:?}", build.extensions);
    println!("  resolve_extensions = {:?}", build.resolve_extensions);
    println!("  exclude = {:?}", build.exclude);
    println!("  copy_assets = {:?}", build.copy_assets);
    println!("  hashed_assets = {:?}", build.hashed_assets);
    println!("  static_prefix = {:?}", build.static_prefix);
    println!("  public_path = {:?}", build.public_path);
    println!("[watch]");
    println!("  debounce_ms = {}", cfg.watch_section().debounce_ms);
    println!("[reload]");
    println!("  route_root = {:?}", reload.route_root);
    println!("  page_chunk_pattern = {:?}", reload.page_chunk_pattern);
    println!("  hard_reload_routes = {:?}", reload.hard_reload_routes);

    let options = &cfg.transform_section().options;
    if !options.is_empty() {
        println!("[transform.options]");
        for (key, value) in options {
            println!("  {key} = {value:?}");
        }
    }

    debug!("dry-run complete (nothing compiled)");
}
