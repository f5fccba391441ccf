// src/compiler/transform.rs

//! The transform seam.
//!
//! The compiler treats the source-to-output transform as a black box: source
//! text and path in, output code and the list of imported specifiers out.
//! [`ImportScanner`] is the built-in adapter used by the binary; it passes
//! code through unchanged and only discovers imports.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use regex::Regex;

use crate::errors::HotdagError;

/// Options handed to the transformer for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOptions {
    /// Source path relative to the base directory, forward slashes.
    pub source_file_name: String,
    pub source_root: String,
    /// Forwarded untouched from `[transform].options`.
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOutput {
    pub code: String,
    pub imported_specifiers: Vec<String>,
}

/// Failure reported by a transformer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformFailure {
    pub message: String,
    pub stack: Option<String>,
}

impl TransformFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn into_error(self, path: &Path) -> HotdagError {
        HotdagError::Transform {
            path: path.to_path_buf(),
            message: self.message,
            stack: self.stack,
        }
    }
}

pub type TransformFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TransformOutput, TransformFailure>> + Send + 'a>>;

/// Source-to-output transform.
///
/// Production code uses [`ImportScanner`]; tests supply fakes that count
/// invocations or fail on demand.
pub trait Transformer: Send + Sync {
    fn transform<'a>(
        &'a self,
        path: &'a Path,
        source: &'a str,
        options: &'a TransformOptions,
    ) -> TransformFuture<'a>;
}

/// Pass-through transformer that discovers import specifiers with a regex.
///
/// Recognises `import x from '..'`, `import '..'`, `export .. from '..'`,
/// `import('..')` and `require('..')`.
#[derive(Debug, Clone)]
pub struct ImportScanner {
    pattern: Regex,
}

const IMPORT_PATTERN: &str = concat!(
    r#"\bimport\s+(?:[\w*$\s{},]+?\s+from\s+)?["']([^"'\n]+)["']"#,
    r#"|\bexport\s+(?:\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from\s+["']([^"'\n]+)["']"#,
    r#"|\bimport\s*\(\s*["']([^"'\n]+)["']\s*\)"#,
    r#"|\brequire\s*\(\s*["']([^"'\n]+)["']\s*\)"#,
);

impl ImportScanner {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(IMPORT_PATTERN)?,
        })
    }

    /// Specifiers in order of first appearance, without duplicates.
    pub fn scan(&self, source: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for caps in self.pattern.captures_iter(source) {
            let Some(m) = caps.iter().skip(1).flatten().next() else {
                continue;
            };
            let spec = m.as_str();
            if !out.iter().any(|s| s == spec) {
                out.push(spec.to_string());
            }
        }
        out
    }
}

impl Transformer for ImportScanner {
    fn transform<'a>(
        &'a self,
        _path: &'a Path,
        source: &'a str,
        _options: &'a TransformOptions,
    ) -> TransformFuture<'a> {
        Box::pin(async move {
            Ok(TransformOutput {
                code: source.to_string(),
                imported_specifiers: self.scan(source),
            })
        })
    }
}
