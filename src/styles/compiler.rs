//! The style compile step and its cache key.

use std::fmt;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::Mode;
use crate::styles::scss;

/// Errors raised while producing CSS.
#[derive(Debug, Error)]
pub enum StyleError {
    #[error("style compilation failed in {source_name} at line {line}: {message}")]
    Compilation {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("failed to read style file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-call compile switches.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Prefix each rule with a `/* line N, source */` comment.
    pub line_comments: bool,
    /// Name used in error messages and line comments.
    pub source_name: String,
}

/// Turns SCSS-like text into plain CSS.
///
/// Implementations must be pure: the same input and options always produce
/// the same output. The cache relies on this.
pub trait StyleCompiler: Send + Sync + fmt::Debug {
    fn compile(&self, source: &str, options: &CompileOptions) -> Result<String, StyleError>;
}

/// The built-in SCSS-subset compiler.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScssCompiler;

impl StyleCompiler for ScssCompiler {
    fn compile(&self, source: &str, options: &CompileOptions) -> Result<String, StyleError> {
        let output = scss::Output {
            line_comments: options
                .line_comments
                .then_some(options.source_name.as_str()),
        };
        scss::compile(source, &output).map_err(|e| StyleError::Compilation {
            source_name: options.source_name.clone(),
            line: e.line,
            message: e.message,
        })
    }
}

/// Cache validity hash over prelude, style text and mode.
pub fn checksum(prelude: &str, body: &str, mode: Mode) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prelude.as_bytes());
    hasher.update([0u8]);
    hasher.update(body.as_bytes());
    hasher.update([0u8]);
    hasher.update(mode.as_str().as_bytes());
    hex::encode(hasher.finalize())
}
