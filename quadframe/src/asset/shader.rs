/// Shader inputs: source descriptions, the compiler seam and diagnostics

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::graphics_device::ShaderBytecode;
use crate::qf_error;

const SOURCE: &str = "quadframe::shader";

/// What to compile: file, entry point and target profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub path: PathBuf,
    pub entry_point: String,
    pub target_profile: String,
}

impl ShaderSource {
    /// Vertex stage: `BasicVS`, `vs_5_0`
    pub fn vertex(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), entry_point: "BasicVS".to_string(), target_profile: "vs_5_0".to_string() }
    }

    /// Pixel stage: `BasicPS`, `ps_5_0`
    pub fn pixel(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), entry_point: "BasicPS".to_string(), target_profile: "ps_5_0".to_string() }
    }
}

/// Why a shader produced no byte code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderCompileError {
    FileNotFound(PathBuf),
    /// Compiler rejected the source; the blob holds its diagnostics
    Compilation { path: PathBuf, error_blob: Vec<u8> },
}

impl fmt::Display for ShaderCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderCompileError::FileNotFound(path) => write!(f, "shader file not found: {}", path.display()),
            ShaderCompileError::Compilation { error_blob, .. } => f.write_str(&decode_error_blob(error_blob)),
        }
    }
}

impl std::error::Error for ShaderCompileError {}

/// External shader compiler
pub trait ShaderCompiler {
    fn compile(&self, source: &ShaderSource) -> std::result::Result<Vec<u8>, ShaderCompileError>;
}

/// Loads precompiled byte code (SPIR-V, DXIL) from `source.path`
///
/// The entry point and profile are not checked; the file must already be
/// compiled for them.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpirvFileLoader;

impl ShaderCompiler for SpirvFileLoader {
    fn compile(&self, source: &ShaderSource) -> std::result::Result<Vec<u8>, ShaderCompileError> {
        read_blob(&source.path)
    }
}

fn read_blob(path: &Path) -> std::result::Result<Vec<u8>, ShaderCompileError> {
    std::fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ShaderCompileError::FileNotFound(path.to_path_buf()),
        _ => ShaderCompileError::Compilation {
            path: path.to_path_buf(),
            error_blob: e.to_string().into_bytes(),
        },
    })
}

/// Decode a compiler error blob into log text
///
/// Blobs are NUL-terminated narrow strings; invalid UTF-8 is replaced.
pub fn decode_error_blob(blob: &[u8]) -> String {
    let end = blob.iter().position(|&b| b == 0).unwrap_or(blob.len());
    let mut text = String::from_utf8_lossy(&blob[..end]).into_owned();
    text.push('\n');
    text
}

/// Compile `source`, reporting failures to the log
///
/// Failures are diagnostics, not errors: the returned byte code is empty
/// and pipeline creation rejects it later.
pub fn compile_shader(compiler: &dyn ShaderCompiler, source: &ShaderSource) -> ShaderBytecode {
    match compiler.compile(source) {
        Ok(code) => ShaderBytecode::new(code, source.entry_point.clone()),
        Err(e) => {
            qf_error!(SOURCE, "{} ({}, {})", e.to_string().trim_end(), source.entry_point, source.target_profile);
            ShaderBytecode::new(Vec::new(), source.entry_point.clone())
        }
    }
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
