//! File-level operations behind the `modelpack` binary.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use formats::{
    DecodeError, DecoderModule, EncodeError, EncodeOptions, SceneDescError, SceneDescription,
    decode_model, encode_model,
};
use serde::Serialize;
use tracing::info;

#[derive(Debug)]
pub enum ToolError {
    Io { path: PathBuf, source: std::io::Error },
    SceneDesc { path: PathBuf, source: SceneDescError },
    Encode(EncodeError),
    Decode { path: PathBuf, source: DecodeError },
    Json(serde_json::Error),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::Io { path, source } => write!(f, "{}: {source}", path.display()),
            ToolError::SceneDesc { path, source } => write!(f, "{}: {source}", path.display()),
            ToolError::Encode(err) => write!(f, "encode failed: {err}"),
            ToolError::Decode { path, source } => write!(f, "{}: {source}", path.display()),
            ToolError::Json(err) => write!(f, "json: {err}"),
        }
    }
}

impl std::error::Error for ToolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ToolError::Io { source, .. } => Some(source),
            ToolError::SceneDesc { source, .. } => Some(source),
            ToolError::Encode(err) => Some(err),
            ToolError::Decode { source, .. } => Some(source),
            ToolError::Json(err) => Some(err),
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>, ToolError> {
    fs::read(path).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, bytes: &[u8]) -> Result<(), ToolError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ToolError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, bytes).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// What `inspect` reports about a packed model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub byte_len: usize,
    pub content_hash: String,
    pub version: u16,
    pub quantization_bits: u8,
    pub node_count: usize,
    pub mesh_count: usize,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub texture_maps: usize,
}

impl ModelSummary {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (header, root) = decode_model(bytes)?;
        let meshes = || root.meshes();
        Ok(Self {
            byte_len: bytes.len(),
            content_hash: blake3::hash(bytes).to_hex().to_string(),
            version: header.version,
            quantization_bits: header.quantization_bits,
            node_count: root.node_count(),
            mesh_count: root.mesh_count(),
            vertex_count: meshes().map(|m| m.geometry.vertex_count()).sum(),
            triangle_count: meshes().map(|m| m.geometry.triangle_count()).sum(),
            texture_maps: meshes().map(|m| m.material.maps.len()).sum(),
        })
    }
}

/// Pack a JSON scene description into a binary model.
pub fn encode_file(
    input: &Path,
    output: &Path,
    quantization_bits: Option<u8>,
) -> Result<ModelSummary, ToolError> {
    let text = fs::read_to_string(input).map_err(|source| ToolError::Io {
        path: input.to_path_buf(),
        source,
    })?;
    let scene = SceneDescription::from_json_str(&text)
        .and_then(|desc| desc.to_scene())
        .map_err(|source| ToolError::SceneDesc {
            path: input.to_path_buf(),
            source,
        })?;

    let mut options = EncodeOptions::default();
    if let Some(bits) = quantization_bits {
        options.quantization_bits = bits;
    }
    let bytes = encode_model(&scene, options).map_err(ToolError::Encode)?;
    write(output, &bytes)?;

    let summary = ModelSummary::from_bytes(&bytes).map_err(|source| ToolError::Decode {
        path: output.to_path_buf(),
        source,
    })?;
    info!(
        output = %output.display(),
        bytes = summary.byte_len,
        meshes = summary.mesh_count,
        hash = %summary.content_hash,
        "model packed"
    );
    Ok(summary)
}

pub fn inspect_file(path: &Path) -> Result<ModelSummary, ToolError> {
    let bytes = read(path)?;
    ModelSummary::from_bytes(&bytes).map_err(|source| ToolError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the decoder module manifest served next to the models.
pub fn write_decoder_module(output: &Path) -> Result<DecoderModule, ToolError> {
    let module = DecoderModule::current();
    let payload = module.to_json_pretty().map_err(ToolError::Json)?;
    write(output, payload.as_bytes())?;
    info!(output = %output.display(), codec = %module.codec, "decoder module written");
    Ok(module)
}
