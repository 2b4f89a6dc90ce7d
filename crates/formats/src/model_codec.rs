//! `QMSH`: compressed scene-graph model format.
//!
//! Layout (little-endian):
//! - header: magic, `u16` version, `u16` flags, `u8` position quantization bits
//! - material table
//! - node tree in pre-order; mesh nodes carry a geometry block
//!
//! Geometry positions are quantized against the block's bounding box, delta
//! coded against the previous vertex and stored as zigzag varints. Indices
//! are delta coded the same way.

use std::io::{Read, Write};

use scene::components::{
    Geometry, Material, Texture, TextureFilter, TextureMap, TextureSlot, Transform,
};
use scene::node::{Mesh, NodeKind, SceneNode};

use foundation::math::Vec3;

use crate::wire::*;

pub const MAGIC: [u8; 4] = *b"QMSH";
pub const VERSION_V1: u16 = 1;
pub const VERSION_LATEST: u16 = VERSION_V1;

pub const MIN_QUANTIZATION_BITS: u8 = 8;
pub const MAX_QUANTIZATION_BITS: u8 = 16;
pub const DEFAULT_QUANTIZATION_BITS: u8 = 14;

const MAX_NODE_DEPTH: usize = 64;

const NODE_GROUP: u8 = 0;
const NODE_MESH: u8 = 1;

const SHADOW_CAST: u8 = 1 << 0;
const SHADOW_RECEIVE: u8 = 1 << 1;

const ATTR_NORMALS: u8 = 1 << 0;
const ATTR_UVS: u8 = 1 << 1;

#[derive(Debug)]
pub enum DecodeError {
    UnexpectedEof,
    Io { source: String },
    InvalidMagic,
    UnsupportedVersion { found: u16 },
    InvalidVarint,
    InvalidUtf8,
    InvalidQuantizationBits { found: u8 },
    InvalidGeometry { reason: String },
    InvalidTexture { reason: String },
    UnknownNodeKind { found: u8 },
    MaterialIndexOutOfRange { index: usize, count: usize },
    NestingTooDeep { limit: usize },
    DecoderNotConfigured,
    IncompatibleDecoderModule { reason: String },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::UnexpectedEof => write!(f, "unexpected EOF"),
            DecodeError::Io { source } => write!(f, "I/O error: {source}"),
            DecodeError::InvalidMagic => write!(f, "invalid QMSH magic"),
            DecodeError::UnsupportedVersion { found } => {
                write!(f, "unsupported QMSH version: {found}")
            }
            DecodeError::InvalidVarint => write!(f, "invalid varint"),
            DecodeError::InvalidUtf8 => write!(f, "invalid utf-8"),
            DecodeError::InvalidQuantizationBits { found } => {
                write!(f, "invalid quantization bits: {found}")
            }
            DecodeError::InvalidGeometry { reason } => write!(f, "invalid geometry: {reason}"),
            DecodeError::InvalidTexture { reason } => write!(f, "invalid texture: {reason}"),
            DecodeError::UnknownNodeKind { found } => write!(f, "unknown node kind: {found}"),
            DecodeError::MaterialIndexOutOfRange { index, count } => {
                write!(f, "material index {index} out of range ({count} materials)")
            }
            DecodeError::NestingTooDeep { limit } => {
                write!(f, "node nesting deeper than {limit}")
            }
            DecodeError::DecoderNotConfigured => write!(f, "decoder module not configured"),
            DecodeError::IncompatibleDecoderModule { reason } => {
                write!(f, "incompatible decoder module: {reason}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

#[derive(Debug)]
pub enum EncodeError {
    Io { source: String },
    InvalidQuantizationBits { found: u8 },
    InvalidGeometry { node: String, reason: String },
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::Io { source } => write!(f, "I/O error: {source}"),
            EncodeError::InvalidQuantizationBits { found } => {
                write!(f, "quantization bits must be 8..=16, got {found}")
            }
            EncodeError::InvalidGeometry { node, reason } => {
                write!(f, "invalid geometry in node {node:?}: {reason}")
            }
        }
    }
}

impl std::error::Error for EncodeError {}

impl From<std::io::Error> for EncodeError {
    fn from(e: std::io::Error) -> Self {
        EncodeError::Io {
            source: e.to_string(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ModelHeader {
    pub version: u16,
    pub flags: u16,
    pub quantization_bits: u8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EncodeOptions {
    pub quantization_bits: u8,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quantization_bits: DEFAULT_QUANTIZATION_BITS,
        }
    }
}

pub fn encode_model(root: &SceneNode, options: EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    let mut out: Vec<u8> = Vec::new();
    encode_model_to_writer(root, options, &mut out)?;
    Ok(out)
}

pub fn encode_model_to_writer<W: Write>(
    root: &SceneNode,
    options: EncodeOptions,
    w: &mut W,
) -> Result<(), EncodeError> {
    let bits = options.quantization_bits;
    if !(MIN_QUANTIZATION_BITS..=MAX_QUANTIZATION_BITS).contains(&bits) {
        return Err(EncodeError::InvalidQuantizationBits { found: bits });
    }

    w.write_all(&MAGIC)?;
    write_u16_le(w, VERSION_LATEST)?;
    // flags (reserved)
    write_u16_le(w, 0)?;
    write_u8(w, bits)?;

    // Identical materials are stored once and shared by index.
    let mut materials: Vec<&Material> = Vec::new();
    for mesh in root.meshes() {
        if !materials.contains(&&mesh.material) {
            materials.push(&mesh.material);
        }
    }

    write_var_u64(w, materials.len() as u64)?;
    for material in &materials {
        write_material(w, material)?;
    }

    write_node(w, root, &materials, bits)
}

fn write_material(w: &mut impl Write, material: &Material) -> Result<(), EncodeError> {
    write_string(w, &material.name)?;
    for c in material.base_color {
        write_f32_le(w, c)?;
    }
    write_f32_le(w, material.metallic)?;
    write_f32_le(w, material.roughness)?;
    write_var_u64(w, material.maps.len() as u64)?;
    for map in &material.maps {
        let tex = &map.texture;
        write_u8(w, map.slot.code())?;
        write_string(w, &tex.name)?;
        write_u32_le(w, tex.width)?;
        write_u32_le(w, tex.height)?;
        write_u8(w, tex.generate_mipmaps as u8)?;
        write_u8(w, tex.min_filter.code())?;
        write_u8(w, tex.mag_filter.code())?;
        write_var_u64(w, tex.rgba.len() as u64)?;
        w.write_all(&tex.rgba)?;
    }
    Ok(())
}

fn write_node(
    w: &mut impl Write,
    node: &SceneNode,
    materials: &[&Material],
    bits: u8,
) -> Result<(), EncodeError> {
    write_string(w, &node.name)?;
    match &node.kind {
        NodeKind::Group => write_u8(w, NODE_GROUP)?,
        NodeKind::Mesh(_) => write_u8(w, NODE_MESH)?,
    }
    write_f32x3(w, node.transform.position.to_f32())?;
    write_f32x3(w, node.transform.rotation.to_f32())?;
    write_f32x3(w, node.transform.scale.to_f32())?;

    if let NodeKind::Mesh(mesh) = &node.kind {
        let material_index = materials
            .iter()
            .position(|m| *m == &mesh.material)
            .unwrap_or_default();
        write_var_u64(w, material_index as u64)?;

        let mut shadow = 0u8;
        if mesh.cast_shadow {
            shadow |= SHADOW_CAST;
        }
        if mesh.receive_shadow {
            shadow |= SHADOW_RECEIVE;
        }
        write_u8(w, shadow)?;

        write_geometry(w, &mesh.geometry, bits).map_err(|e| match e {
            GeometryWriteError::Io(e) => EncodeError::from(e),
            GeometryWriteError::Invalid(reason) => EncodeError::InvalidGeometry {
                node: node.name.clone(),
                reason,
            },
        })?;
    }

    write_var_u64(w, node.children.len() as u64)?;
    for child in &node.children {
        write_node(w, child, materials, bits)?;
    }
    Ok(())
}

enum GeometryWriteError {
    Io(std::io::Error),
    Invalid(String),
}

impl From<std::io::Error> for GeometryWriteError {
    fn from(e: std::io::Error) -> Self {
        GeometryWriteError::Io(e)
    }
}

fn write_geometry(w: &mut impl Write, g: &Geometry, bits: u8) -> Result<(), GeometryWriteError> {
    let vertex_count = g.positions.len();
    if let Some(normals) = &g.normals
        && normals.len() != vertex_count
    {
        return Err(GeometryWriteError::Invalid(format!(
            "{} normals for {vertex_count} vertices",
            normals.len()
        )));
    }
    if let Some(uvs) = &g.uvs
        && uvs.len() != vertex_count
    {
        return Err(GeometryWriteError::Invalid(format!(
            "{} uvs for {vertex_count} vertices",
            uvs.len()
        )));
    }
    if g.indices.len() % 3 != 0 {
        return Err(GeometryWriteError::Invalid(format!(
            "index count {} is not a multiple of 3",
            g.indices.len()
        )));
    }
    if let Some(bad) = g.indices.iter().find(|i| **i as usize >= vertex_count) {
        return Err(GeometryWriteError::Invalid(format!(
            "index {bad} out of range for {vertex_count} vertices"
        )));
    }

    write_var_u64(w, vertex_count as u64)?;

    let (min, max) = position_range(&g.positions);
    write_f32x3(w, min)?;
    write_f32x3(w, max)?;

    let max_q = max_quantized(bits);
    let mut prev = [0i64; 3];
    for p in &g.positions {
        for axis in 0..3 {
            let q = quantize(p[axis], min[axis], max[axis], max_q);
            write_var_u64(w, zigzag(q - prev[axis]))?;
            prev[axis] = q;
        }
    }

    let mut attrs = 0u8;
    if g.normals.is_some() {
        attrs |= ATTR_NORMALS;
    }
    if g.uvs.is_some() {
        attrs |= ATTR_UVS;
    }
    write_u8(w, attrs)?;

    if let Some(normals) = &g.normals {
        for n in normals {
            for c in n {
                write_i16_le(w, (c.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)?;
            }
        }
    }

    if let Some(uvs) = &g.uvs {
        let mut prev = [0i64; 2];
        for uv in uvs {
            for axis in 0..2 {
                let q = (uv[axis].clamp(0.0, 1.0) * u16::MAX as f32).round() as i64;
                write_var_u64(w, zigzag(q - prev[axis]))?;
                prev[axis] = q;
            }
        }
    }

    write_var_u64(w, g.indices.len() as u64)?;
    let mut prev = 0i64;
    for i in &g.indices {
        let i = *i as i64;
        write_var_u64(w, zigzag(i - prev))?;
        prev = i;
    }
    Ok(())
}

fn position_range(positions: &[[f32; 3]]) -> ([f32; 3], [f32; 3]) {
    if positions.is_empty() {
        return ([0.0; 3], [0.0; 3]);
    }
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for p in positions {
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }
    (min, max)
}

fn max_quantized(bits: u8) -> i64 {
    (1i64 << bits) - 1
}

fn quantize(v: f32, min: f32, max: f32, max_q: i64) -> i64 {
    let extent = (max - min) as f64;
    if extent <= 0.0 {
        return 0;
    }
    let t = ((v - min) as f64 / extent).clamp(0.0, 1.0);
    (t * max_q as f64).round() as i64
}

fn dequantize(q: i64, min: f32, max: f32, max_q: i64) -> f32 {
    let extent = (max - min) as f64;
    (min as f64 + (q as f64 / max_q as f64) * extent) as f32
}

/// Decode a complete model without decoder-module checks.
pub fn decode_model(bytes: &[u8]) -> Result<(ModelHeader, SceneNode), DecodeError> {
    let mut cursor = std::io::Cursor::new(bytes);
    decode_model_from_reader(&mut cursor)
}

pub fn decode_model_from_reader<R: Read>(
    r: &mut R,
) -> Result<(ModelHeader, SceneNode), DecodeError> {
    let header = read_header(r)?;
    let root = read_body(r, &header)?;
    Ok((header, root))
}

pub fn read_header<R: Read>(r: &mut R) -> Result<ModelHeader, DecodeError> {
    let magic = read_exact_io::<4>(r)?;
    if magic != MAGIC {
        return Err(DecodeError::InvalidMagic);
    }

    let version = read_u16_le_io(r)?;
    if version != VERSION_V1 {
        return Err(DecodeError::UnsupportedVersion { found: version });
    }

    let flags = read_u16_le_io(r)?;
    let quantization_bits = read_u8_io(r)?;
    if !(MIN_QUANTIZATION_BITS..=MAX_QUANTIZATION_BITS).contains(&quantization_bits) {
        return Err(DecodeError::InvalidQuantizationBits {
            found: quantization_bits,
        });
    }

    Ok(ModelHeader {
        version,
        flags,
        quantization_bits,
    })
}

/// Decode everything after the header: material table, then the node tree.
pub fn read_body<R: Read>(r: &mut R, header: &ModelHeader) -> Result<SceneNode, DecodeError> {
    let material_count = read_var_usize_io(r)?;
    let mut materials = Vec::with_capacity(material_count.min(1024));
    for _ in 0..material_count {
        materials.push(read_material(r)?);
    }

    read_node(r, &materials, header.quantization_bits, 0)
}

fn read_material(r: &mut impl Read) -> Result<Material, DecodeError> {
    let name = read_string_io(r)?;
    let base_color = [
        read_f32_le_io(r)?,
        read_f32_le_io(r)?,
        read_f32_le_io(r)?,
        read_f32_le_io(r)?,
    ];
    let metallic = read_f32_le_io(r)?;
    let roughness = read_f32_le_io(r)?;

    let map_count = read_var_usize_io(r)?;
    let mut maps = Vec::with_capacity(map_count.min(TextureSlot::ALL.len()));
    for _ in 0..map_count {
        let slot_code = read_u8_io(r)?;
        let slot = TextureSlot::from_code(slot_code).ok_or_else(|| DecodeError::InvalidTexture {
            reason: format!("unknown slot {slot_code}"),
        })?;
        let tex_name = read_string_io(r)?;
        let width = read_u32_le_io(r)?;
        let height = read_u32_le_io(r)?;
        let generate_mipmaps = read_u8_io(r)? != 0;
        let min_filter = read_filter(r)?;
        let mag_filter = read_filter(r)?;
        let len = read_var_usize_io(r)?;
        let rgba = read_exact_io_dyn(r, len)?;

        let texture = Texture {
            name: tex_name,
            width,
            height,
            generate_mipmaps,
            min_filter,
            mag_filter,
            rgba,
        };
        if texture.expected_len() != Some(texture.rgba.len()) {
            return Err(DecodeError::InvalidTexture {
                reason: format!(
                    "{}x{} texture {:?} has {} bytes",
                    width,
                    height,
                    texture.name,
                    texture.rgba.len()
                ),
            });
        }
        maps.push(TextureMap { slot, texture });
    }

    Ok(Material {
        name,
        base_color,
        metallic,
        roughness,
        maps,
    })
}

fn read_filter(r: &mut impl Read) -> Result<TextureFilter, DecodeError> {
    let code = read_u8_io(r)?;
    TextureFilter::from_code(code).ok_or_else(|| DecodeError::InvalidTexture {
        reason: format!("unknown filter {code}"),
    })
}

fn read_node(
    r: &mut impl Read,
    materials: &[Material],
    bits: u8,
    depth: usize,
) -> Result<SceneNode, DecodeError> {
    if depth >= MAX_NODE_DEPTH {
        return Err(DecodeError::NestingTooDeep {
            limit: MAX_NODE_DEPTH,
        });
    }

    let name = read_string_io(r)?;
    let kind_code = read_u8_io(r)?;
    if kind_code != NODE_GROUP && kind_code != NODE_MESH {
        return Err(DecodeError::UnknownNodeKind { found: kind_code });
    }
    let transform = Transform {
        position: Vec3::from_f32(read_f32x3_io(r)?),
        rotation: Vec3::from_f32(read_f32x3_io(r)?),
        scale: Vec3::from_f32(read_f32x3_io(r)?),
    };

    let kind = match kind_code {
        NODE_GROUP => NodeKind::Group,
        NODE_MESH => {
            let index = read_var_usize_io(r)?;
            let material = materials
                .get(index)
                .cloned()
                .ok_or(DecodeError::MaterialIndexOutOfRange {
                    index,
                    count: materials.len(),
                })?;
            let shadow = read_u8_io(r)?;
            let geometry = read_geometry(r, bits)?;
            NodeKind::Mesh(Mesh {
                geometry,
                material,
                cast_shadow: shadow & SHADOW_CAST != 0,
                receive_shadow: shadow & SHADOW_RECEIVE != 0,
            })
        }
        _ => NodeKind::Group,
    };

    let child_count = read_var_usize_io(r)?;
    let mut children = Vec::with_capacity(child_count.min(1024));
    for _ in 0..child_count {
        children.push(read_node(r, materials, bits, depth + 1)?);
    }

    Ok(SceneNode {
        name,
        transform,
        kind,
        children,
    })
}

fn apply_delta(prev: i64, encoded: u64) -> Result<i64, DecodeError> {
    let delta = unzigzag(encoded);
    prev.checked_add(delta).ok_or_else(|| DecodeError::InvalidGeometry {
        reason: format!("delta {delta} overflows from {prev}"),
    })
}

fn read_geometry(r: &mut impl Read, bits: u8) -> Result<Geometry, DecodeError> {
    let vertex_count = read_var_usize_io(r)?;
    let min = read_f32x3_io(r)?;
    let max = read_f32x3_io(r)?;
    let max_q = max_quantized(bits);

    let cap = vertex_count.min(1 << 16);
    let mut positions = Vec::with_capacity(cap);
    let mut prev = [0i64; 3];
    for _ in 0..vertex_count {
        let mut p = [0f32; 3];
        for axis in 0..3 {
            let q = apply_delta(prev[axis], read_var_u64_io(r)?)?;
            if !(0..=max_q).contains(&q) {
                return Err(DecodeError::InvalidGeometry {
                    reason: format!("quantized position {q} outside 0..={max_q}"),
                });
            }
            p[axis] = dequantize(q, min[axis], max[axis], max_q);
            prev[axis] = q;
        }
        positions.push(p);
    }

    let attrs = read_u8_io(r)?;

    let normals = if attrs & ATTR_NORMALS != 0 {
        let mut normals = Vec::with_capacity(cap);
        for _ in 0..vertex_count {
            let mut n = [0f32; 3];
            for c in &mut n {
                *c = (read_i16_le_io(r)? as f32 / i16::MAX as f32).max(-1.0);
            }
            normals.push(n);
        }
        Some(normals)
    } else {
        None
    };

    let uvs = if attrs & ATTR_UVS != 0 {
        let mut uvs = Vec::with_capacity(cap);
        let mut prev = [0i64; 2];
        for _ in 0..vertex_count {
            let mut uv = [0f32; 2];
            for axis in 0..2 {
                let q = apply_delta(prev[axis], read_var_u64_io(r)?)?;
                if !(0..=u16::MAX as i64).contains(&q) {
                    return Err(DecodeError::InvalidGeometry {
                        reason: format!("uv value {q} out of range"),
                    });
                }
                uv[axis] = q as f32 / u16::MAX as f32;
                prev[axis] = q;
            }
            uvs.push(uv);
        }
        Some(uvs)
    } else {
        None
    };

    let index_count = read_var_usize_io(r)?;
    if index_count % 3 != 0 {
        return Err(DecodeError::InvalidGeometry {
            reason: format!("index count {index_count} is not a multiple of 3"),
        });
    }
    let mut indices = Vec::with_capacity(index_count.min(3 << 16));
    let mut prev = 0i64;
    for _ in 0..index_count {
        let i = apply_delta(prev, read_var_u64_io(r)?)?;
        if i < 0 || i as u64 >= vertex_count as u64 {
            return Err(DecodeError::InvalidGeometry {
                reason: format!("index {i} out of range for {vertex_count} vertices"),
            });
        }
        indices.push(i as u32);
        prev = i;
    }

    Ok(Geometry {
        positions,
        normals,
        uvs,
        indices,
        bounding_box: None,
        bounding_sphere: None,
    })
}
