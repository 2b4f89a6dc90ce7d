//! JSON authoring format consumed by the model packer.

use std::fmt;

use base64::Engine as _;
use foundation::math::Vec3;
use scene::components::{
    Geometry, Material, Texture, TextureFilter, TextureMap, TextureSlot, Transform,
};
use scene::node::{Mesh, NodeKind, SceneNode};
use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum SceneDescError {
    Parse(serde_json::Error),
    MaterialIndexOutOfRange { node: String, index: usize },
    InvalidBase64 { texture: String },
}

impl fmt::Display for SceneDescError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneDescError::Parse(err) => write!(f, "scene description parse error: {err}"),
            SceneDescError::MaterialIndexOutOfRange { node, index } => {
                write!(f, "node {node:?} references missing material {index}")
            }
            SceneDescError::InvalidBase64 { texture } => {
                write!(f, "texture {texture:?} has invalid base64 pixel data")
            }
        }
    }
}

impl std::error::Error for SceneDescError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SceneDescError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SceneDescription {
    #[serde(default)]
    pub materials: Vec<MaterialDesc>,
    pub root: NodeDesc,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialDesc {
    pub name: String,
    #[serde(default = "default_base_color")]
    pub base_color: [f32; 4],
    #[serde(default)]
    pub metallic: f32,
    #[serde(default = "default_roughness")]
    pub roughness: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maps: Vec<TextureMapDesc>,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotDesc {
    BaseColor,
    Normal,
    MetallicRoughness,
    Emissive,
    Occlusion,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilterDesc {
    Nearest,
    Linear,
    LinearMipmapLinear,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextureMapDesc {
    pub slot: SlotDesc,
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// RGBA8 pixels, row-major, standard base64.
    pub rgba_base64: String,
    #[serde(default = "default_true")]
    pub generate_mipmaps: bool,
    #[serde(default = "default_min_filter")]
    pub min_filter: FilterDesc,
    #[serde(default = "default_mag_filter")]
    pub mag_filter: FilterDesc,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeDesc {
    pub name: String,
    #[serde(default)]
    pub translation: [f64; 3],
    #[serde(default)]
    pub rotation: [f64; 3],
    #[serde(default = "default_scale")]
    pub scale: [f64; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<MeshDesc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDesc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeshDesc {
    pub material: usize,
    pub positions: Vec<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normals: Option<Vec<[f32; 3]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uvs: Option<Vec<[f32; 2]>>,
    pub indices: Vec<u32>,
    #[serde(default)]
    pub cast_shadow: bool,
    #[serde(default)]
    pub receive_shadow: bool,
}

fn default_base_color() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

fn default_roughness() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_min_filter() -> FilterDesc {
    FilterDesc::LinearMipmapLinear
}

fn default_mag_filter() -> FilterDesc {
    FilterDesc::Linear
}

fn default_scale() -> [f64; 3] {
    [1.0, 1.0, 1.0]
}

impl From<SlotDesc> for TextureSlot {
    fn from(s: SlotDesc) -> Self {
        match s {
            SlotDesc::BaseColor => TextureSlot::BaseColor,
            SlotDesc::Normal => TextureSlot::Normal,
            SlotDesc::MetallicRoughness => TextureSlot::MetallicRoughness,
            SlotDesc::Emissive => TextureSlot::Emissive,
            SlotDesc::Occlusion => TextureSlot::Occlusion,
        }
    }
}

impl From<FilterDesc> for TextureFilter {
    fn from(f: FilterDesc) -> Self {
        match f {
            FilterDesc::Nearest => TextureFilter::Nearest,
            FilterDesc::Linear => TextureFilter::Linear,
            FilterDesc::LinearMipmapLinear => TextureFilter::LinearMipmapLinear,
        }
    }
}

impl SceneDescription {
    pub fn from_json_str(payload: &str) -> Result<Self, SceneDescError> {
        serde_json::from_str(payload).map_err(SceneDescError::Parse)
    }

    /// Build the scene graph the packer encodes.
    pub fn to_scene(&self) -> Result<SceneNode, SceneDescError> {
        let materials = self
            .materials
            .iter()
            .map(MaterialDesc::to_material)
            .collect::<Result<Vec<_>, _>>()?;
        build_node(&self.root, &materials)
    }
}

impl MaterialDesc {
    fn to_material(&self) -> Result<Material, SceneDescError> {
        let maps = self
            .maps
            .iter()
            .map(|m| {
                let rgba = base64::engine::general_purpose::STANDARD
                    .decode(&m.rgba_base64)
                    .map_err(|_| SceneDescError::InvalidBase64 {
                        texture: m.name.clone(),
                    })?;
                Ok(TextureMap {
                    slot: m.slot.into(),
                    texture: Texture {
                        name: m.name.clone(),
                        width: m.width,
                        height: m.height,
                        generate_mipmaps: m.generate_mipmaps,
                        min_filter: m.min_filter.into(),
                        mag_filter: m.mag_filter.into(),
                        rgba,
                    },
                })
            })
            .collect::<Result<Vec<_>, SceneDescError>>()?;

        Ok(Material {
            name: self.name.clone(),
            base_color: self.base_color,
            metallic: self.metallic,
            roughness: self.roughness,
            maps,
        })
    }
}

fn build_node(desc: &NodeDesc, materials: &[Material]) -> Result<SceneNode, SceneDescError> {
    let kind = match &desc.mesh {
        None => NodeKind::Group,
        Some(mesh) => {
            let material = materials.get(mesh.material).cloned().ok_or_else(|| {
                SceneDescError::MaterialIndexOutOfRange {
                    node: desc.name.clone(),
                    index: mesh.material,
                }
            })?;
            let mut geometry = Geometry::new(mesh.positions.clone(), mesh.indices.clone());
            geometry.normals = mesh.normals.clone();
            geometry.uvs = mesh.uvs.clone();
            NodeKind::Mesh(Mesh {
                geometry,
                material,
                cast_shadow: mesh.cast_shadow,
                receive_shadow: mesh.receive_shadow,
            })
        }
    };

    let [tx, ty, tz] = desc.translation;
    let [rx, ry, rz] = desc.rotation;
    let [sx, sy, sz] = desc.scale;

    Ok(SceneNode {
        name: desc.name.clone(),
        transform: Transform {
            position: Vec3::new(tx, ty, tz),
            rotation: Vec3::new(rx, ry, rz),
            scale: Vec3::new(sx, sy, sz),
        },
        kind,
        children: desc
            .children
            .iter()
            .map(|c| build_node(c, materials))
            .collect::<Result<Vec<_>, _>>()?,
    })
}
