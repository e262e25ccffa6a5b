//! Frame product specification
//!
//! A `FrameSpec` is owned by the persistence layer and read-only to the
//! pipeline. All lengths are in inches.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cross-sectional shape category of a frame's molding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProfileType {
    #[default]
    Flat,
    Stepped,
    Ornate,
    Float,
    Shadowbox,
    CanvasWrap,
}

impl ProfileType {
    pub const ALL: [ProfileType; 6] = [
        ProfileType::Flat,
        ProfileType::Stepped,
        ProfileType::Ornate,
        ProfileType::Float,
        ProfileType::Shadowbox,
        ProfileType::CanvasWrap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileType::Flat => "flat",
            ProfileType::Stepped => "stepped",
            ProfileType::Ornate => "ornate",
            ProfileType::Float => "float",
            ProfileType::Shadowbox => "shadowbox",
            ProfileType::CanvasWrap => "canvas-wrap",
        }
    }

    /// Parse a profile name. Unknown or empty names fall back to flat.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "stepped" => ProfileType::Stepped,
            "ornate" => ProfileType::Ornate,
            "float" => ProfileType::Float,
            "shadowbox" | "shadow-box" => ProfileType::Shadowbox,
            "canvas-wrap" | "canvaswrap" => ProfileType::CanvasWrap,
            _ => ProfileType::Flat,
        }
    }
}

impl From<String> for ProfileType {
    fn from(s: String) -> Self {
        ProfileType::parse(&s)
    }
}

impl From<ProfileType> for String {
    fn from(p: ProfileType) -> Self {
        p.as_str().to_string()
    }
}

impl fmt::Display for ProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Molding material category
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MaterialCategory {
    #[default]
    Wood,
    Metal,
    Polystyrene,
    Composite,
    Acrylic,
    /// Any category the resolver has no dedicated defaults for
    Other(String),
}

impl MaterialCategory {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "wood" | "hardwood" => MaterialCategory::Wood,
            "metal" | "aluminum" | "aluminium" => MaterialCategory::Metal,
            "polystyrene" | "plastic" => MaterialCategory::Polystyrene,
            "composite" | "mdf" => MaterialCategory::Composite,
            "acrylic" | "lucite" => MaterialCategory::Acrylic,
            other => MaterialCategory::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MaterialCategory::Wood => "wood",
            MaterialCategory::Metal => "metal",
            MaterialCategory::Polystyrene => "polystyrene",
            MaterialCategory::Composite => "composite",
            MaterialCategory::Acrylic => "acrylic",
            MaterialCategory::Other(name) => name,
        }
    }
}

impl From<String> for MaterialCategory {
    fn from(s: String) -> Self {
        MaterialCategory::parse(&s)
    }
}

impl From<MaterialCategory> for String {
    fn from(m: MaterialCategory) -> Self {
        m.as_str().to_string()
    }
}

impl fmt::Display for MaterialCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Declarative description of one framed product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSpec {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub outer_width: f32,
    pub outer_height: f32,
    #[serde(default)]
    pub profile: ProfileType,
    pub molding_width: f32,
    pub molding_depth: f32,
    #[serde(default)]
    pub rabbet_width: Option<f32>,
    #[serde(default)]
    pub rabbet_depth: Option<f32>,
    #[serde(default)]
    pub lip_height: Option<f32>,
    #[serde(default)]
    pub detail_scale: Option<f32>,
    #[serde(default)]
    pub material: MaterialCategory,
    #[serde(default)]
    pub finish: String,
    #[serde(default)]
    pub color: String,
    /// Public URL of the primary (GLB) asset, once generated
    #[serde(default)]
    pub model_url: Option<String>,
    /// Public URL of the secondary (USDZ) asset, once generated
    #[serde(default)]
    pub usdz_url: Option<String>,
    #[serde(default)]
    pub model_size_bytes: Option<u64>,
}

impl FrameSpec {
    /// Minimal spec with the given outer size and molding, flat wood profile
    pub fn new(id: &str, outer_width: f32, outer_height: f32) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            outer_width,
            outer_height,
            profile: ProfileType::Flat,
            molding_width: 1.5,
            molding_depth: 0.75,
            rabbet_width: None,
            rabbet_depth: None,
            lip_height: None,
            detail_scale: None,
            material: MaterialCategory::Wood,
            finish: String::new(),
            color: String::new(),
            model_url: None,
            usdz_url: None,
            model_size_bytes: None,
        }
    }

    /// True when both downloadable artifacts already exist
    pub fn has_models(&self) -> bool {
        let populated = |url: &Option<String>| url.as_deref().is_some_and(|u| !u.trim().is_empty());
        populated(&self.model_url) && populated(&self.usdz_url)
    }

    /// Human-readable label for logs
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parse_fallback() {
        assert_eq!(ProfileType::parse("canvas-wrap"), ProfileType::CanvasWrap);
        assert_eq!(ProfileType::parse("Canvas_Wrap"), ProfileType::CanvasWrap);
        assert_eq!(ProfileType::parse("SHADOWBOX"), ProfileType::Shadowbox);
        assert_eq!(ProfileType::parse("baroque"), ProfileType::Flat);
        assert_eq!(ProfileType::parse(""), ProfileType::Flat);
    }

    #[test]
    fn test_frame_spec_toml_roundtrip() {
        let toml_str = r#"
id = "frame-001"
outer_width = 30.0
outer_height = 40.0
profile = "canvas-wrap"
molding_width = 1.5
molding_depth = 0.75
material = "metal"
finish = "brushed"
color = "silver"
"#;
        let spec: FrameSpec = toml::from_str(toml_str).unwrap();
        assert_eq!(spec.profile, ProfileType::CanvasWrap);
        assert_eq!(spec.material, MaterialCategory::Metal);
        assert!(spec.rabbet_width.is_none());
        assert!(!spec.has_models());

        let out = toml::to_string(&spec).unwrap();
        assert!(out.contains("profile = \"canvas-wrap\""));
    }

    #[test]
    fn test_unknown_profile_deserializes_as_flat() {
        let spec: FrameSpec = toml::from_str(
            r#"
id = "f"
outer_width = 8.0
outer_height = 10.0
profile = "gothic"
molding_width = 1.0
molding_depth = 0.5
"#,
        )
        .unwrap();
        assert_eq!(spec.profile, ProfileType::Flat);
        assert_eq!(spec.material, MaterialCategory::Wood);
    }

    #[test]
    fn test_has_models_requires_both_urls() {
        let mut spec = FrameSpec::new("f", 8.0, 10.0);
        spec.model_url = Some("https://cdn/x.glb".into());
        assert!(!spec.has_models());
        spec.usdz_url = Some("  ".into());
        assert!(!spec.has_models());
        spec.usdz_url = Some("https://cdn/x.usdz".into());
        assert!(spec.has_models());
    }

    #[test]
    fn test_other_material_category() {
        assert_eq!(
            MaterialCategory::parse("bamboo"),
            MaterialCategory::Other("bamboo".into())
        );
        assert_eq!(MaterialCategory::parse("Aluminum"), MaterialCategory::Metal);
    }
}
