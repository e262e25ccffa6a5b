//! Material resolution: category, finish and color name to PBR parameters

use framegen_core::{Color, FrameSpec, MaterialCategory};
use serde::{Deserialize, Serialize};

/// Linear-space PBR parameters for one material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialDescriptor {
    pub name: String,
    /// Linear RGBA
    pub base_color: [f32; 4],
    pub roughness: f32,
    pub metallic: f32,
}

impl MaterialDescriptor {
    pub fn is_transparent(&self) -> bool {
        self.base_color[3] < 1.0
    }

    /// glTF alpha mode for this material
    pub fn alpha_mode(&self) -> &'static str {
        if self.is_transparent() {
            "BLEND"
        } else {
            "OPAQUE"
        }
    }
}

impl Default for MaterialDescriptor {
    fn default() -> Self {
        resolve(&MaterialCategory::Wood, "", "")
    }
}

/// sRGB value used for unrecognized color names
pub const NEUTRAL_BROWN: u32 = 0x8B6B4A;

const ACRYLIC_ALPHA: f32 = 0.35;

// Keep sorted by name; looked up with a binary search
const COLOR_TABLE: &[(&str, u32)] = &[
    ("antique-gold", 0xB8923A),
    ("black", 0x1C1C1C),
    ("bronze", 0x8C6A3F),
    ("cherry", 0x7B3F2A),
    ("chrome", 0xD8D8DC),
    ("clear", 0xF4F7F8),
    ("copper", 0xB26A45),
    ("dark-walnut", 0x3E2A1E),
    ("ebony", 0x2A2320),
    ("espresso", 0x3B2A22),
    ("gold", 0xC9A44C),
    ("gray", 0x808080),
    ("grey", 0x808080),
    ("mahogany", 0x6A2E1F),
    ("maple", 0xD8B985),
    ("natural", 0xC8A27A),
    ("navy", 0x1F2A44),
    ("oak", 0xB38B59),
    ("pewter", 0x8E9194),
    ("pine", 0xDDBB88),
    ("red", 0x9E2A2B),
    ("rose-gold", 0xC7907A),
    ("silver", 0xC0C0C4),
    ("walnut", 0x5C4033),
    ("white", 0xF2F0EB),
];

/// Lowercase and collapse separators so "Dark Walnut", "dark_walnut" and
/// "dark-walnut" resolve alike
pub fn normalize_color_name(name: &str) -> String {
    name.split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(|part| part.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

/// Look up a named color, returning its sRGB hex value
pub fn lookup_color(name: &str) -> Option<u32> {
    let key = normalize_color_name(name);
    COLOR_TABLE
        .binary_search_by(|(entry, _)| entry.cmp(&key.as_str()))
        .ok()
        .map(|i| COLOR_TABLE[i].1)
}

/// Base roughness and metallic for a category
fn category_defaults(category: &MaterialCategory) -> (f32, f32) {
    match category {
        MaterialCategory::Wood => (0.65, 0.0),
        MaterialCategory::Metal => (0.35, 0.9),
        MaterialCategory::Polystyrene => (0.5, 0.0),
        MaterialCategory::Composite => (0.6, 0.0),
        MaterialCategory::Acrylic => (0.05, 0.0),
        MaterialCategory::Other(_) => (0.6, 0.0),
    }
}

/// Resolve PBR parameters. Deterministic, no I/O.
pub fn resolve(category: &MaterialCategory, finish: &str, color: &str) -> MaterialDescriptor {
    let (mut roughness, mut metallic) = category_defaults(category);
    let is_metal = matches!(category, MaterialCategory::Metal);
    let finish_lc = finish.to_ascii_lowercase();
    let has = |keyword: &str| finish_lc.contains(keyword);

    if has("brushed") {
        if is_metal {
            roughness = 0.3;
            metallic = 0.95;
        } else {
            roughness += 0.05;
        }
    }
    if has("matte") || has("flat") {
        roughness = roughness.max(0.8);
    }
    if has("satin") {
        roughness = 0.45;
    }
    if has("gloss") || has("lacquer") || has("polished") {
        roughness = (roughness - 0.35).max(0.08);
    }
    if has("distressed") || has("rustic") || has("weathered") {
        roughness += 0.2;
    }
    if has("antique") && is_metal {
        roughness += 0.15;
        metallic -= 0.2;
    }

    let srgb = lookup_color(color).unwrap_or(NEUTRAL_BROWN);
    let mut base = Color::from_srgb_hex(srgb);
    if matches!(category, MaterialCategory::Acrylic) {
        base = base.with_alpha(ACRYLIC_ALPHA);
    }

    let color_key = normalize_color_name(color);
    let finish_key = normalize_color_name(finish);
    let mut name = category.as_str().to_string();
    for part in [finish_key, color_key] {
        if !part.is_empty() {
            name.push('_');
            name.push_str(&part);
        }
    }

    MaterialDescriptor {
        name,
        base_color: base.to_array(),
        roughness: roughness.clamp(0.0, 1.0),
        metallic: metallic.clamp(0.0, 1.0),
    }
}

/// Resolve the material for a frame spec
pub fn resolve_spec(spec: &FrameSpec) -> MaterialDescriptor {
    resolve(&spec.material, &spec.finish, &spec.color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_table_is_sorted() {
        assert!(COLOR_TABLE.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_color_name_normalization() {
        assert_eq!(normalize_color_name("  Dark_Walnut "), "dark-walnut");
        assert_eq!(lookup_color("Dark Walnut"), Some(0x3E2A1E));
        assert_eq!(lookup_color("ROSE-gold"), Some(0xC7907A));
        assert_eq!(lookup_color("chartreuse"), None);
    }

    #[test]
    fn test_unknown_color_is_neutral_brown() {
        let mat = resolve(&MaterialCategory::Wood, "", "octarine");
        let brown = Color::from_srgb_hex(NEUTRAL_BROWN).to_array();
        assert_eq!(mat.base_color, brown);
        assert_eq!(mat.alpha_mode(), "OPAQUE");
    }

    #[test]
    fn test_brushed_metal() {
        let plain = resolve(&MaterialCategory::Metal, "", "silver");
        let brushed = resolve(&MaterialCategory::Metal, "Brushed Aluminum", "silver");
        assert!(brushed.roughness < plain.roughness);
        assert!(brushed.metallic >= 0.9);
    }

    #[test]
    fn test_matte_raises_roughness() {
        let mat = resolve(&MaterialCategory::Polystyrene, "matte black", "black");
        assert!(mat.roughness >= 0.8);
        assert_eq!(mat.metallic, 0.0);
    }

    #[test]
    fn test_gloss_lowers_roughness() {
        let natural = resolve(&MaterialCategory::Wood, "natural", "oak");
        let gloss = resolve(&MaterialCategory::Wood, "high gloss lacquer", "oak");
        assert!(gloss.roughness < natural.roughness);
    }

    #[test]
    fn test_acrylic_is_transparent() {
        let mat = resolve(&MaterialCategory::Acrylic, "", "clear");
        assert!(mat.is_transparent());
        assert_eq!(mat.alpha_mode(), "BLEND");
    }

    #[test]
    fn test_values_stay_in_unit_range() {
        let mat = resolve(&MaterialCategory::Metal, "distressed rustic antique weathered", "bronze");
        assert!((0.0..=1.0).contains(&mat.roughness));
        assert!((0.0..=1.0).contains(&mat.metallic));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let a = resolve(&MaterialCategory::Wood, "natural", "walnut");
        let b = resolve(&MaterialCategory::Wood, "natural", "walnut");
        assert_eq!(a, b);
        assert_eq!(a.name, "wood_natural_walnut");
    }
}
