//! FrameGen Asset - Materials, primary asset export and format conversion
//!
//! This crate turns a synthesized frame mesh into deliverable files:
//! - `material` - MaterialResolver: frame attributes to a PBR descriptor
//! - `AssetExporter` - scene document, optimization passes, binary glTF
//! - `validate` - size ceiling and structural checks on the primary asset
//! - `ConversionAdapter` - ordered secondary-format strategies with fallback

pub mod convert;
pub mod document;
mod export;
pub mod glb;
pub mod material;
pub mod transform;
mod validate;

pub use convert::{
    AttemptOutcome, ConversionAdapter, ConversionAttempt, ConversionOptions, ConversionResult,
    ConversionStrategy, StrategyConfig, StrategyStatus,
};
pub use document::SceneDocument;
pub use export::{AssetExporter, ExportOptions, ExportedAsset, GENERATOR};
pub use material::{resolve, resolve_spec, MaterialDescriptor};
pub use transform::{DocumentTransform, TransformPipeline};
pub use validate::{
    validate, validate_bytes, CheckStatus, ValidationCheck, ValidationReport, DEFAULT_MAX_ASSET_BYTES,
};
