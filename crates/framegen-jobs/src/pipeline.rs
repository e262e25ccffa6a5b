//! Per-job asset building: synthesize, export, validate, convert

use async_trait::async_trait;
use framegen_asset::{
    resolve_spec, validate, AssetExporter, ConversionAdapter, ConversionResult, ExportedAsset,
    ValidationReport,
};
use framegen_core::{FrameGenError, FrameSpec, Result};
use framegen_geometry::synthesize_spec;
use std::path::Path;
use std::sync::Arc;

use crate::config::FrameGenConfig;
use crate::events::{PipelineStage, StageReporter};

/// Artifacts of one successful build, still in the scratch directory
#[derive(Debug, Clone)]
pub struct BuiltAssets {
    pub primary: ExportedAsset,
    pub validation: ValidationReport,
    pub secondary: ConversionResult,
}

#[async_trait]
pub trait AssetPipeline: Send + Sync {
    /// Build both artifacts for `spec` inside `scratch`
    async fn build(&self, spec: &FrameSpec, scratch: &Path, reporter: &StageReporter) -> Result<BuiltAssets>;
}

/// The production pipeline
pub struct FrameModelPipeline {
    exporter: Arc<AssetExporter>,
    converter: ConversionAdapter,
    max_asset_bytes: u64,
}

impl FrameModelPipeline {
    pub fn new(exporter: AssetExporter, converter: ConversionAdapter, max_asset_bytes: u64) -> Self {
        Self {
            exporter: Arc::new(exporter),
            converter,
            max_asset_bytes,
        }
    }

    pub fn from_config(config: &FrameGenConfig) -> Self {
        Self::new(
            AssetExporter::new(config.export.options()),
            ConversionAdapter::from_configs(&config.conversion.strategies, config.conversion.options()),
            config.export.max_asset_bytes,
        )
    }
}

fn file_stem(frame_id: &str) -> String {
    frame_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[async_trait]
impl AssetPipeline for FrameModelPipeline {
    async fn build(&self, spec: &FrameSpec, scratch: &Path, reporter: &StageReporter) -> Result<BuiltAssets> {
        let stem = file_stem(&spec.id);
        let glb_path = scratch.join(format!("{}.glb", stem));
        let usdz_path = scratch.join(format!("{}.usdz", stem));

        reporter.report(PipelineStage::Synthesizing);
        let owned_spec = spec.clone();
        let mesh = tokio::task::spawn_blocking(move || synthesize_spec(&owned_spec))
            .await
            .map_err(|e| FrameGenError::Geometry(format!("synthesis task failed: {}", e)))?;

        reporter.report(PipelineStage::Exporting);
        let material = resolve_spec(spec);
        let exporter = Arc::clone(&self.exporter);
        let dest = glb_path.clone();
        let primary = tokio::task::spawn_blocking(move || exporter.export(&mesh, &material, &dest))
            .await
            .map_err(|e| FrameGenError::Export(format!("export task failed: {}", e)))??;

        reporter.report(PipelineStage::Validating);
        let validation = validate(&glb_path, self.max_asset_bytes)?;
        if !validation.passed {
            return Err(FrameGenError::Validation(format!(
                "{} ({} bytes): {}",
                glb_path.display(),
                validation.byte_size,
                validation.failure_summary()
            )));
        }

        reporter.report(PipelineStage::Converting);
        let secondary = self.converter.convert(&glb_path, &usdz_path).await?;
        if !secondary.genuine {
            tracing::warn!(
                frame_id = %spec.id,
                reason = secondary.fallback_reason.as_deref().unwrap_or(""),
                "secondary asset is a fallback copy"
            );
        }

        Ok(BuiltAssets {
            primary,
            validation,
            secondary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framegen_asset::{ConversionOptions, ExportOptions};

    fn scenario() -> FrameSpec {
        let mut spec = FrameSpec::new("frame 30x40", 30.0, 40.0);
        spec.rabbet_width = Some(0.25);
        spec.rabbet_depth = Some(0.25);
        spec.finish = "natural".into();
        spec
    }

    fn offline_pipeline(max_bytes: u64) -> FrameModelPipeline {
        FrameModelPipeline::new(
            AssetExporter::new(ExportOptions::default()),
            ConversionAdapter::new(Vec::new(), ConversionOptions::default()),
            max_bytes,
        )
    }

    #[tokio::test]
    async fn test_build_writes_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let built = offline_pipeline(framegen_asset::DEFAULT_MAX_ASSET_BYTES)
            .build(&scenario(), dir.path(), &StageReporter::detached("frame 30x40"))
            .await
            .unwrap();

        assert!(built.validation.passed);
        assert_eq!(built.primary.path, dir.path().join("frame_30x40.glb"));
        assert!(built.primary.byte_size > 0);
        assert!(!built.secondary.genuine);
        assert_eq!(built.secondary.byte_size, built.primary.byte_size);
        assert!(built.secondary.path.exists());
    }

    #[tokio::test]
    async fn test_oversized_asset_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let err = offline_pipeline(64)
            .build(&scenario(), dir.path(), &StageReporter::detached("frame 30x40"))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameGenError::Validation(_)));
        assert!(!dir.path().join("frame_30x40.usdz").exists());
    }
}
