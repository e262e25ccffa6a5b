//! Local model commands: synthesize, validate, convert

use anyhow::{anyhow, bail, Result};
use framegen_asset::{resolve_spec, validate, AssetExporter, ConversionAdapter};
use framegen_geometry::synthesize_spec;
use framegen_jobs::PersistenceGateway;
use std::path::Path;

use super::Context;

pub async fn run_synthesize(ctx: &Context, frame_id: &str, out: &str) -> Result<()> {
    let persistence = ctx.persistence().await?;
    let spec = persistence
        .get_frame(frame_id)
        .await?
        .ok_or_else(|| anyhow!("frame '{}' not found in {}", frame_id, ctx.frames.display()))?;

    let mesh = synthesize_spec(&spec);
    let material = resolve_spec(&spec);
    let exporter = AssetExporter::new(ctx.config.export.options());
    let asset = exporter.export(&mesh, &material, Path::new(out))?;

    println!("Synthesized '{}' ({} {})", spec.label(), spec.profile, spec.material);
    println!("  Material: {}", material.name);
    println!(
        "  Mesh: {} vertices, {} triangles",
        asset.vertex_count, asset.triangle_count
    );
    println!("  Passes: {}", asset.transforms.join(" -> "));
    println!("  Wrote: {} ({} bytes)", asset.path.display(), asset.byte_size);
    println!("  Hash: {}", asset.content_hash);

    let report = validate(&asset.path, ctx.config.export.max_asset_bytes)?;
    report.print_summary();
    if !report.passed {
        bail!("validation failed: {}", report.failure_summary());
    }
    Ok(())
}

pub fn run_validate(ctx: &Context, path: &str, max_bytes: Option<u64>, format: &str) -> Result<()> {
    let max = max_bytes.unwrap_or(ctx.config.export.max_asset_bytes);
    let report = validate(Path::new(path), max)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_summary();
    }

    if !report.passed {
        std::process::exit(1);
    }
    Ok(())
}

pub async fn run_convert(ctx: &Context, glb: &str, out: &str, no_fallback: bool) -> Result<()> {
    let mut options = ctx.config.conversion.options();
    if no_fallback {
        options.allow_fallback = false;
    }
    let adapter = ConversionAdapter::from_configs(&ctx.config.conversion.strategies, options);
    let result = adapter.convert(Path::new(glb), Path::new(out)).await?;

    for attempt in &result.attempts {
        println!(
            "  {:<16} {:?} ({} ms) {}",
            attempt.strategy, attempt.outcome, attempt.duration_ms, attempt.detail
        );
    }
    match &result.strategy {
        Some(name) => println!("Converted with {}: {} ({} bytes)", name, result.path.display(), result.byte_size),
        None => println!(
            "Fallback copy written: {} ({} bytes), not a genuine USDZ",
            result.path.display(),
            result.byte_size
        ),
    }
    Ok(())
}
