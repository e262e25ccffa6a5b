//! Frame catalog listing

use anyhow::Result;
use framegen_jobs::PersistenceGateway;

use super::Context;

pub async fn run(ctx: &Context, missing: bool, format: &str) -> Result<()> {
    let persistence = ctx.persistence().await?;
    let frames = if missing {
        persistence.get_frames_missing_models().await?
    } else {
        persistence.list_frames().await?
    };

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&frames)?);
        return Ok(());
    }

    if frames.is_empty() {
        println!("No frames found in {}", ctx.frames.display());
        return Ok(());
    }

    println!("{} frame(s):\n", frames.len());
    for frame in &frames {
        let state = if frame.has_models() { "ready" } else { "missing" };
        println!(
            "  {:<24} {:>5.1} x {:<5.1} {:<12} {:<12} {}",
            frame.id,
            frame.outer_width,
            frame.outer_height,
            frame.profile,
            frame.material,
            state
        );
    }
    Ok(())
}
