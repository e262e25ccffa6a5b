//! Queue-backed generation commands

use anyhow::{bail, Result};
use framegen_jobs::{
    FrameModelPipeline, JobOutcome, LocalStorage, Orchestrator, PersistenceGateway, StageEvent,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use super::Context;

async fn start(ctx: &Context) -> Result<Orchestrator> {
    let persistence = Arc::new(ctx.persistence().await?);
    let storage = Arc::new(LocalStorage::new(
        &ctx.config.storage.root,
        ctx.config.storage.public_base_url.clone(),
    ));
    let pipeline = Arc::new(FrameModelPipeline::from_config(&ctx.config));
    Ok(Orchestrator::start(&ctx.config, persistence, storage, pipeline)?)
}

fn print_event(event: &StageEvent) {
    println!(
        "  [{:>3}%] attempt {} {}",
        event.stage.percent(),
        event.attempt,
        event.stage
    );
}

pub async fn run_generate(ctx: &Context, frame_id: &str, force: bool, follow: bool) -> Result<()> {
    let orchestrator = start(ctx).await?;
    let mut events = orchestrator.subscribe();
    let submission = orchestrator.submit(frame_id, force)?;
    println!("Job {} for frame '{}'", submission.job_id, frame_id.trim());

    let job = if follow {
        let waiting = orchestrator.wait(&submission.job_id);
        tokio::pin!(waiting);
        loop {
            tokio::select! {
                job = &mut waiting => break job?,
                event = events.recv() => match event {
                    Ok(event) if event.job_id == submission.job_id => print_event(&event),
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break orchestrator.wait(&submission.job_id).await?,
                },
            }
        }
    } else {
        orchestrator.wait(&submission.job_id).await?
    };
    orchestrator.shutdown().await?;

    println!("  Outcome: {}", job.outcome.map(|o| o.as_str()).unwrap_or("unknown"));
    println!("  Attempts: {}", job.attempts);
    if let Some(record) = &job.record_id {
        println!("  Record: {}", record);
    }
    if let Some(url) = &job.model_url {
        println!("  GLB: {}", url);
    }
    if let Some(url) = &job.usdz_url {
        let note = if job.usdz_genuine == Some(false) { " (fallback copy)" } else { "" };
        println!("  USDZ: {}{}", url, note);
    }
    if let Some(size) = job.byte_size {
        println!("  Size: {} bytes", size);
    }
    if let Some(ms) = job.elapsed_ms {
        println!("  Done in {:.1}s", ms as f64 / 1000.0);
    }

    match job.outcome {
        Some(JobOutcome::Completed) | Some(JobOutcome::Skipped) => Ok(()),
        _ => bail!(
            "generation failed: {}",
            job.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

pub async fn run_batch(ctx: &Context, ids: Vec<String>, missing: bool, force: bool, format: &str) -> Result<()> {
    if !missing && ids.is_empty() {
        bail!("give frame ids or --missing");
    }
    let orchestrator = start(ctx).await?;
    let run = if missing {
        orchestrator.run_missing(force).await?
    } else {
        orchestrator.run_batch(&ids, force).await
    };
    orchestrator.shutdown().await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        run.print_summary();
        let fallbacks = run.fallback_count();
        if fallbacks > 0 {
            println!("  {} USDZ file(s) are fallback copies of the GLB", fallbacks);
        }
    }
    Ok(())
}

pub async fn run_status(ctx: &Context, job_id: &str) -> Result<()> {
    let persistence = ctx.persistence().await?;
    match persistence.get_job_record(job_id).await? {
        Some(record) => {
            println!("Job: {}", record.job_id);
            println!("  Frame: {}", record.frame_id);
            println!("  Status: {}", record.status);
            println!("  Created: {}", record.created_at);
            if let Some(done) = record.completed_at {
                println!("  Completed: {}", done);
            }
            if let Some(url) = &record.model_url {
                println!("  GLB: {}", url);
            }
            if let Some(url) = &record.usdz_url {
                println!("  USDZ: {}", url);
            }
            if let Some(size) = record.byte_size {
                println!("  Size: {} bytes", size);
            }
            if let Some(ms) = record.elapsed_ms {
                println!("  Elapsed: {} ms", ms);
            }
            if let Some(err) = &record.error {
                println!("  Error: {}", err);
            }
            Ok(())
        }
        None => bail!("no job record '{}'", job_id),
    }
}
