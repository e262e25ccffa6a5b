//! Ordered strategy execution with an explicit fallback

use framegen_core::{FrameGenError, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{
    default_strategies, AttemptOutcome, CommandStrategy, ConversionAttempt, ConversionResult,
    ConversionStrategy, StrategyConfig, StrategyStatus,
};

#[derive(Debug, Clone)]
pub struct ConversionOptions {
    /// Wall-clock bound on each strategy attempt
    pub timeout: Duration,
    /// Copy the primary asset when no strategy succeeds
    pub allow_fallback: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            allow_fallback: true,
        }
    }
}

pub struct ConversionAdapter {
    strategies: Vec<Arc<dyn ConversionStrategy>>,
    options: ConversionOptions,
}

impl ConversionAdapter {
    pub fn new(strategies: Vec<Arc<dyn ConversionStrategy>>, options: ConversionOptions) -> Self {
        Self { strategies, options }
    }

    /// Command strategies built from configuration, in order
    pub fn from_configs(configs: &[StrategyConfig], options: ConversionOptions) -> Self {
        let strategies = configs
            .iter()
            .cloned()
            .map(|c| Arc::new(CommandStrategy::new(c)) as Arc<dyn ConversionStrategy>)
            .collect();
        Self::new(strategies, options)
    }

    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    /// Produce the secondary asset at `dest` from the primary asset at `primary`
    pub async fn convert(&self, primary: &Path, dest: &Path) -> Result<ConversionResult> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut attempts = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            let name = strategy.name().to_string();
            let started = Instant::now();
            let attempt = |outcome, detail: String| ConversionAttempt {
                strategy: name.clone(),
                outcome,
                detail,
                duration_ms: started.elapsed().as_millis() as u64,
            };

            match strategy.health_check().await {
                Ok(StrategyStatus::Available) => {}
                Ok(StrategyStatus::Unavailable(reason)) => {
                    tracing::debug!(strategy = %name, %reason, "conversion strategy unavailable");
                    attempts.push(attempt(AttemptOutcome::Unavailable, reason));
                    continue;
                }
                Err(e) => {
                    attempts.push(attempt(AttemptOutcome::Unavailable, e.to_string()));
                    continue;
                }
            }

            // A stale file from an earlier attempt must not count as output
            if tokio::fs::try_exists(dest).await.unwrap_or(false) {
                tokio::fs::remove_file(dest).await?;
            }

            match tokio::time::timeout(self.options.timeout, strategy.convert(primary, dest)).await {
                Err(_) => {
                    tracing::warn!(strategy = %name, timeout_secs = self.options.timeout.as_secs(), "conversion timed out");
                    attempts.push(attempt(
                        AttemptOutcome::TimedOut,
                        format!("no result after {:?}", self.options.timeout),
                    ));
                }
                Ok(Err(e)) => {
                    tracing::warn!(strategy = %name, error = %e, "conversion strategy failed");
                    attempts.push(attempt(AttemptOutcome::Failed, e.to_string()));
                }
                Ok(Ok(())) => {
                    let size = tokio::fs::metadata(dest).await.map(|m| m.len()).unwrap_or(0);
                    if size == 0 {
                        attempts.push(attempt(AttemptOutcome::Failed, "produced no output".to_string()));
                        continue;
                    }
                    attempts.push(attempt(AttemptOutcome::Succeeded, format!("{} bytes", size)));
                    tracing::info!(strategy = %name, bytes = size, "converted secondary asset");
                    return Ok(ConversionResult {
                        path: dest.to_path_buf(),
                        byte_size: size,
                        genuine: true,
                        strategy: Some(name),
                        fallback_reason: None,
                        attempts,
                    });
                }
            }
        }

        let reason = if attempts.is_empty() {
            "no conversion strategies configured".to_string()
        } else {
            attempts
                .iter()
                .map(|a| format!("{}: {}", a.strategy, a.detail))
                .collect::<Vec<_>>()
                .join("; ")
        };

        if !self.options.allow_fallback {
            return Err(FrameGenError::ConversionExhausted(reason));
        }

        let byte_size = tokio::fs::copy(primary, dest).await?;
        tracing::warn!(
            path = %dest.display(),
            %reason,
            "all conversion strategies failed, wrote non-genuine fallback"
        );
        Ok(ConversionResult {
            path: dest.to_path_buf(),
            byte_size,
            genuine: false,
            strategy: None,
            fallback_reason: Some(reason),
            attempts,
        })
    }
}

impl Default for ConversionAdapter {
    fn default() -> Self {
        Self::from_configs(&default_strategies(), ConversionOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Missing,
        Fail,
        Hang,
        Write(&'static [u8]),
    }

    struct FakeStrategy {
        name: &'static str,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl FakeStrategy {
        fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name,
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ConversionStrategy for FakeStrategy {
        fn name(&self) -> &str {
            self.name
        }

        async fn health_check(&self) -> Result<StrategyStatus> {
            Ok(match self.behavior {
                Behavior::Missing => StrategyStatus::Unavailable("not installed".into()),
                _ => StrategyStatus::Available,
            })
        }

        async fn convert(&self, _input: &Path, output: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Missing => unreachable!("convert called on unavailable strategy"),
                Behavior::Fail => Err(FrameGenError::Transient("boom".into())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
                Behavior::Write(bytes) => {
                    tokio::fs::write(output, bytes).await?;
                    Ok(())
                }
            }
        }
    }

    fn setup() -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("frame.glb");
        std::fs::write(&primary, b"glTF-primary-bytes").unwrap();
        let dest = dir.path().join("frame.usdz");
        (dir, primary, dest)
    }

    fn options(timeout_ms: u64, allow_fallback: bool) -> ConversionOptions {
        ConversionOptions {
            timeout: Duration::from_millis(timeout_ms),
            allow_fallback,
        }
    }

    #[tokio::test]
    async fn test_first_working_strategy_wins() {
        let (_dir, primary, dest) = setup();
        let broken = FakeStrategy::new("broken", Behavior::Fail);
        let good = FakeStrategy::new("good", Behavior::Write(b"usdz"));
        let never = FakeStrategy::new("never", Behavior::Write(b"other"));
        let adapter = ConversionAdapter::new(
            vec![broken.clone(), good.clone(), never.clone()],
            options(1000, true),
        );

        let result = adapter.convert(&primary, &dest).await.unwrap();
        assert!(result.genuine);
        assert_eq!(result.strategy.as_deref(), Some("good"));
        assert_eq!(result.byte_size, 4);
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(never.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timed_out_strategy_is_skipped() {
        let (_dir, primary, dest) = setup();
        let adapter = ConversionAdapter::new(
            vec![
                FakeStrategy::new("slow", Behavior::Hang),
                FakeStrategy::new("fast", Behavior::Write(b"usdz")),
            ],
            options(50, true),
        );
        let result = adapter.convert(&primary, &dest).await.unwrap();
        assert!(result.genuine);
        assert_eq!(result.attempts[0].outcome, AttemptOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_fallback_copies_primary() {
        let (_dir, primary, dest) = setup();
        let adapter = ConversionAdapter::new(
            vec![
                FakeStrategy::new("missing", Behavior::Missing),
                FakeStrategy::new("broken", Behavior::Fail),
                FakeStrategy::new("empty", Behavior::Write(b"")),
            ],
            options(1000, true),
        );
        let result = adapter.convert(&primary, &dest).await.unwrap();
        assert!(!result.genuine);
        assert!(result.is_fallback());
        assert!(result.strategy.is_none());
        assert_eq!(std::fs::read(&dest).unwrap(), b"glTF-primary-bytes");
        let reason = result.fallback_reason.unwrap();
        assert!(reason.contains("missing: not installed"));
        assert!(reason.contains("broken"));
        assert_eq!(result.attempts.len(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_without_fallback() {
        let (_dir, primary, dest) = setup();
        let adapter = ConversionAdapter::new(vec![FakeStrategy::new("broken", Behavior::Fail)], options(1000, false));
        let err = adapter.convert(&primary, &dest).await.unwrap_err();
        assert!(matches!(err, FrameGenError::ConversionExhausted(_)));
    }

    #[tokio::test]
    async fn test_no_strategies_falls_back() {
        let (_dir, primary, dest) = setup();
        let adapter = ConversionAdapter::new(Vec::new(), ConversionOptions::default());
        let result = adapter.convert(&primary, &dest).await.unwrap();
        assert!(!result.genuine);
        assert_eq!(result.byte_size, 18);
    }
}
