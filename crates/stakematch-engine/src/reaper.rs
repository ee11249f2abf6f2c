//! Idle-match reaper.
//!
//! A match that sits in `WAITING` or `IN-PROGRESS` without any state change
//! for longer than the idle threshold is abandoned and every seated player's
//! stake is refunded. Each match is reaped in its own unit of work; the
//! status is re-checked inside it, so a match that moved on between the scan
//! and the write is skipped rather than refunded twice.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stakematch_settlement::{RefundCause, RefundOutcome, refund};
use stakematch_types::{Coins, ErrorKind, MatchStatus, Result, StakematchError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::Engine;

/// Summary of one reaper sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReapReport {
    /// Candidates returned by the idle scan.
    pub examined: usize,
    pub abandoned: usize,
    /// Candidates that finished or became active before the write.
    pub skipped: usize,
    /// Candidates whose refund failed for another reason; retried next sweep.
    pub failed: usize,
    pub refunded: Coins,
}

impl Engine {
    /// Abandon and refund every match idle past the configured threshold.
    ///
    /// # Errors
    /// Returns `Configuration` if the idle threshold cannot be applied to the
    /// current time, or the store error if the idle scan itself fails.
    /// Per-match failures are counted in the report instead.
    pub fn reap_idle_matches(&self) -> Result<ReapReport> {
        let threshold = self.config.idle_threshold()?;
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(threshold)
            .ok_or_else(|| {
                StakematchError::Configuration(format!(
                    "idle threshold {threshold} reaches before the earliest representable time"
                ))
            })?;
        let candidates = self.store.idle_matches(cutoff)?;
        let mut report = ReapReport {
            examined: candidates.len(),
            ..ReapReport::default()
        };

        for match_id in candidates {
            let reaped = self.transact("reap_idle_match", |uow| {
                let game = uow.load_match(match_id)?;
                if !matches!(game.status, MatchStatus::Waiting | MatchStatus::InProgress) {
                    return Ok(None);
                }
                let idle = game.idle_for(uow.now());
                if idle <= threshold {
                    return Ok(None);
                }
                let cause = RefundCause::IdleTimeout {
                    idle_minutes: idle.num_minutes(),
                };
                refund(uow, match_id, cause).map(Some)
            });
            match reaped {
                Ok(Some(outcome)) => {
                    log_abandoned(&outcome);
                    report.abandoned += 1;
                    report.refunded = Coins(report.refunded.get().saturating_add(outcome.total().get()));
                }
                Ok(None) => report.skipped += 1,
                Err(err) if err.kind() == ErrorKind::StateConflict => {
                    tracing::debug!(%match_id, error = %err, "idle match changed before reaping");
                    report.skipped += 1;
                }
                Err(err) => {
                    tracing::warn!(%match_id, error = %err, "failed to reap idle match");
                    report.failed += 1;
                }
            }
        }

        if report.examined > 0 {
            tracing::info!(
                examined = report.examined,
                abandoned = report.abandoned,
                skipped = report.skipped,
                failed = report.failed,
                refunded = report.refunded.get(),
                "idle sweep finished"
            );
        }
        Ok(report)
    }

    /// The sweep period from config.
    #[must_use]
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.config.reaper_interval_secs)
    }
}

fn log_abandoned(outcome: &RefundOutcome) {
    tracing::info!(
        match_id = %outcome.match_id,
        cause = %outcome.cause,
        players = outcome.refunded.len(),
        amount = outcome.total().get(),
        "idle match abandoned"
    );
}

/// Control handle for a running reaper task.
#[derive(Debug)]
pub struct ReaperHandle {
    shutdown: watch::Sender<bool>,
    reports: watch::Receiver<Option<ReapReport>>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Observe sweep reports; holds the latest one.
    #[must_use]
    pub fn reports(&self) -> watch::Receiver<Option<ReapReport>> {
        self.reports.clone()
    }

    /// Stop the task after its current sweep and wait for it.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "idle reaper task failed");
        }
    }
}

/// Run [`Engine::reap_idle_matches`] every `every` on the current tokio
/// runtime. Sweeps run on the blocking pool; a sweep that overruns the period
/// skips the missed ticks instead of bunching them up.
pub fn spawn_idle_reaper(engine: Arc<Engine>, every: Duration) -> ReaperHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let (reports_tx, reports_rx) = watch::channel(None);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(period = ?every, "idle reaper started");
        loop {
            tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            let engine = Arc::clone(&engine);
            match tokio::task::spawn_blocking(move || engine.reap_idle_matches()).await {
                Ok(Ok(report)) => {
                    reports_tx.send_replace(Some(report));
                }
                Ok(Err(err)) => tracing::warn!(error = %err, "idle scan failed"),
                Err(err) => tracing::error!(error = %err, "idle sweep panicked"),
            }
        }
        tracing::info!("idle reaper stopped");
    });

    ReaperHandle {
        shutdown: shutdown_tx,
        reports: reports_rx,
        task,
    }
}
