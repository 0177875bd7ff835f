//! Lease renewal.
//!
//! Hub leases expire after a few days. A sweep re-subscribes every topic
//! whose lease is unknown, about to lapse, or was never verified; the
//! background task runs a sweep on a fixed interval.

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use tubesub_core::db::unix_timestamp;
use tubesub_core::tracing_init::truncate_for_log;

use crate::storage::{Database, DatabaseError, Subscription};
use crate::subscriber::{SubscribeOutcome, Subscriber};

const DAY_SECS: i64 = 24 * 60 * 60;

pub const DEFAULT_RENEWAL_LIMIT: i64 = 200;
const MAX_RENEWAL_LIMIT: i64 = 2000;
const MAX_MIN_REMAINING_SECS: i64 = 30 * DAY_SECS;

/// Sweep parameters. Out-of-range values are clamped, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalOptions {
    /// Renew when less than this is left on the lease.
    pub min_remaining_secs: i64,
    /// Most rows scanned per sweep.
    pub limit: i64,
    /// Renew every scanned row regardless of lease.
    pub force: bool,
}

impl Default for RenewalOptions {
    fn default() -> Self {
        Self {
            min_remaining_secs: 2 * DAY_SECS,
            limit: DEFAULT_RENEWAL_LIMIT,
            force: false,
        }
    }
}

impl RenewalOptions {
    pub fn new(min_remaining_secs: i64, limit: i64, force: bool) -> Self {
        Self {
            min_remaining_secs: min_remaining_secs.clamp(0, MAX_MIN_REMAINING_SECS),
            limit: limit.clamp(1, MAX_RENEWAL_LIMIT),
            force,
        }
    }

    /// Whether `sub` needs a renew request at `now`.
    pub fn is_due(&self, sub: &Subscription, now: i64) -> bool {
        self.force
            || !sub.is_active()
            || sub
                .lease_expires_at
                .is_none_or(|exp| exp <= now + self.min_remaining_secs)
    }
}

/// Summary of one sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenewalReport {
    pub now: i64,
    pub checked: usize,
    pub renewed: usize,
    pub ok_count: usize,
    pub fail_count: usize,
    pub results: Vec<SubscribeOutcome>,
}

/// Runs renewal sweeps through a [`Subscriber`].
#[derive(Clone)]
pub struct Renewer {
    db: Database,
    subscriber: Subscriber,
}

impl Renewer {
    pub const fn new(db: Database, subscriber: Subscriber) -> Self {
        Self { db, subscriber }
    }

    /// Scan up to `opts.limit` subscriptions, soonest expiry first, and
    /// re-subscribe the due ones.
    ///
    /// A failing topic is reported in the results and never aborts the sweep;
    /// only failing to list the rows is an error.
    pub async fn sweep(&self, opts: RenewalOptions) -> Result<RenewalReport, DatabaseError> {
        let now = unix_timestamp();
        let subs = self.db.list_subscriptions_for_renewal(opts.limit).await?;

        let mut report = RenewalReport {
            now,
            checked: subs.len(),
            renewed: 0,
            ok_count: 0,
            fail_count: 0,
            results: Vec::new(),
        };

        for sub in subs.iter().filter(|s| opts.is_due(s, now)) {
            report.renewed += 1;
            let outcome = match self
                .subscriber
                .subscribe_topic(&sub.topic, sub.channel_int, true)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(topic = truncate_for_log(&sub.topic, 140), error = %e, "Renewal failed");
                    SubscribeOutcome {
                        ok: false,
                        skipped: false,
                        topic: sub.topic.clone(),
                        hub_status: None,
                        last_error: Some(e.to_string()),
                    }
                }
            };
            if outcome.ok {
                report.ok_count += 1;
            } else {
                report.fail_count += 1;
            }
            report.results.push(outcome);
        }

        Ok(report)
    }
}

/// Spawn the periodic renewal task. Stops when `shutdown` is cancelled.
pub fn spawn_renewal_task(
    renewer: Renewer,
    interval: Duration,
    opts: RenewalOptions,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Lease renewal task started");

        let mut timer = tokio::time::interval(interval);
        timer.tick().await; // Skip first immediate tick

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    match renewer.sweep(opts).await {
                        Ok(report) => info!(
                            checked = report.checked,
                            renewed = report.renewed,
                            ok = report.ok_count,
                            failed = report.fail_count,
                            "Lease renewal sweep complete"
                        ),
                        Err(e) => error!(error = %e, "Lease renewal sweep failed"),
                    }
                }
                () = shutdown.cancelled() => {
                    info!("Lease renewal task shutting down");
                    return;
                }
            }
        }
    })
}
