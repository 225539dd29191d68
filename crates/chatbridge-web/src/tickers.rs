//! Periodic background work (§5's third concurrent work source):
//! `drainQueue` and `reapIdle`, run on fixed intervals for every
//! (org, integration) pair that currently has jobs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::interval;

use chatbridge_core::ids::OrgId;
use chatbridge_core::models::JobType;

use crate::app::AppState;

pub struct TickerConfig {
    pub drain_interval: Duration,
    pub reap_interval: Duration,
    pub idle_timeout_minutes: i64,
    pub drain_batch_limit: i64,
}

/// Spawns the drain and reap tickers for one org; returns their join
/// handles so the caller can await graceful shutdown.
pub fn spawn(state: Arc<AppState>, org_id: OrgId, config: Arc<TickerConfig>) -> Vec<tokio::task::JoinHandle<()>> {
    vec![
        tokio::spawn(drain_loop(state.clone(), org_id.clone(), config.clone())),
        tokio::spawn(reap_loop(state, org_id, config)),
    ]
}

async fn drain_loop(state: Arc<AppState>, org_id: OrgId, config: Arc<TickerConfig>) {
    let mut tick = interval(config.drain_interval);
    loop {
        tick.tick().await;
        let integrations = match state.jobs.integrations_with_jobs(&org_id).await {
            Ok(integrations) => integrations,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list integrations with jobs");
                state.metrics.record_error("drain_tick");
                continue;
            }
        };
        for integration_id in integrations {
            for job_type in [JobType::Slack, JobType::Discord] {
                let started = Instant::now();
                match state
                    .orchestrator
                    .drain_queue(&org_id, job_type, &integration_id, config.drain_batch_limit)
                    .await
                {
                    Ok(dispatched) => {
                        if dispatched > 0 {
                            tracing::info!(job_type = job_type.as_str(), dispatched, "drained queue");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, job_type = job_type.as_str(), "drain tick failed");
                        state.metrics.record_error("drain_tick");
                    }
                }
                state.metrics.observe_drain_tick(job_type.as_str(), started.elapsed().as_secs_f64());
            }
        }
    }
}

async fn reap_loop(state: Arc<AppState>, org_id: OrgId, config: Arc<TickerConfig>) {
    let mut tick = interval(config.reap_interval);
    loop {
        tick.tick().await;
        let started = Instant::now();
        match state.orchestrator.reap_idle(&org_id, config.idle_timeout_minutes).await {
            Ok(reaped) => {
                if reaped > 0 {
                    tracing::info!(reaped, "reaped idle jobs");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "reap tick failed");
                state.metrics.record_error("reap_tick");
            }
        }
        state.metrics.observe_reap_tick(started.elapsed().as_secs_f64());
    }
}
