//! Start readiness polling
//!
//! After a start command is accepted the server keeps reporting
//! `is_running` until the process has finished booting, at which point it
//! reports `is_started`. A response with neither flag means the process died.

use std::time::Duration;

use tokio::time::Instant;

use srvdeck_core::prelude::*;
use srvdeck_core::ResourceId;
use srvdeck_gateway::{Gateway, StatusReport};

use crate::message::Readiness;

/// What one status query says about a starting server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollVerdict {
    Ready(Readiness),
    /// Running but not ready; query again after the interval
    Pending,
    /// Neither started nor running
    Anomaly,
}

pub fn classify(report: &StatusReport) -> PollVerdict {
    if report.is_started {
        PollVerdict::Ready(Readiness {
            port: report.port,
            pid: report.pid,
            path: report.path.clone(),
        })
    } else if report.is_running {
        PollVerdict::Pending
    } else {
        PollVerdict::Anomaly
    }
}

/// Query status until `id` is ready, it fails, or `budget` runs out.
///
/// The first query is issued immediately. `on_pending` is called with the
/// attempt number each time the server answers "not ready yet".
pub async fn poll_until_ready<G, F>(
    gateway: &G,
    id: &ResourceId,
    interval: Duration,
    budget: Duration,
    mut on_pending: F,
) -> Result<Readiness>
where
    G: Gateway + Sync,
    F: FnMut(u32) + Send,
{
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let report = gateway.server_status(id.as_str()).await.inspect_err(|e| {
            if e.is_network() {
                warn!("Lost contact with the server while starting '{}'", id);
            }
        })?;

        match classify(&report) {
            PollVerdict::Ready(readiness) => {
                debug!("'{}' ready after {} status check(s)", id, attempt);
                return Ok(readiness);
            }
            PollVerdict::Anomaly => {
                return Err(Error::poll_anomaly(
                    id,
                    format!("Server '{}' failed to start properly", id),
                ));
            }
            PollVerdict::Pending => on_pending(attempt),
        }

        if started.elapsed() + interval > budget {
            return Err(Error::timeout(format!("Start of '{}'", id), budget));
        }
        tokio::time::sleep(interval).await;
    }
}
