//! Background tasks for listing, start, stop and deployment transfers

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use srvdeck_core::prelude::*;
use srvdeck_core::ResourceId;
use srvdeck_gateway::{to_resources, Gateway};

use crate::config::PollerSettings;
use crate::locks::LockToken;
use crate::message::{ListScope, Message, StopOutcome};

use super::guard::CompletionGuard;
use super::poller::poll_until_ready;

fn lock_guard(msg_tx: mpsc::Sender<Message>, id: &ResourceId, token: LockToken) -> CompletionGuard {
    CompletionGuard::new(
        msg_tx,
        Message::OperationAbandoned {
            id: id.clone(),
            token,
        },
    )
}

pub(super) async fn fetch_resources<G: Gateway + Sync>(
    gateway: &G,
    scope: ListScope,
    host: &str,
    msg_tx: mpsc::Sender<Message>,
) {
    let result = match scope {
        ListScope::All => gateway.list_servers().await,
        ListScope::Running => gateway.running_servers().await,
    };

    let msg = match result {
        Ok(servers) => Message::ResourcesLoaded {
            resources: to_resources(servers, host),
        },
        Err(e) => Message::ResourcesLoadFailed { error: e.report() },
    };
    let _ = msg_tx.send(msg).await;
}

/// Issue the start command and follow it with readiness polling.
pub(super) async fn run_start<G: Gateway + Send + Sync + 'static>(
    gateway: Arc<G>,
    id: ResourceId,
    token: LockToken,
    poller: PollerSettings,
    msg_tx: mpsc::Sender<Message>,
) {
    let guard = lock_guard(msg_tx.clone(), &id, token);

    match gateway.start_server(id.as_str()).await {
        Ok(ack) => {
            debug!("Start of '{}' accepted: {}", id, ack.trim());
            let _ = msg_tx
                .send(Message::StartAccepted {
                    id: id.clone(),
                    token,
                })
                .await;
        }
        Err(e) => {
            guard
                .complete(Message::StartFailed {
                    id,
                    token,
                    error: e.report(),
                })
                .await;
            return;
        }
    }

    let tick_tx = msg_tx.clone();
    let tick_id = id.clone();
    let outcome = poll_until_ready(
        gateway.as_ref(),
        &id,
        poller.interval(),
        poller.budget(),
        move |attempt| {
            let _ = tick_tx.try_send(Message::StartPollPending {
                id: tick_id.clone(),
                token,
                attempt,
            });
        },
    )
    .await;

    let msg = match outcome {
        Ok(readiness) => Message::StartReady {
            id,
            token,
            readiness,
        },
        Err(e) => Message::StartFailed {
            id,
            token,
            error: e.report(),
        },
    };
    guard.complete(msg).await;
}

pub(super) async fn run_stop<G: Gateway + Send + Sync + 'static>(
    gateway: Arc<G>,
    id: ResourceId,
    token: LockToken,
    msg_tx: mpsc::Sender<Message>,
) {
    let guard = lock_guard(msg_tx, &id, token);

    let msg = match gateway.stop_server(id.as_str()).await {
        Ok(report) => Message::StopCompleted {
            id,
            token,
            outcome: StopOutcome {
                running: report.running,
                pid: report.pid,
                path: report.path,
            },
        },
        Err(e) => Message::StopFailed {
            id,
            token,
            error: e.report(),
        },
    };
    guard.complete(msg).await;
}

pub(super) async fn run_deploy<G: Gateway + Send + Sync + 'static>(
    gateway: Arc<G>,
    id: ResourceId,
    token: LockToken,
    deployment_path: String,
    files: Vec<PathBuf>,
    msg_tx: mpsc::Sender<Message>,
) {
    let guard = lock_guard(msg_tx, &id, token);

    let msg = match gateway
        .upload_deployables(id.as_str(), &deployment_path, &files)
        .await
    {
        Ok(()) => Message::DeployCompleted { id, token },
        Err(e) => Message::DeployFailed {
            id,
            token,
            error: e.report(),
        },
    };
    guard.complete(msg).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locks::OperationLocks;
    use srvdeck_gateway::test_utils::{server_info, status_report, GatewayCall, ScriptedGateway};

    fn token_for(id: &str) -> LockToken {
        OperationLocks::new()
            .try_acquire(&ResourceId::from(id))
            .unwrap()
    }

    async fn drain(rx: &mut mpsc::Receiver<Message>) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn test_fetch_running_maps_listing() {
        let gateway = ScriptedGateway::new();
        gateway.push_running(Ok(vec![server_info("web1", true)]));
        let (tx, mut rx) = mpsc::channel(16);

        fetch_resources(&gateway, ListScope::Running, "localhost", tx).await;

        match rx.recv().await.unwrap() {
            Message::ResourcesLoaded { resources } => {
                assert_eq!(resources.len(), 1);
                assert!(resources[0].is_running());
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert_eq!(gateway.calls(), vec![GatewayCall::RunningServers]);
    }

    #[tokio::test]
    async fn test_start_rejected_skips_polling() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.push_start(Err(Error::server(400, "Another server is already running")));
        let (tx, mut rx) = mpsc::channel(16);

        run_start(
            gateway.clone(),
            ResourceId::from("web1"),
            token_for("web1"),
            PollerSettings::default(),
            tx,
        )
        .await;

        let msgs = drain(&mut rx).await;
        assert_eq!(msgs.len(), 1);
        assert!(matches!(&msgs[0], Message::StartFailed { error, .. }
            if error.message == "Another server is already running"));
        assert_eq!(gateway.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_reports_accept_ticks_and_ready() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway
            .push_status(Ok(status_report(false, true)))
            .push_status(Ok(status_report(true, true)));
        let (tx, mut rx) = mpsc::channel(16);

        run_start(
            gateway,
            ResourceId::from("web1"),
            token_for("web1"),
            PollerSettings::default(),
            tx,
        )
        .await;

        let msgs = drain(&mut rx).await;
        assert!(matches!(msgs[0], Message::StartAccepted { .. }));
        assert!(matches!(msgs[1], Message::StartPollPending { attempt: 1, .. }));
        assert!(matches!(msgs[2], Message::StartReady { .. }));
        assert_eq!(msgs.len(), 3);
    }

    #[tokio::test]
    async fn test_dropped_guard_reports_abandonment() {
        let (tx, mut rx) = mpsc::channel(4);
        let token = token_for("web1");
        drop(lock_guard(tx, &ResourceId::from("web1"), token));

        match rx.recv().await.unwrap() {
            Message::OperationAbandoned { id, token: t } => {
                assert_eq!(id.as_str(), "web1");
                assert_eq!(t, token);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stop_failure_carries_network_error() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.push_stop(Err(Error::network("Unable to connect to server.")));
        let (tx, mut rx) = mpsc::channel(4);

        run_stop(gateway, ResourceId::from("web1"), token_for("web1"), tx).await;

        match rx.recv().await.unwrap() {
            Message::StopFailed { error, .. } => {
                assert_eq!(error.kind, srvdeck_core::ErrorKind::Network);
            }
            other => panic!("unexpected message: {other:?}"),
        }
        // Completed guards do not also report abandonment
        assert!(rx.try_recv().is_err());
    }
}
