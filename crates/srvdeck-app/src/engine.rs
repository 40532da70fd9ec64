//! Engine - owns the TEA state, the message channel and the gateway
//!
//! Frontends feed [`Message`]s in, either directly through
//! [`Engine::process_message`] or via the channel from [`Engine::msg_sender`],
//! and observe results as [`EngineEvent`]s from [`Engine::subscribe`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use srvdeck_core::prelude::*;
use srvdeck_core::{ErrorReport, LifecycleState, ResourceId, Summary, UploadStage};
use srvdeck_gateway::Gateway;

use crate::config::Settings;
use crate::engine_event::EngineEvent;
use crate::message::Message;
use crate::process;
use crate::state::{AppState, ErrorArea, TransientMessage, TransientSlot};

const ERROR_AREAS: [ErrorArea; 3] = [ErrorArea::Summary, ErrorArea::Deploy, ErrorArea::Archive];
const TRANSIENT_SLOTS: [TransientSlot; 2] = [TransientSlot::Starting, TransientSlot::Upload];

#[derive(Debug, Clone, PartialEq)]
struct ArchiveSnapshot {
    stage: UploadStage,
    label: String,
    extraction_path: Option<String>,
    progress_percent: u8,
    transferred_bytes: u64,
    total_bytes: u64,
}

/// Lightweight snapshot of state for change detection.
///
/// Captured before message processing, compared after to detect
/// what changed and emit appropriate EngineEvents.
#[derive(Debug, Clone)]
struct StateSnapshot {
    resources: Vec<(ResourceId, LifecycleState, u64)>,
    summary: Summary,
    last_refreshed: Option<DateTime<Local>>,
    poll_attempts: HashMap<ResourceId, u32>,
    errors: Vec<Option<ErrorReport>>,
    transients: Vec<Option<TransientMessage>>,
    archive: Option<ArchiveSnapshot>,
}

impl StateSnapshot {
    fn capture(state: &AppState) -> Self {
        Self {
            resources: state
                .resources()
                .iter()
                .map(|r| (r.id.clone(), state.display_state(r), r.uptime_seconds))
                .collect(),
            summary: state.summary(),
            last_refreshed: state.last_refreshed,
            poll_attempts: state.poll_attempts.clone(),
            errors: ERROR_AREAS
                .iter()
                .map(|area| state.error(*area).cloned())
                .collect(),
            transients: TRANSIENT_SLOTS
                .iter()
                .map(|slot| state.transient(*slot).cloned())
                .collect(),
            archive: state.archive.as_ref().map(|s| ArchiveSnapshot {
                stage: s.stage,
                label: s.stage_label.clone(),
                extraction_path: s.extraction_path.clone(),
                progress_percent: s.progress_percent,
                transferred_bytes: s.transferred_bytes,
                total_bytes: s.total_bytes,
            }),
        }
    }

    fn display_state(&self, id: &ResourceId) -> Option<LifecycleState> {
        self.resources
            .iter()
            .find(|(rid, _, _)| rid == id)
            .map(|(_, state, _)| *state)
    }
}

/// Orchestration engine for Server Deck.
///
/// Encapsulates:
/// - TEA state management
/// - Message channel
/// - The management server gateway
/// - Settings
/// - Event broadcasting for external consumers
pub struct Engine<G> {
    /// TEA application state (the Model)
    pub state: AppState,

    /// Sender half of the unified message channel.
    /// Background tasks report completions through clones of this.
    pub msg_tx: mpsc::Sender<Message>,

    /// Receiver half of the unified message channel.
    pub msg_rx: mpsc::Receiver<Message>,

    gateway: Arc<G>,

    /// Event broadcaster for external consumers.
    event_tx: broadcast::Sender<EngineEvent>,
}

impl<G: Gateway + Send + Sync + 'static> Engine<G> {
    /// Create an engine over `gateway` with a message channel of capacity 256.
    pub fn new(settings: Settings, gateway: Arc<G>) -> Self {
        let state = AppState::with_settings(settings);
        let (msg_tx, msg_rx) = mpsc::channel::<Message>(256);
        let (event_tx, _) = broadcast::channel(256);

        Self {
            state,
            msg_tx,
            msg_rx,
            gateway,
            event_tx,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Subscribe to engine events.
    ///
    /// If the subscriber falls behind (buffer full), older events are
    /// dropped. Use `broadcast::error::RecvError::Lagged` to detect this.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Process a single message through the TEA update cycle and emit
    /// events for whatever changed.
    pub fn process_message(&mut self, msg: Message) {
        let pre = StateSnapshot::capture(&self.state);

        process::process_message(&mut self.state, msg, &self.msg_tx, &self.gateway);

        let post = StateSnapshot::capture(&self.state);
        self.emit_events(&pre, &post);
    }

    /// Drain and process all pending messages from the channel.
    ///
    /// Returns the number of messages processed.
    pub fn drain_pending_messages(&mut self) -> usize {
        let mut count = 0;
        while let Ok(msg) = self.msg_rx.try_recv() {
            self.process_message(msg);
            count += 1;
        }
        count
    }

    /// Process channel messages until `done` holds for the state, or fail
    /// once `budget` has elapsed.
    pub async fn run_until(
        &mut self,
        budget: Duration,
        mut done: impl FnMut(&AppState) -> bool,
    ) -> Result<()> {
        let deadline = Instant::now() + budget;
        while !done(&self.state) {
            match tokio::time::timeout_at(deadline, self.msg_rx.recv()).await {
                Ok(Some(msg)) => self.process_message(msg),
                Ok(None) => return Err(Error::ChannelClosed),
                Err(_) => return Err(Error::timeout("Waiting for the server", budget)),
            }
        }
        Ok(())
    }

    /// Get a clone of the message sender
    pub fn msg_sender(&self) -> mpsc::Sender<Message> {
        self.msg_tx.clone()
    }

    pub fn shutdown(&mut self) {
        info!("Engine shutting down");
        self.emit(EngineEvent::Shutdown);
    }

    /// Compare pre/post snapshots and emit an event per detected change.
    fn emit_events(&self, pre: &StateSnapshot, post: &StateSnapshot) {
        if pre.last_refreshed != post.last_refreshed {
            self.emit(EngineEvent::ResourcesLoaded {
                count: post.resources.len(),
            });
        }

        // Only resources that existed before; a reload is reported as a whole
        for (id, new_state, uptime_seconds) in &post.resources {
            if let Some(old_state) = pre.display_state(id) {
                if old_state != *new_state {
                    self.emit(EngineEvent::ResourceStateChanged {
                        id: id.clone(),
                        old_state,
                        new_state: *new_state,
                        uptime_seconds: *uptime_seconds,
                    });
                }
            }
        }

        if pre.summary != post.summary {
            self.emit(EngineEvent::SummaryChanged {
                summary: post.summary,
            });
        }

        for (id, attempt) in &post.poll_attempts {
            if *attempt > 0 && pre.poll_attempts.get(id) != Some(attempt) {
                self.emit(EngineEvent::PollTick {
                    id: id.clone(),
                    attempt: *attempt,
                });
            }
        }

        for (i, slot) in TRANSIENT_SLOTS.iter().enumerate() {
            if pre.transients[i] == post.transients[i] {
                continue;
            }
            match &post.transients[i] {
                Some(message) => self.emit(EngineEvent::MessageShown {
                    slot: *slot,
                    text: message.text.clone(),
                }),
                None => self.emit(EngineEvent::MessageCleared { slot: *slot }),
            }
        }

        for (i, area) in ERROR_AREAS.iter().enumerate() {
            if pre.errors[i] == post.errors[i] {
                continue;
            }
            match &post.errors[i] {
                Some(error) => self.emit(EngineEvent::ErrorRaised {
                    area: *area,
                    error: error.clone(),
                }),
                None => self.emit(EngineEvent::ErrorCleared { area: *area }),
            }
        }

        self.emit_archive_events(pre.archive.as_ref(), post.archive.as_ref());
    }

    fn emit_archive_events(&self, pre: Option<&ArchiveSnapshot>, post: Option<&ArchiveSnapshot>) {
        let Some(post) = post else {
            if pre.is_some() {
                self.emit(EngineEvent::UploadClosed);
            }
            return;
        };

        let stage_changed = pre.map_or(true, |p| {
            p.stage != post.stage
                || p.label != post.label
                || p.extraction_path != post.extraction_path
        });
        if stage_changed {
            self.emit(EngineEvent::UploadStageChanged {
                stage: post.stage,
                label: post.label.clone(),
                extraction_path: post.extraction_path.clone(),
            });
        }

        let progressed = pre.is_some_and(|p| {
            p.progress_percent != post.progress_percent
                || p.transferred_bytes != post.transferred_bytes
        });
        if progressed {
            self.emit(EngineEvent::UploadProgress {
                progress_percent: post.progress_percent,
                transferred_bytes: post.transferred_bytes,
                total_bytes: post.total_bytes,
            });
        }
    }

    /// send() returns Err only if there are no receivers, which is fine.
    fn emit(&self, event: EngineEvent) {
        trace!("engine event: {}", event.event_type());
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use srvdeck_core::{ErrorKind, Resource};
    use srvdeck_gateway::protocol::StatusReport;
    use srvdeck_gateway::test_utils::{
        extraction_status, status_report, GatewayCall, ScriptedGateway,
    };
    use srvdeck_gateway::{ArchiveUploadResponse, ExtractionState};

    use crate::message::ListScope;
    use crate::upload_session::{ArchiveCandidate, SelectionSource, MSG_NOT_AN_ARCHIVE};

    const WAIT: Duration = Duration::from_secs(3600);

    fn resource(id: &str, state: LifecycleState, uptime: u64) -> Resource {
        Resource {
            id: ResourceId::from(id),
            display_name: id.to_string(),
            host: "localhost".to_string(),
            port: 8080,
            lifecycle_state: state,
            uptime_seconds: uptime,
            process_id: None,
            path: Some(format!("/opt/{id}")),
            deployment_path: Some(format!("/opt/{id}/deployments")),
        }
    }

    fn engine_with(resources: Vec<Resource>) -> (Engine<ScriptedGateway>, Arc<ScriptedGateway>) {
        let gateway = Arc::new(ScriptedGateway::new());
        let mut engine = Engine::new(Settings::default(), gateway.clone());
        engine.process_message(Message::ResourcesLoaded { resources });
        (engine, gateway)
    }

    fn idle(state: &AppState) -> bool {
        state.locks.busy_count() == 0
    }

    fn drain_events(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    fn web1() -> ResourceId {
        ResourceId::from("web1")
    }

    // ─────────────────────────────────────────────────────────
    // Start
    // ─────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_start_polls_until_ready() {
        let (mut engine, gateway) = engine_with(vec![resource("web1", LifecycleState::Stopped, 0)]);
        gateway
            .push_status(Ok(status_report(false, true)))
            .push_status(Ok(status_report(false, true)))
            .push_status(Ok(StatusReport {
                is_started: true,
                is_running: true,
                pid: Some(42),
                port: None,
                path: None,
            }));
        let mut events = engine.subscribe();

        engine.process_message(Message::StartResource { id: web1() });
        assert!(engine.state.is_busy(&web1()));
        assert_eq!(
            engine.state.starting_message.as_ref().unwrap().text,
            "Starting server 'web1'..."
        );

        engine.run_until(WAIT, idle).await.unwrap();

        let r = engine.state.resource(&web1()).unwrap();
        assert_eq!(r.lifecycle_state, LifecycleState::Running);
        assert_eq!(r.uptime_seconds, 1);
        assert_eq!(r.port, 8080);
        assert_eq!(r.process_id, Some(42));
        assert_eq!(engine.state.summary().running_count, 1);
        assert!(engine.state.locks.starting().is_none());
        assert_eq!(
            engine.state.starting_message.as_ref().unwrap().text,
            "Server 'web1' started successfully"
        );
        assert_eq!(gateway.status_calls(), 3);

        let events = drain_events(&mut events);
        assert!(events.contains(&EngineEvent::ResourceStateChanged {
            id: web1(),
            old_state: LifecycleState::Stopped,
            new_state: LifecycleState::Starting,
            uptime_seconds: 0,
        }));
        assert!(events.contains(&EngineEvent::ResourceStateChanged {
            id: web1(),
            old_state: LifecycleState::Starting,
            new_state: LifecycleState::Running,
            uptime_seconds: 1,
        }));
        assert!(events.contains(&EngineEvent::PollTick {
            id: web1(),
            attempt: 2
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_anomaly_leaves_resource_untouched() {
        let (mut engine, gateway) = engine_with(vec![resource("web1", LifecycleState::Stopped, 0)]);
        gateway.push_status(Ok(status_report(false, false)));
        let before = engine.state.resource(&web1()).cloned();

        engine.process_message(Message::StartResource { id: web1() });
        engine.run_until(WAIT, idle).await.unwrap();

        assert_eq!(engine.state.resource(&web1()).cloned(), before);
        assert!(engine.state.locks.starting().is_none());
        assert!(engine.state.starting_message.is_none());
        let error = engine.state.error(ErrorArea::Summary).unwrap();
        assert_eq!(error.kind, ErrorKind::PollAnomaly);
        assert_eq!(error.message, "Server 'web1' failed to start properly");
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_one_start_reaches_the_server() {
        let (mut engine, gateway) = engine_with(vec![
            resource("web1", LifecycleState::Stopped, 0),
            resource("api", LifecycleState::Stopped, 0),
        ]);

        engine.process_message(Message::StartResource { id: web1() });
        engine.process_message(Message::StartResource { id: web1() });
        engine.process_message(Message::StartResource {
            id: ResourceId::from("api"),
        });
        engine.run_until(WAIT, idle).await.unwrap();

        assert_eq!(gateway.start_calls(), 1);
        assert_eq!(
            gateway.calls()[0],
            GatewayCall::Start("web1".to_string())
        );
        // Dropped requests surface nothing
        assert!(engine.state.error(ErrorArea::Summary).is_none());
    }

    // ─────────────────────────────────────────────────────────
    // Stop
    // ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_stop_applies_optimistically_then_confirms() {
        let (mut engine, gateway) =
            engine_with(vec![resource("web1", LifecycleState::Running, 3600)]);

        engine.process_message(Message::StopResource { id: web1() });

        let r = engine.state.resource(&web1()).unwrap().clone();
        assert_eq!(r.lifecycle_state, LifecycleState::Stopped);
        assert_eq!(r.uptime_seconds, 0);
        assert_eq!(engine.state.display_state(&r), LifecycleState::Stopping);
        assert_eq!(engine.state.summary().running_count, 0);

        engine.run_until(WAIT, idle).await.unwrap();

        let r = engine.state.resource(&web1()).unwrap().clone();
        assert_eq!(r.lifecycle_state, LifecycleState::Stopped);
        assert_eq!(engine.state.display_state(&r), LifecycleState::Stopped);
        assert_eq!(gateway.calls(), vec![GatewayCall::Stop("web1".to_string())]);
    }

    #[tokio::test]
    async fn test_failed_stop_restores_exact_prior_values() {
        let (mut engine, gateway) =
            engine_with(vec![resource("web1", LifecycleState::Running, 3600)]);
        gateway.push_stop(Err(Error::network("Unable to connect to server.")));
        let before = engine.state.resource(&web1()).cloned();

        engine.process_message(Message::StopResource { id: web1() });
        engine.run_until(WAIT, idle).await.unwrap();

        assert_eq!(engine.state.resource(&web1()).cloned(), before);
        assert_eq!(engine.state.summary().running_count, 1);
        assert!(!engine.state.stop_pending(&web1()));
        assert_eq!(
            engine.state.error(ErrorArea::Summary).unwrap().kind,
            ErrorKind::Network
        );
    }

    #[tokio::test]
    async fn test_stop_of_busy_resource_is_ignored() {
        let (mut engine, gateway) =
            engine_with(vec![resource("web1", LifecycleState::Running, 3600)]);

        engine.process_message(Message::StopResource { id: web1() });
        engine.process_message(Message::StopResource { id: web1() });
        engine.run_until(WAIT, idle).await.unwrap();

        assert_eq!(gateway.calls().len(), 1);
    }

    // ─────────────────────────────────────────────────────────
    // Listing
    // ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_empty_running_listing_zeroes_summary() {
        let (mut engine, gateway) =
            engine_with(vec![resource("web1", LifecycleState::Running, 3600)]);

        engine.process_message(Message::Refresh {
            scope: ListScope::Running,
        });
        engine
            .run_until(WAIT, |s| s.resources().is_empty())
            .await
            .unwrap();

        assert_eq!(engine.state.summary(), Summary::default());
        assert!(engine.state.resources().is_empty());
        assert_eq!(gateway.calls(), vec![GatewayCall::RunningServers]);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_listing() {
        let (mut engine, gateway) =
            engine_with(vec![resource("web1", LifecycleState::Running, 3600)]);
        gateway.push_list(Err(Error::server(500, "Server error: 500 - Internal Server Error")));

        engine.process_message(Message::Refresh {
            scope: ListScope::All,
        });
        engine
            .run_until(WAIT, |s| s.error(ErrorArea::Summary).is_some())
            .await
            .unwrap();

        assert_eq!(engine.state.resources().len(), 1);
        assert_eq!(engine.state.summary().running_count, 1);
    }

    // ─────────────────────────────────────────────────────────
    // Uploads
    // ─────────────────────────────────────────────────────────

    fn zip(name: &str, size: u64) -> ArchiveCandidate {
        ArchiveCandidate {
            path: format!("/tmp/{name}").into(),
            file_name: name.to_string(),
            size,
            media_type: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_archive_upload_with_background_extraction() {
        let gateway = Arc::new(ScriptedGateway::new());
        let mut done = extraction_status(ExtractionState::Completed, Some(100));
        done.extraction_path = Some("/srv/apps/site".to_string());
        gateway
            .push_archive(Ok(ArchiveUploadResponse {
                task_id: Some("task-1".to_string()),
                ..Default::default()
            }))
            .push_extraction(Ok(extraction_status(ExtractionState::InProgress, Some(50))))
            .push_extraction(Ok(done));
        gateway.set_archive_progress(vec![(512, 1024), (1024, 1024)]);
        let mut engine = Engine::new(Settings::default(), gateway.clone());
        let mut events = engine.subscribe();

        engine.process_message(Message::SelectArchive {
            candidate: zip("site.zip", 1024),
            source: SelectionSource::Drop,
        });
        engine.process_message(Message::ConfirmArchive);
        engine
            .run_until(WAIT, |s| {
                s.archive
                    .as_ref()
                    .is_some_and(|a| a.stage == UploadStage::Complete)
            })
            .await
            .unwrap();

        let session = engine.state.archive.as_ref().unwrap();
        assert_eq!(session.progress_percent, 100);
        assert_eq!(session.extraction_path.as_deref(), Some("/srv/apps/site"));

        // Completed sessions dismiss themselves
        engine
            .run_until(WAIT, |s| s.archive.is_none())
            .await
            .unwrap();

        let percents: Vec<u8> = drain_events(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                EngineEvent::UploadProgress {
                    progress_percent, ..
                } => Some(progress_percent),
                _ => None,
            })
            .collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert!(percents.contains(&45));
        assert!(percents.contains(&95));
        assert!(gateway
            .calls()
            .contains(&GatewayCall::CleanupExtraction("task-1".to_string())));
    }

    #[tokio::test]
    async fn test_rejected_archive_never_reaches_the_server() {
        let gateway = Arc::new(ScriptedGateway::new());
        let mut engine = Engine::new(Settings::default(), gateway.clone());

        engine.process_message(Message::SelectArchive {
            candidate: zip("notes.txt", 1024),
            source: SelectionSource::Browse,
        });
        engine.process_message(Message::ConfirmArchive);
        tokio::task::yield_now().await;
        engine.drain_pending_messages();

        let error = engine.state.error(ErrorArea::Archive).unwrap();
        assert_eq!(error.message, MSG_NOT_AN_ARCHIVE);
        assert_eq!(
            engine.state.archive.as_ref().unwrap().stage,
            UploadStage::Validating
        );
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_deploy_clears_dialog_and_shows_message() {
        let (mut engine, gateway) =
            engine_with(vec![resource("web1", LifecycleState::Running, 3600)]);

        engine.process_message(Message::OpenDeploy { id: web1() });
        engine.process_message(Message::SelectDeployFiles {
            files: vec!["/tmp/app.war".into()],
        });
        engine.process_message(Message::SubmitDeploy);
        engine.run_until(WAIT, idle).await.unwrap();

        assert!(engine.state.deploy.is_none());
        assert_eq!(
            engine.state.upload_status.as_ref().unwrap().text,
            "Files uploaded successfully to web1"
        );
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::UploadDeployables {
                name: "web1".to_string(),
                deployment_path: "/opt/web1/deployments".to_string(),
                files: vec!["/tmp/app.war".into()],
            }]
        );
    }

    // ─────────────────────────────────────────────────────────
    // Engine plumbing
    // ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_shutdown_emits_event() {
        let (mut engine, _) = engine_with(Vec::new());
        let mut rx = engine.subscribe();
        engine.shutdown();
        assert_eq!(rx.try_recv().unwrap(), EngineEvent::Shutdown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_times_out() {
        let (mut engine, _) = engine_with(Vec::new());
        let err = engine
            .run_until(Duration::from_secs(5), |_| false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[test]
    fn test_state_snapshot_capture() {
        let state = AppState::new();
        let snapshot = StateSnapshot::capture(&state);
        assert!(snapshot.resources.is_empty());
        assert_eq!(snapshot.errors.len(), 3);
        assert!(snapshot.archive.is_none());
    }
}
