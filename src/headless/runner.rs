//! Headless command runner
//!
//! Each command loads the listing it needs, feeds messages to the engine and
//! waits on the message channel until the operation settles. Engine events
//! are streamed to stdout as they are broadcast.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{eyre, Result};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use srvdeck_app::config::{init_config_dir, load_settings, validate_base_url};
use srvdeck_app::{
    ArchiveCandidate, Engine, EngineEvent, ErrorArea, ListScope, Message, SelectionSource,
};
use srvdeck_core::{Error, ErrorReport, ResourceId, UploadStage};
use srvdeck_gateway::{Gateway, HttpGateway};

use super::{emit, emit_event, CommandOutput};
use crate::Command;

type Outcome = std::result::Result<(), ErrorReport>;

/// Run one CLI command against the configured management server
pub async fn run(base_dir: &Path, base_url: Option<&str>, command: Command) -> Result<()> {
    if command == Command::Init {
        let path = init_config_dir(base_dir)?;
        emit(&CommandOutput::ConfigWritten {
            path: path.display().to_string(),
        });
        return Ok(());
    }

    let mut settings = load_settings(base_dir);
    if let Some(url) = base_url {
        validate_base_url(url)?;
        settings.gateway.base_url = url.to_string();
    }
    info!("Using management server at {}", settings.gateway.base_url);

    let gateway = Arc::new(HttpGateway::new(settings.gateway_config())?);
    let mut engine = Engine::new(settings, gateway);
    let printer = spawn_printer(engine.subscribe());

    let label = command_label(&command);
    let outcome = execute(&mut engine, command).await;

    engine.shutdown();
    drop(engine);
    let _ = printer.await;

    match outcome {
        Ok(()) => {
            emit(&CommandOutput::Done { command: label });
            Ok(())
        }
        Err(error) => {
            emit(&CommandOutput::Failed {
                command: label,
                error: error.clone(),
            });
            Err(eyre!(error.message))
        }
    }
}

fn spawn_printer(mut rx: broadcast::Receiver<EngineEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => emit_event(&event),
                Err(RecvError::Lagged(n)) => warn!("Dropped {} engine events", n),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn command_label(command: &Command) -> String {
    match command {
        Command::Summary => "summary",
        Command::List => "list",
        Command::Status { .. } => "status",
        Command::Start { .. } => "start",
        Command::Stop { .. } => "stop",
        Command::Deploy { .. } => "deploy",
        Command::UploadZip { .. } => "upload-zip",
        Command::Init => "init",
    }
    .to_string()
}

async fn execute<G: Gateway + Send + Sync + 'static>(
    engine: &mut Engine<G>,
    command: Command,
) -> Outcome {
    match command {
        Command::Summary => {
            refresh(engine, ListScope::Running).await?;
            print_resources(engine);
            Ok(())
        }
        Command::List => {
            refresh(engine, ListScope::All).await?;
            print_resources(engine);
            Ok(())
        }
        Command::Status { name } => {
            let report = engine
                .gateway()
                .server_status(&name)
                .await
                .map_err(|e| e.report())?;
            emit(&CommandOutput::Status { name, report });
            Ok(())
        }
        Command::Start { name } => start(engine, ResourceId::from(name)).await,
        Command::Stop { name } => stop(engine, ResourceId::from(name)).await,
        Command::Deploy { name, files } => deploy(engine, ResourceId::from(name), files).await,
        Command::UploadZip { archive } => upload_zip(engine, &archive).await,
        Command::Init => Ok(()),
    }
}

fn print_resources<G: Gateway + Send + Sync + 'static>(engine: &Engine<G>) {
    emit(&CommandOutput::Resources {
        summary: engine.state.summary(),
        resources: engine.state.views(),
    });
}

fn request_budget<G: Gateway + Send + Sync + 'static>(engine: &Engine<G>) -> Duration {
    Duration::from_secs(engine.settings().gateway.request_timeout_secs) * 2
}

async fn wait<G: Gateway + Send + Sync + 'static>(
    engine: &mut Engine<G>,
    budget: Duration,
    done: impl FnMut(&srvdeck_app::AppState) -> bool,
) -> Outcome {
    engine.run_until(budget, done).await.map_err(|e| e.report())
}

fn summary_error<G: Gateway + Send + Sync + 'static>(engine: &Engine<G>) -> Outcome {
    match engine.state.error(ErrorArea::Summary) {
        Some(error) => Err(error.clone()),
        None => Ok(()),
    }
}

async fn refresh<G: Gateway + Send + Sync + 'static>(
    engine: &mut Engine<G>,
    scope: ListScope,
) -> Outcome {
    let before = engine.state.last_refreshed;
    engine.process_message(Message::ClearMessages);
    engine.process_message(Message::Refresh { scope });

    let budget = request_budget(engine);
    wait(engine, budget, |s| {
        s.last_refreshed != before || s.error(ErrorArea::Summary).is_some()
    })
    .await?;
    summary_error(engine)
}

/// Load the full listing and make sure `id` is in it
async fn load_resource<G: Gateway + Send + Sync + 'static>(
    engine: &mut Engine<G>,
    id: &ResourceId,
) -> Outcome {
    refresh(engine, ListScope::All).await?;
    if engine.state.resource(id).is_none() {
        return Err(Error::not_found(id).report());
    }
    Ok(())
}

async fn start<G: Gateway + Send + Sync + 'static>(
    engine: &mut Engine<G>,
    id: ResourceId,
) -> Outcome {
    load_resource(engine, &id).await?;

    engine.process_message(Message::StartResource { id: id.clone() });
    if !engine.state.is_busy(&id) {
        return Err(ErrorReport::validation(format!(
            "Server '{}' is busy; try again shortly",
            id
        )));
    }

    let budget = engine.settings().poller.budget() + request_budget(engine);
    wait(engine, budget, |s| !s.is_busy(&id)).await?;
    summary_error(engine)
}

async fn stop<G: Gateway + Send + Sync + 'static>(
    engine: &mut Engine<G>,
    id: ResourceId,
) -> Outcome {
    load_resource(engine, &id).await?;

    engine.process_message(Message::StopResource { id: id.clone() });
    if !engine.state.is_busy(&id) {
        return Err(ErrorReport::validation(format!(
            "Server '{}' is not running",
            id
        )));
    }

    let budget = request_budget(engine);
    wait(engine, budget, |s| !s.is_busy(&id)).await?;
    summary_error(engine)
}

async fn deploy<G: Gateway + Send + Sync + 'static>(
    engine: &mut Engine<G>,
    id: ResourceId,
    files: Vec<PathBuf>,
) -> Outcome {
    load_resource(engine, &id).await?;

    engine.process_message(Message::OpenDeploy { id: id.clone() });
    if engine.state.deploy.is_none() {
        return summary_error(engine);
    }
    engine.process_message(Message::SelectDeployFiles { files });
    engine.process_message(Message::SubmitDeploy);

    if let Some(error) = engine.state.error(ErrorArea::Deploy) {
        return Err(error.clone());
    }

    let budget = Duration::from_secs(engine.settings().gateway.upload_timeout_secs)
        + request_budget(engine);
    wait(engine, budget, |s| !s.is_busy(&id)).await?;

    match engine.state.error(ErrorArea::Deploy) {
        Some(error) => Err(error.clone()),
        None => Ok(()),
    }
}

async fn upload_zip<G: Gateway + Send + Sync + 'static>(
    engine: &mut Engine<G>,
    archive: &Path,
) -> Outcome {
    let candidate = ArchiveCandidate::from_path(archive).map_err(|e| Error::from(e).report())?;

    engine.process_message(Message::SelectArchive {
        candidate,
        source: SelectionSource::Browse,
    });
    if let Some(error) = engine.state.error(ErrorArea::Archive) {
        return Err(error.clone());
    }
    engine.process_message(Message::ConfirmArchive);

    let settings = engine.settings();
    let budget = Duration::from_secs(settings.gateway.upload_timeout_secs)
        + settings.upload.extraction_budget()
        + request_budget(engine);
    wait(engine, budget, |s| {
        s.archive.as_ref().map_or(true, |a| a.stage.is_terminal())
    })
    .await?;

    match engine.state.archive.as_ref() {
        Some(session) if session.stage == UploadStage::Failed => Err(session
            .error
            .clone()
            .unwrap_or_else(|| ErrorReport::validation("Upload failed. Please try again."))),
        _ => Ok(()),
    }
}
