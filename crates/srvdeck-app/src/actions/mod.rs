//! Action handlers: UpdateAction dispatch and background task spawning

use std::sync::Arc;

use tokio::sync::mpsc;

use srvdeck_gateway::Gateway;

use crate::config::Settings;
use crate::handler::UpdateAction;
use crate::message::Message;

mod guard;
pub mod poller;
pub(super) mod resource;
pub mod upload;

/// Execute an action by spawning a background task
pub fn handle_action<G: Gateway + Send + Sync + 'static>(
    action: UpdateAction,
    msg_tx: mpsc::Sender<Message>,
    gateway: Arc<G>,
    settings: &Settings,
) {
    match action {
        UpdateAction::FetchResources { scope } => {
            let host = settings.gateway.host.clone();
            tokio::spawn(async move {
                resource::fetch_resources(gateway.as_ref(), scope, &host, msg_tx).await;
            });
        }

        UpdateAction::StartResource { id, token } => {
            let poller = settings.poller.clone();
            tokio::spawn(resource::run_start(gateway, id, token, poller, msg_tx));
        }

        UpdateAction::StopResource { id, token } => {
            tokio::spawn(resource::run_stop(gateway, id, token, msg_tx));
        }

        UpdateAction::UploadDeployables {
            id,
            token,
            deployment_path,
            files,
        } => {
            tokio::spawn(resource::run_deploy(
                gateway,
                id,
                token,
                deployment_path,
                files,
                msg_tx,
            ));
        }

        UpdateAction::UploadArchive { seq, path } => {
            let upload = settings.upload.clone();
            tokio::spawn(upload::run_archive_upload(gateway, seq, path, upload, msg_tx));
        }

        UpdateAction::ScheduleArchiveDismiss { seq, delay } => {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = msg_tx.send(Message::ArchiveAutoDismiss { seq }).await;
            });
        }

        UpdateAction::ScheduleTransientClear { slot, id, delay } => {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = msg_tx.send(Message::ClearTransient { slot, id }).await;
            });
        }
    }
}
