//! Completion guard for background tasks that own state in `AppState`

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};

use srvdeck_core::prelude::*;

use crate::message::Message;

/// Sends a fallback message if dropped before [`CompletionGuard::complete`].
///
/// Tasks holding locks or an in-flight upload session create one up front, so
/// a panic or an aborted task still reaches the update loop. When the channel
/// is full the fallback is handed to a spawned task instead of being dropped.
pub(super) struct CompletionGuard {
    msg_tx: mpsc::Sender<Message>,
    on_abandon: Option<Message>,
}

impl CompletionGuard {
    pub(super) fn new(msg_tx: mpsc::Sender<Message>, on_abandon: Message) -> Self {
        Self {
            msg_tx,
            on_abandon: Some(on_abandon),
        }
    }

    pub(super) async fn complete(mut self, msg: Message) {
        self.on_abandon = None;
        if self.msg_tx.send(msg).await.is_err() {
            warn!("Message channel closed before a background task completed");
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let Some(msg) = self.on_abandon.take() else {
            return;
        };

        match self.msg_tx.try_send(msg) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(msg)) => match Handle::try_current() {
                Ok(handle) => {
                    let msg_tx = self.msg_tx.clone();
                    handle.spawn(async move {
                        let _ = msg_tx.send(msg).await;
                    });
                }
                Err(_) => error!("No runtime to report abandoned task: {:?}", msg),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{update, UpdateAction};
    use crate::message::ListScope;
    use crate::state::AppState;
    use srvdeck_core::ResourceId;
    use srvdeck_gateway::test_utils::server_info;
    use srvdeck_gateway::to_resources;

    #[tokio::test]
    async fn test_dropped_guard_sends_fallback() {
        let (tx, mut rx) = mpsc::channel(4);
        drop(CompletionGuard::new(
            tx,
            Message::ArchiveAutoDismiss { seq: 3 },
        ));

        assert!(matches!(
            rx.recv().await,
            Some(Message::ArchiveAutoDismiss { seq: 3 })
        ));
    }

    #[tokio::test]
    async fn test_completed_guard_sends_only_result() {
        let (tx, mut rx) = mpsc::channel(4);
        let guard = CompletionGuard::new(tx, Message::ArchiveAutoDismiss { seq: 3 });
        guard
            .complete(Message::Refresh {
                scope: ListScope::All,
            })
            .await;

        assert!(matches!(rx.recv().await, Some(Message::Refresh { .. })));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_abandoned_start_frees_slot_when_channel_full() {
        let mut state = AppState::new();
        state.replace_resources(to_resources(
            vec![server_info("web1", false), server_info("web2", false)],
            "localhost",
        ));
        let web1 = ResourceId::from("web1");
        let token = match update(&mut state, Message::StartResource { id: web1.clone() }).action {
            Some(UpdateAction::StartResource { token, .. }) => token,
            other => panic!("expected StartResource, got {other:?}"),
        };

        let (tx, mut rx) = mpsc::channel(1);
        tx.try_send(Message::ClearMessages).unwrap();
        drop(CompletionGuard::new(
            tx,
            Message::OperationAbandoned { id: web1.clone(), token },
        ));

        while let Some(msg) = rx.recv().await {
            update(&mut state, msg);
        }
        assert!(state.locks.starting().is_none());
        assert!(!state.is_busy(&web1));

        let next = update(
            &mut state,
            Message::StartResource {
                id: ResourceId::from("web2"),
            },
        );
        assert!(matches!(
            next.action,
            Some(UpdateAction::StartResource { .. })
        ));
    }
}
