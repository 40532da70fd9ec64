//! Message processing
//!
//! Runs a message through the TEA update function, dispatches the resulting
//! action and keeps going while handlers return follow-up messages.

use std::sync::Arc;

use tokio::sync::mpsc;

use srvdeck_gateway::Gateway;

use crate::actions::handle_action;
use crate::handler;
use crate::message::Message;
use crate::state::AppState;

/// Process a message through the TEA update function
pub fn process_message<G: Gateway + Send + Sync + 'static>(
    state: &mut AppState,
    message: Message,
    msg_tx: &mpsc::Sender<Message>,
    gateway: &Arc<G>,
) {
    let mut msg = Some(message);
    while let Some(m) = msg {
        let result = handler::update(state, m);

        if let Some(action) = result.action {
            handle_action(action, msg_tx.clone(), Arc::clone(gateway), &state.settings);
        }

        // Continue with follow-up message
        msg = result.message;
    }
}
