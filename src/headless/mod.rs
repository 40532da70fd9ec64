//! Headless output - NDJSON on stdout
//!
//! Every line is one JSON object with an `event` field and a millisecond
//! `timestamp`. Engine events are forwarded as-is; command results add
//! their own lines.
//!
//! ```json
//! {"timestamp":1704700001000,"event":"resource_state_changed","id":"web1","old_state":"stopped","new_state":"starting","uptime_seconds":0}
//! {"timestamp":1704700011000,"event":"poll_tick","id":"web1","attempt":2}
//! ```

pub mod runner;

use std::io::{self, Write};

use chrono::Utc;
use serde::Serialize;
use tracing::error;

use srvdeck_app::{EngineEvent, ResourceView};
use srvdeck_core::{ErrorReport, Summary};
use srvdeck_gateway::StatusReport;

/// Lines written by commands in addition to engine events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CommandOutput {
    Resources {
        summary: Summary,
        resources: Vec<ResourceView>,
    },
    Status {
        name: String,
        #[serde(flatten)]
        report: StatusReport,
    },
    ConfigWritten {
        path: String,
    },
    Failed {
        command: String,
        error: ErrorReport,
    },
    Done {
        command: String,
    },
}

#[derive(Serialize)]
struct Line<'a, T: Serialize> {
    timestamp: i64,
    #[serde(flatten)]
    body: &'a T,
}

/// Write `body` to stdout as one NDJSON line
pub fn emit<T: Serialize>(body: &T) {
    let line = Line {
        timestamp: Utc::now().timestamp_millis(),
        body,
    };
    let json = match serde_json::to_string(&line) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize headless output: {}", e);
            return;
        }
    };

    let mut stdout = io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{}", json) {
        error!("Failed to write headless output to stdout: {}", e);
        return;
    }
    if let Err(e) = stdout.flush() {
        error!("Failed to flush headless stdout: {}", e);
    }
}

pub fn emit_event(event: &EngineEvent) {
    emit(event);
}
