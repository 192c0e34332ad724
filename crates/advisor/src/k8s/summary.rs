//! Line-based summary of a resource's state.

use super::types::{ResourceObject, StateDetail};
use crate::text::truncate_chars;

/// Summary used when the resource could not be read.
pub const RESOURCE_NOT_FETCHED: &str = "(resource not fetched)";

/// Maximum characters in a resource summary.
pub const MAX_SUMMARY_CHARS: usize = 2000;

/// Maximum characters kept from a waiting-state message.
const MAX_WAITING_MESSAGE_CHARS: usize = 200;

/// Summarize phase and first-container state as `key=value` lines.
///
/// Fields missing from the object are left out rather than rendered empty.
pub fn summarize_resource(resource: Option<&ResourceObject>) -> String {
    let Some(resource) = resource else {
        return RESOURCE_NOT_FETCHED.to_string();
    };

    let mut lines = Vec::new();
    let status = resource.status.as_ref();

    if let Some(phase) = status.and_then(|s| s.phase.as_deref()) {
        lines.push(format!("phase={phase}"));
    }

    let first = status
        .and_then(|s| s.container_statuses.as_deref())
        .and_then(<[_]>::first);

    if let Some(container) = first {
        if let Some(name) = &container.name {
            lines.push(format!("container={name}"));
        }
        if let Some(restarts) = container.restart_count {
            lines.push(format!("restartCount={restarts}"));
        }

        let state = container.state.as_ref();
        if let Some(waiting) = state.and_then(|s| s.waiting.as_ref()) {
            if let Some(reason) = &waiting.reason {
                lines.push(format!("state.waiting.reason={reason}"));
            }
            if let Some(message) = &waiting.message {
                lines.push(format!(
                    "state.waiting.message={}",
                    truncate_chars(message, MAX_WAITING_MESSAGE_CHARS)
                ));
            }
        }
        if let Some(terminated) = state.and_then(|s| s.terminated.as_ref()) {
            push_terminated(&mut lines, "state", terminated);
        }
        if let Some(terminated) = container
            .last_state
            .as_ref()
            .and_then(|s| s.terminated.as_ref())
        {
            push_terminated(&mut lines, "last", terminated);
        }
    }

    truncate_chars(&lines.join("\n"), MAX_SUMMARY_CHARS).to_string()
}

fn push_terminated(lines: &mut Vec<String>, prefix: &str, terminated: &StateDetail) {
    if let Some(reason) = &terminated.reason {
        lines.push(format!("{prefix}.terminated.reason={reason}"));
    }
    if let Some(code) = terminated.exit_code {
        lines.push(format!("{prefix}.terminated.exitCode={code}"));
    }
}
