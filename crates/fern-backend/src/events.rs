use crate::types::{BackendEvent, ProgressEvent};

/// Translate one raw backend event into the neutral progress stream shape.
/// Unrecognized `kind`s collapse to `SessionStatus` rather than being
/// dropped, so a protocol addition on the backend side degrades gracefully
/// instead of silently vanishing.
pub fn translate(event: &BackendEvent) -> ProgressEvent {
    match event.kind.as_str() {
        "tool_start" => ProgressEvent::ToolStart {
            tool: event.tool.clone().unwrap_or_default(),
        },
        "tool_complete" => ProgressEvent::ToolComplete {
            tool: event.tool.clone().unwrap_or_default(),
            message: event.message.clone(),
        },
        "tool_error" => ProgressEvent::ToolError {
            tool: event.tool.clone().unwrap_or_default(),
            message: event.message.clone(),
        },
        "text" => ProgressEvent::Text {
            message: event.message.clone().unwrap_or_default(),
        },
        "thinking" => ProgressEvent::Thinking {
            message: event.message.clone().unwrap_or_default(),
        },
        "session.idle" => ProgressEvent::SessionIdle,
        "session.error" => ProgressEvent::SessionError {
            message: event.message.clone(),
        },
        _ => ProgressEvent::SessionStatus {
            message: event.message.clone(),
        },
    }
}

/// Cross-talk protection: an event only applies to a turn awaiting
/// `session_id` if it carries a matching session id. Events with a missing
/// or differing session id are dropped by the caller before translation.
pub fn matches_session(event: &BackendEvent, session_id: &str) -> bool {
    event.session_id.as_deref() == Some(session_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(kind: &str, session_id: Option<&str>) -> BackendEvent {
        BackendEvent {
            kind: kind.to_string(),
            session_id: session_id.map(String::from),
            tool: None,
            message: None,
        }
    }

    #[test]
    fn session_idle_translates() {
        assert!(matches!(
            translate(&ev("session.idle", Some("s1"))),
            ProgressEvent::SessionIdle
        ));
    }

    #[test]
    fn mismatched_session_is_filtered_by_caller() {
        let event = ev("session.idle", Some("s2"));
        assert!(!matches_session(&event, "s1"));
    }

    #[test]
    fn missing_session_id_is_filtered() {
        let event = ev("session.idle", None);
        assert!(!matches_session(&event, "s1"));
    }
}
