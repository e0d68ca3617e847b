//! Dangling tool-use repair (spec §4.3, §8 "Dangling tool-use freedom"): if
//! streaming fails or is cancelled after tool-use blocks were recorded but
//! before a matching tool-role message was persisted, the conversation is
//! left well-formed by synthesizing error tool-results for every unresolved
//! call id.

use ac_core::{ContentPart, Message, Role};

pub const INTERRUPTED_MESSAGE: &str = "Tool execution was interrupted";

/// Build the synthetic tool-role message that repairs `assistant`, or
/// `None` if it isn't dangling given `following`.
pub fn repair_dangling(assistant: &Message, following: Option<&Message>) -> Option<Message> {
    if !assistant.is_dangling(following) {
        return None;
    }

    let already_resolved: Vec<_> = following.map(Message::tool_result_call_ids).unwrap_or_default();

    let mut repair = Message::new(assistant.session_id, Role::Tool);
    for part in &assistant.parts {
        let (call_id, name) = match part {
            ContentPart::ToolUse { call_id, name, .. } => (*call_id, name.clone()),
            _ => continue,
        };
        if already_resolved.contains(&call_id) {
            continue;
        }
        repair.parts.push(ContentPart::ToolResult {
            call_id,
            name,
            content: INTERRUPTED_MESSAGE.to_string(),
            metadata: Default::default(),
            is_error: true,
            structured_output: false,
        });
    }

    if repair.parts.is_empty() {
        return None;
    }
    Some(repair)
}

/// Scan a loaded history for a trailing dangling assistant message (the
/// turn loop calls this once at the top of a turn, before appending the new
/// user message, to repair anything left over from a previous interrupted
/// turn on this session).
pub fn repair_history(messages: &mut Vec<Message>) {
    let last_assistant_idx = messages.iter().rposition(|m| m.role == Role::Assistant);
    let Some(idx) = last_assistant_idx else { return };

    let following = messages.get(idx + 1).cloned();
    let Some(repair) = repair_dangling(&messages[idx], following.as_ref()) else { return };

    match messages.get_mut(idx + 1) {
        Some(existing) if existing.role == Role::Tool => {
            existing.parts.extend(repair.parts);
        }
        _ => messages.insert(idx + 1, repair),
    }
}
