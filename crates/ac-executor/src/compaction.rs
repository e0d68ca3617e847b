//! Context-window compaction: deciding when to summarize, and pruning
//! history around a summary cut point (spec §4.3).

use ac_core::{ContentPart, Message, Role};

/// Fraction of the context window at which a turn must summarize before
/// continuing, rather than risk overrunning the model's input limit.
pub const COMPACTION_THRESHOLD: f64 = 0.95;

/// Whether the turn should summarize before its next provider call. Never
/// true on the first cycle of a turn, since a single user message plus the
/// system prompt cannot itself be the cause of an overrun worth reacting to
/// mid-turn.
pub fn should_compact(estimated_tokens: u64, context_window: u64, is_first_cycle: bool) -> bool {
    if is_first_cycle || context_window == 0 {
        return false;
    }
    (estimated_tokens as f64 / context_window as f64) >= COMPACTION_THRESHOLD
}

/// Keep only messages at or after `summary_message_id`, dropping anything
/// older. A summary always starts a fresh window: any tool-role message at
/// the very front of the remaining slice whose call ids don't resolve
/// within the kept slice is itself dropped, since its matching tool-use
/// message was summarized away.
pub fn filter_from_summary(messages: Vec<Message>, summary_message_id: Option<ac_core::MessageId>) -> Vec<Message> {
    let Some(summary_id) = summary_message_id else {
        return messages;
    };

    let cut = messages.iter().position(|m| m.id == summary_id);
    let mut kept: Vec<Message> = match cut {
        Some(idx) => messages[idx..].to_vec(),
        None => messages,
    };

    prune_leading_orphan_tool_messages(&mut kept);
    kept
}

/// Apply both halves of a compaction cut: filter down to the summary
/// message, then rewrite its role to `user` so it reads as the new
/// synthetic start of the conversation (spec §4.3 step 2).
pub fn apply_summary_cut(messages: Vec<Message>, summary_message_id: Option<ac_core::MessageId>) -> Vec<Message> {
    let mut kept = filter_from_summary(messages, summary_message_id);
    if let Some(summary_id) = summary_message_id {
        if let Some(first) = kept.first_mut() {
            if first.id == summary_id {
                first.role = Role::User;
            }
        }
    }
    kept
}

/// Drop tool-role messages at the front of `messages` that reference call
/// ids with no preceding tool-use message in the slice to match against.
fn prune_leading_orphan_tool_messages(messages: &mut Vec<Message>) {
    while let Some(first) = messages.first() {
        if first.role != Role::Tool {
            break;
        }
        let orphaned = first
            .tool_result_call_ids()
            .into_iter()
            .all(|id| !messages.iter().any(|m| m.tool_use_call_ids().contains(&id)));
        if orphaned {
            messages.remove(0);
        } else {
            break;
        }
    }
}

/// Compacting a long turn mid-flight still needs the most recent tool
/// call/response pair intact, since the model's next turn may refer back to
/// it. Everything older becomes eligible for summarization.
pub fn preserve_last_tool_pair(messages: &[Message]) -> Option<(Message, Message)> {
    for window in messages.windows(2).rev() {
        let [assistant, tool] = window else { continue };
        if assistant.role == Role::Assistant
            && tool.role == Role::Tool
            && !assistant.tool_use_call_ids().is_empty()
        {
            return Some((assistant.clone(), tool.clone()));
        }
    }
    None
}

/// Crude token estimate used only to decide whether compaction is needed,
/// not for billing. ~4 characters per token, matching the provider test
/// double's estimator.
pub fn estimate_tokens(messages: &[Message]) -> u64 {
    let chars: usize = messages
        .iter()
        .flat_map(|m| m.parts.iter())
        .map(content_part_len)
        .sum();
    (chars / 4) as u64
}

fn content_part_len(part: &ContentPart) -> usize {
    match part {
        ContentPart::Text { text } | ContentPart::Reasoning { text } => text.len(),
        ContentPart::ToolResult { content, .. } => content.len(),
        ContentPart::ToolUse { input, .. } => input.to_string().len(),
        ContentPart::Attachment { .. } | ContentPart::Finish { .. } => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_core::SessionId;

    #[test]
    fn should_compact_is_false_on_first_cycle_regardless_of_size() {
        assert!(!should_compact(1_000_000, 100_000, true));
    }

    #[test]
    fn should_compact_triggers_at_95_percent() {
        assert!(should_compact(95_000, 100_000, false));
        assert!(!should_compact(94_000, 100_000, false));
    }

    #[test]
    fn filter_from_summary_drops_everything_before_the_summary_message() {
        let session = SessionId::new();
        let before = Message::new(session, Role::User);
        let summary = Message::new(session, Role::Assistant);
        let summary_id = summary.id;
        let after = Message::new(session, Role::User);

        let kept = filter_from_summary(vec![before, summary, after], Some(summary_id));
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].id, summary_id);
    }

    #[test]
    fn apply_summary_cut_rewrites_the_summary_messages_role_to_user() {
        let session = SessionId::new();
        let summary = Message::new(session, Role::Assistant);
        let summary_id = summary.id;

        let kept = apply_summary_cut(vec![summary], Some(summary_id));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].role, Role::User);
    }

    #[test]
    fn filter_from_summary_is_a_no_op_without_a_summary() {
        let session = SessionId::new();
        let messages = vec![Message::new(session, Role::User), Message::new(session, Role::Assistant)];
        let kept = filter_from_summary(messages.clone(), None);
        assert_eq!(kept.len(), messages.len());
    }

    #[test]
    fn leading_orphan_tool_message_is_pruned_after_a_summary_cut() {
        let session = SessionId::new();
        let summary = Message::new(session, Role::Assistant);
        let summary_id = summary.id;

        let mut orphan_tool = Message::new(session, Role::Tool);
        orphan_tool.parts.push(ContentPart::ToolResult {
            call_id: ac_core::ToolCallId::new(),
            name: "view".into(),
            content: "x".into(),
            metadata: Default::default(),
            is_error: false,
            structured_output: false,
        });

        let kept = filter_from_summary(vec![summary, orphan_tool], Some(summary_id));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, summary_id);
    }
}
