//! Selection policy: decides which messages are eligible for compression.

use crate::types::{Message, MessageRole};

/// Selects a contiguous, eligible prefix of `recent_messages` to compress.
///
/// Rules (§4.3 selection policy):
/// - The current system prompt is never part of `recent_messages` and is
///   therefore never selected.
/// - The most recent `keep_recent` messages are never selected.
/// - The remaining prefix is eligible regardless of role; both user and
///   assistant turns are summarized together (both lie inside the same
///   returned range) so the original request is never lost.
/// - The boundary is rounded to a user+assistant pair boundary when
///   possible, and a tool-call message is never separated from its
///   tool-result message (they are kept together or both excluded).
pub fn select_eligible_range(recent_messages: &[Message], keep_recent: usize) -> Option<Vec<usize>> {
    if recent_messages.len() <= keep_recent {
        return None;
    }

    let mut boundary = recent_messages.len().saturating_sub(keep_recent);
    boundary = round_to_pair_boundary(recent_messages, boundary);
    boundary = avoid_splitting_tool_pair(recent_messages, boundary);

    if boundary == 0 {
        return None;
    }

    Some((0..boundary).collect())
}

/// Moves `boundary` backward, if needed, so it falls right after an
/// assistant message that closes a user+assistant pair rather than in the
/// middle of one.
fn round_to_pair_boundary(messages: &[Message], boundary: usize) -> usize {
    if boundary == 0 || boundary >= messages.len() {
        return boundary;
    }
    // If the message just before the boundary is a user message whose
    // answer (the message at `boundary`) would be kept, pull the boundary
    // back one so the pair stays together on the "keep" side.
    if messages[boundary - 1].role == MessageRole::User && messages[boundary].role == MessageRole::Assistant {
        return boundary - 1;
    }
    boundary
}

/// Walks `boundary` backward past any tool-call/tool-result pair that would
/// otherwise be split by the cut.
fn avoid_splitting_tool_pair(messages: &[Message], mut boundary: usize) -> usize {
    while boundary > 0 && boundary < messages.len() {
        let before = &messages[boundary - 1];
        let after = &messages[boundary];
        let splits_pair = before.is_tool_linked()
            && after.is_tool_linked()
            && after.tool_result_ref.as_deref() == before.tool_calls.first().map(|c| c.id.as_str());
        if splits_pair {
            boundary -= 1;
        } else {
            break;
        }
    }
    boundary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SimpleTokenCounter, ToolCall};

    fn msg(role: MessageRole) -> Message {
        Message::new(role, "x", &SimpleTokenCounter)
    }

    #[test]
    fn keeps_at_least_keep_recent_messages() {
        let messages: Vec<Message> = (0..10).map(|_| msg(MessageRole::User)).collect();
        let range = select_eligible_range(&messages, 5).unwrap();
        assert_eq!(range.len(), 5);
    }

    #[test]
    fn returns_none_when_not_enough_messages() {
        let messages: Vec<Message> = (0..3).map(|_| msg(MessageRole::User)).collect();
        assert!(select_eligible_range(&messages, 5).is_none());
    }

    #[test]
    fn never_splits_a_tool_call_from_its_result() {
        let mut assistant = msg(MessageRole::Assistant);
        assistant.tool_calls.push(ToolCall {
            id: "call-1".into(),
            name: "search".into(),
            arguments: "{}".into(),
        });
        let mut tool_result = msg(MessageRole::Tool);
        tool_result.tool_result_ref = Some("call-1".into());

        let mut messages = vec![msg(MessageRole::User)];
        messages.push(assistant);
        messages.push(tool_result);
        for _ in 0..4 {
            messages.push(msg(MessageRole::User));
        }

        // keep_recent = 4 would normally cut right between the assistant
        // tool-call and its tool-result; the boundary must move back.
        let range = select_eligible_range(&messages, 4).unwrap();
        let cut = range.len();
        let before = &messages[cut - 1];
        let after = &messages[cut];
        let split = before.is_tool_linked()
            && after.is_tool_linked()
            && after.tool_result_ref.as_deref() == before.tool_calls.first().map(|c| c.id.as_str());
        assert!(!split, "tool-call/tool-result pair must not be split");
    }
}
