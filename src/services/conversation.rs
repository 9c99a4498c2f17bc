use crate::config::TITLE_MAX_CHARS;
use crate::models::Conversation;

/// Truncate text to a short title for conversations.
pub fn truncate_title(text: &str) -> String {
    if text.chars().count() > TITLE_MAX_CHARS {
        let boundary = text
            .char_indices()
            .nth(TITLE_MAX_CHARS - 1)
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        format!("{}…", &text[..boundary])
    } else {
        text.to_string()
    }
}

/// The title a conversation should take once its first exchange finishes, if
/// it still carries the default one.
pub fn derived_title(conversation: &Conversation) -> Option<String> {
    if !conversation.has_default_title() {
        return None;
    }
    conversation
        .first_user_message()
        .map(|m| truncate_title(&m.content))
}

/// Case-insensitive substring search over titles and message contents.
/// A blank query keeps everything, in order.
pub fn filter_conversations<'a>(
    query: &str,
    conversations: &'a [Conversation],
) -> Vec<&'a Conversation> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return conversations.iter().collect();
    }
    conversations
        .iter()
        .filter(|c| {
            c.title.to_lowercase().contains(&query)
                || c.messages
                    .iter()
                    .any(|m| m.content.to_lowercase().contains(&query))
        })
        .collect()
}

/// Split into (pinned, unpinned), each keeping collection order.
pub fn partition_pinned<'a, I>(conversations: I) -> (Vec<&'a Conversation>, Vec<&'a Conversation>)
where
    I: IntoIterator<Item = &'a Conversation>,
{
    conversations.into_iter().partition(|c| c.pinned)
}
