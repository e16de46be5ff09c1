//! Prompt assembly.

use ragbase_core::{Message, Role};

/// The placeholder in a system prompt that receives the formatted context.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// The answer given when the documents do not cover the question.
pub const NOT_FOUND_ANSWER: &str = "The document does not provide this information.";

/// The grounded system prompt.
pub const SYSTEM_PROMPT: &str = r#"
Respond strictly and exclusively based on the information contained within the uploaded document.

    Do not provide comparisons, inferences, or additional information not explicitly stated in the document.
    If the document does not address the query directly, respond with:
    "The document does not provide this information."

Response Guidelines:

    Respond in a concise manner (maximum of 3 sentences).
    Use only the language, phrasing, and terminology explicitly present in the document.
    Avoid introducing any external terms, concepts, or interpretations.
    When information is absent or incomplete, clearly state its absence as per the above directive.

Context: {context}

Use markdown formatting where appropriate."#;

/// History before the current question.
///
/// Callers usually append the question to history before asking; a trailing
/// user message equal to `question` is that same turn and is dropped here so
/// the model sees it once.
pub fn prior_turns<'a>(history: &'a [Message], question: &str) -> &'a [Message] {
    match history.split_last() {
        Some((last, rest)) if last.role == Role::User && last.content == question => rest,
        _ => history,
    }
}

/// System prompt with context, then prior turns, then the question.
pub fn grounded_messages(
    system_prompt: &str,
    context: &str,
    history: &[Message],
    question: &str,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(system_prompt.replace(CONTEXT_PLACEHOLDER, context)));
    messages.extend_from_slice(prior_turns(history, question));
    messages.push(Message::user(question));
    messages
}

/// Prior turns and the question, with no system prompt.
pub fn context_free_messages(history: &[Message], question: &str) -> Vec<Message> {
    let mut messages = prior_turns(history, question).to_vec();
    messages.push(Message::user(question));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_lands_in_system_prompt() {
        let messages = grounded_messages(SYSTEM_PROMPT, "Alpha.\n----", &[], "What?");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Context: Alpha.\n----"));
        assert!(!messages[0].content.contains(CONTEXT_PLACEHOLDER));
        assert!(messages[0].content.contains(NOT_FOUND_ANSWER));
        assert_eq!(messages[1], Message::user("What?"));
    }

    #[test]
    fn trailing_question_is_not_duplicated() {
        let history =
            vec![Message::user("q1"), Message::assistant("a1"), Message::user("q2")];
        let messages = grounded_messages("{context}", "", &history, "q2");
        let users: Vec<_> =
            messages.iter().filter(|m| m.content == "q2").collect();
        assert_eq!(users.len(), 1);
        assert_eq!(&messages[1..3], &history[..2]);
    }

    #[test]
    fn unrelated_trailing_message_is_kept() {
        let history = vec![Message::user("earlier")];
        let messages = context_free_messages(&history, "now");
        assert_eq!(messages, vec![Message::user("earlier"), Message::user("now")]);
    }
}
