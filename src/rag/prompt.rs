//! Prompt assembly for document-grounded answers.
//!
//! The prompt is a single block of text with four sections in a fixed order:
//! the instruction preamble, the recent conversation, the retrieved documents
//! and the question. Conversational memory exists only through the second
//! section; the model receives no native chat history.

use crate::db::models::Message;

pub const NO_CONTEXT_PLACEHOLDER: &str = "None";
pub const NO_DOCUMENTS_PLACEHOLDER: &str = "No relevant documents found.";

pub const INSTRUCTION_PREAMBLE: &str = "\
You are a helpful assistant that uses both uploaded documents and general knowledge to answer questions.

Instructions:
1. **PRIORITIZE** information from the provided 'Documents' (Source of Truth).
2. If the answer is found in the 'Documents', cite or use that information clearly.
3. If the answer is **NOT** in the 'Documents', you may use your general knowledge to answer the question.
4. Explicitly mention if you are using general knowledge vs document knowledge if it's ambiguous.
5. Maintain the flow of the conversation based on the 'Conversation context'.";

/// The last `window` messages, oldest first, one `role: content` line each.
pub fn render_history(history: &[Message], window: usize) -> String {
    let start = history.len().saturating_sub(window);
    history[start..]
        .iter()
        .map(|m| format!("{}: {}\n", m.role, m.content))
        .collect()
}

pub fn compose_prompt(context: &str, documents: &str, question: &str) -> String {
    let context = if context.is_empty() {
        NO_CONTEXT_PLACEHOLDER
    } else {
        context
    };
    let documents = if documents.is_empty() {
        NO_DOCUMENTS_PLACEHOLDER
    } else {
        documents
    };

    format!(
        "{INSTRUCTION_PREAMBLE}\n\n\
         Conversation context:\n{context}\n\n\
         Documents (Source of Truth):\n{documents}\n\n\
         Question: {question}\n"
    )
}
