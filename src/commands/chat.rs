use crate::db::models::{chat_title, Chat, Message, Role, DEFAULT_CHAT_TITLE};
use crate::error::AppError;
use crate::session::SessionContext;
use crate::speech::question_from_transcript;
use crate::state::AppState;

pub async fn new_chat(state: &AppState, ctx: &mut SessionContext) -> Result<Chat, AppError> {
    let chat = state.store.create_chat(DEFAULT_CHAT_TITLE).await?;
    ctx.activate(chat.id.clone(), Vec::new());
    Ok(chat)
}

pub async fn list_chats(state: &AppState) -> Result<Vec<Chat>, AppError> {
    Ok(state.store.list_chats().await?)
}

pub async fn select_chat(
    state: &AppState,
    ctx: &mut SessionContext,
    chat_id: &str,
) -> Result<(), AppError> {
    let messages = state.store.get_messages(chat_id).await?;
    ctx.activate(chat_id.to_string(), messages);
    Ok(())
}

pub async fn delete_chat(
    state: &AppState,
    ctx: &mut SessionContext,
    chat_id: &str,
) -> Result<(), AppError> {
    state.store.delete_chat(chat_id).await?;
    if ctx.chat_id.as_deref() == Some(chat_id) {
        ctx.clear();
    }
    tracing::info!(%chat_id, "deleted chat");
    Ok(())
}

/// One user turn: persist the question, answer it, persist the answer.
///
/// The user message is saved before generation and is not rolled back if
/// generation or the second write fails.
pub async fn send_message(
    state: &AppState,
    ctx: &mut SessionContext,
    content: &str,
) -> Result<Message, AppError> {
    let chat_id = ctx.ensure_chat(state.store.as_ref()).await?;

    let first_question = !ctx.messages.iter().any(|m| m.role == Role::User);
    if first_question {
        state
            .store
            .update_chat_title(&chat_id, &chat_title(content))
            .await?;
    }

    let user_msg = state.store.add_message(&chat_id, Role::User, content).await?;
    ctx.messages.push(user_msg);

    let reply = state.pipeline.answer(content, &ctx.messages, &chat_id).await?;

    let assistant_msg = state
        .store
        .add_message(&chat_id, Role::Assistant, &reply)
        .await?;
    ctx.messages.push(assistant_msg.clone());
    Ok(assistant_msg)
}

/// Transcribe recorded audio and ask it as a question.
///
/// Audio with no recognisable words is asked as the "could not understand"
/// sentence, exactly as if the user had typed it.
pub async fn voice_message(
    state: &AppState,
    ctx: &mut SessionContext,
    audio: Vec<u8>,
    file_name: &str,
) -> Result<(String, Message), AppError> {
    let transcriber = state
        .transcriber
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("speech input is not configured".into()))?;
    let transcript = transcriber.transcribe(audio, file_name).await?;
    let question = question_from_transcript(&transcript);
    let reply = send_message(state, ctx, &question).await?;
    Ok((question, reply))
}
