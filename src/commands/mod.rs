//! Handlers behind the interactive session. Each takes the shared state and
//! the caller's `SessionContext` explicitly.

pub mod chat;
pub mod knowledge;
