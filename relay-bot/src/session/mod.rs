//! Per-chat conversation state.
//!
//! Sessions live only in memory: a restart forgets every conversation, and
//! a `/start` after `/cancel` begins with no memory of the previous choice.

mod manager;

pub use manager::{Session, SessionHandle, SessionManager, State};
