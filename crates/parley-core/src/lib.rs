//! Core types and trait definitions for the Parley chat backend.
//!
//! Nothing here talks HTTP or SQL. Storage, the completion service and blob
//! storage plug in through the traits below; [`chat::ChatService`]
//! coordinates them.

// Trait methods return explicit `Send` futures; silence the advisory lint.
#![allow(async_fn_in_trait)]

pub mod attachment;
pub mod blob;
pub mod chat;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod store;
pub mod title;
pub mod user;

pub use error::{Error, ErrorKind, Result};
