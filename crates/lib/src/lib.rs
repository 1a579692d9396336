//! Mailchat core library: parses chat messages into email commands, dispatches them to a
//! mail backend, and falls back to a chat provider for everything else.

pub mod chat;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod gateway;
pub mod llm;
pub mod mail;
