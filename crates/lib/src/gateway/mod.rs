//! Gateway: HTTP API in front of the parser, dispatcher and chat fallback.
//!
//! Single port. `POST /api/chat` takes free text; `/api/email/*` take structured requests
//! and skip parsing.

mod protocol;
mod server;

pub use protocol::{ChatRequest, DeleteRequest, ListQuery, SendRequest};
pub use server::{router, run_gateway, GatewayState};
