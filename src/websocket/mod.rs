//! WebSocket Live Updates
//!
//! Pushes panel redraws and map updates to connected dashboards.
//!
//! ## Architecture
//!
//! - **ConnectionHub**: Manages active connections and subscriptions
//! - **Handler**: Handles WebSocket upgrade and message processing
//! - **Messages**: Client and server message formats
//!
//! ## Topics
//!
//! - `panels.*` - Every panel redraw
//! - `panels.{id}` - One panel (e.g., `panels.earth-1min`)
//! - `map` - Map marker replacements
//! - `system` - Tick summaries

mod handler;
mod hub;
mod messages;

pub use handler::websocket_handler;
pub use hub::{ConnectionHub, HubConfig, HubError};
pub use messages::{ClientMessage, ServerMessage, WsEvent};
