//! WebSocket Message Types
//!
//! Messages exchanged between dashboard pages and the QuakeWatch server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::map::MarkerHandle;
use crate::pipeline::ChartFigure;

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to topics (e.g. "panels.earth-1min", "panels.*", "map")
    Subscribe { topics: Vec<String> },
    /// Unsubscribe from topics
    Unsubscribe { topics: Vec<String> },
    /// Keepalive
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A panel was redrawn; the figure replaces the previous one
    PanelRendered {
        panel: String,
        rendered_at: DateTime<Utc>,
        figure: ChartFigure,
    },
    /// The map layer was replaced
    MapUpdated { markers: Vec<MarkerHandle> },
    /// Every panel of a tick has finished
    TickCompleted {
        rendered: usize,
        failed: usize,
        skipped: usize,
    },
    /// Subscription confirmed
    Subscribed { topics: Vec<String> },
    /// Unsubscription confirmed
    Unsubscribed { topics: Vec<String> },
    /// Pong response to ping
    Pong,
    Error { message: String },
    /// Connection established
    Connected { connection_id: String },
}

/// Internal event for broadcasting through the hub
#[derive(Debug, Clone)]
pub struct WsEvent {
    /// Topic this event belongs to (e.g. "panels.mars-1hour")
    pub topic: String,
    pub message: ServerMessage,
}

impl WsEvent {
    pub fn panel_rendered(panel: &str, rendered_at: DateTime<Utc>, figure: ChartFigure) -> Self {
        Self {
            topic: format!("panels.{}", panel),
            message: ServerMessage::PanelRendered {
                panel: panel.to_string(),
                rendered_at,
                figure,
            },
        }
    }

    pub fn map_updated(markers: Vec<MarkerHandle>) -> Self {
        Self {
            topic: "map".to_string(),
            message: ServerMessage::MapUpdated { markers },
        }
    }

    pub fn tick_completed(rendered: usize, failed: usize, skipped: usize) -> Self {
        Self {
            topic: "system".to_string(),
            message: ServerMessage::TickCompleted {
                rendered,
                failed,
                skipped,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Series;

    #[test]
    fn test_client_message_deserialize_subscribe() {
        let json = r#"{"type": "subscribe", "topics": ["panels.earth-1min", "map"]}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Subscribe { topics } => {
                assert_eq!(topics, vec!["panels.earth-1min", "map"]);
            }
            _ => panic!("Expected Subscribe"),
        }
    }

    #[test]
    fn test_client_message_deserialize_ping() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn test_panel_rendered_event() {
        let figure = ChartFigure::from_series(&Series::new(), "Moonquakes - Last 5 Hour(s)");
        let event = WsEvent::panel_rendered("moon-1min", Utc::now(), figure);

        assert_eq!(event.topic, "panels.moon-1min");
        let json = serde_json::to_string(&event.message).unwrap();
        assert!(json.contains("\"type\":\"panel_rendered\""));
        assert!(json.contains("\"panel\":\"moon-1min\""));
    }

    #[test]
    fn test_tick_completed_serialize() {
        let event = WsEvent::tick_completed(8, 1, 0);
        assert_eq!(event.topic, "system");
        let json = serde_json::to_string(&event.message).unwrap();
        assert!(json.contains("\"type\":\"tick_completed\""));
        assert!(json.contains("\"failed\":1"));
    }
}
