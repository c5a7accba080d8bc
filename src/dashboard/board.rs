//! Surface Board
//!
//! In-memory [`ChartSurface`]: keeps the latest figure per target and
//! forwards each redraw to WebSocket subscribers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::pipeline::{ChartFigure, ChartSurface};
use crate::websocket::{ConnectionHub, WsEvent};

/// The figure currently shown at one target
#[derive(Debug, Clone, Serialize)]
pub struct RenderedPanel {
    pub figure: ChartFigure,
    pub rendered_at: DateTime<Utc>,
    pub points: usize,
}

/// Chart targets keyed by id
#[derive(Default)]
pub struct SurfaceBoard {
    panels: RwLock<HashMap<String, RenderedPanel>>,
    hub: Option<Arc<ConnectionHub>>,
}

impl SurfaceBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hub(hub: Arc<ConnectionHub>) -> Self {
        Self {
            panels: RwLock::new(HashMap::new()),
            hub: Some(hub),
        }
    }

    pub async fn get(&self, target: &str) -> Option<RenderedPanel> {
        self.panels.read().await.get(target).cloned()
    }

    /// Ids of every target drawn so far, sorted
    pub async fn targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.panels.read().await.keys().cloned().collect();
        targets.sort();
        targets
    }

    pub async fn len(&self) -> usize {
        self.panels.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.panels.read().await.is_empty()
    }
}

#[async_trait]
impl ChartSurface for SurfaceBoard {
    async fn draw(&self, target: &str, figure: ChartFigure) {
        let rendered_at = Utc::now();
        let panel = RenderedPanel {
            points: figure.point_count(),
            figure,
            rendered_at,
        };

        if let Some(hub) = &self.hub {
            hub.publish(WsEvent::panel_rendered(target, rendered_at, panel.figure.clone()));
        }

        tracing::debug!(panel = %target, points = panel.points, "Drew panel");
        self.panels.write().await.insert(target.to_string(), panel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{render, Series};
    use crate::websocket::{HubConfig, ServerMessage};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_draw_replaces_previous_figure() {
        let board = SurfaceBoard::new();

        board.draw("earth-1min", ChartFigure::from_series(&Series::new(), "a")).await;
        board.draw("earth-1min", ChartFigure::from_series(&Series::new(), "b")).await;

        assert_eq!(board.len().await, 1);
        let panel = board.get("earth-1min").await.unwrap();
        assert_eq!(panel.figure.layout.title, "b");
        assert_eq!(panel.points, 0);
    }

    #[tokio::test]
    async fn test_unknown_target() {
        let board = SurfaceBoard::new();
        assert!(board.get("nope").await.is_none());
        assert!(board.is_empty().await);
    }

    #[tokio::test]
    async fn test_draw_publishes_to_subscribers() {
        let hub = Arc::new(ConnectionHub::new(HubConfig::default()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = hub.register(tx).await.unwrap();
        hub.subscribe(&id, vec!["panels.mars-1min".to_string()]).await.unwrap();
        let mut mirror = hub.subscribe_broadcast();

        let board = SurfaceBoard::with_hub(Arc::clone(&hub));
        render(&Series::new(), "mars-1min", "Marsquakes", &board).await;

        let event = mirror.recv().await.unwrap();
        assert_eq!(event.topic, "panels.mars-1min");

        let msg = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(msg, ServerMessage::PanelRendered { .. }));
    }
}
