//! Map Layer
//!
//! Registry of point markers shown on the quake map. Every marker added is
//! owned by the layer through a [`MarkerHandle`]; clearing walks the
//! registry and drops each handle.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::websocket::{ConnectionHub, WsEvent};

/// A single point marker with popup text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub lat: f64,
    pub lon: f64,
    pub magnitude: f64,
    pub popup: String,
}

impl Marker {
    /// Marker for a catalog event
    pub fn for_event(lat: f64, lon: f64, magnitude: f64) -> Self {
        Self {
            lat,
            lon,
            magnitude,
            popup: format!("Magnitude: {}, Location: ({}, {})", magnitude, lat, lon),
        }
    }
}

/// Owned entry in the marker registry
#[derive(Debug, Clone, Serialize)]
pub struct MarkerHandle {
    pub id: Uuid,
    #[serde(flatten)]
    pub marker: Marker,
}

/// Initial viewport and tiles for the map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapView {
    /// [lat, lon]
    pub center: [f64; 2],
    pub zoom: u8,
    pub tile_url: String,
    pub attribution: String,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            center: [20.0, 0.0],
            zoom: 2,
            tile_url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "© OpenStreetMap contributors".to_string(),
        }
    }
}

/// Marker registry backing the map surface
#[derive(Default)]
pub struct MarkerLayer {
    markers: RwLock<Vec<MarkerHandle>>,
    hub: Option<Arc<ConnectionHub>>,
}

impl MarkerLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer that pushes a `map` event to the hub after each replacement
    pub fn with_hub(hub: Arc<ConnectionHub>) -> Self {
        Self {
            markers: RwLock::new(Vec::new()),
            hub: Some(hub),
        }
    }

    /// Add one marker, returning its handle id
    pub async fn add(&self, marker: Marker) -> Uuid {
        let id = Uuid::new_v4();
        self.markers.write().await.push(MarkerHandle { id, marker });
        id
    }

    /// Drop every registered marker, returning how many were removed
    pub async fn clear(&self) -> usize {
        drop_handles(&mut *self.markers.write().await)
    }

    /// Clear the layer and register `markers` in its place
    ///
    /// Done under one write lock so readers never observe a half-built layer.
    pub async fn replace_all(&self, markers: Vec<Marker>) -> usize {
        let snapshot = {
            let mut registry = self.markers.write().await;
            let cleared = drop_handles(&mut registry);
            registry.extend(markers.into_iter().map(|marker| MarkerHandle {
                id: Uuid::new_v4(),
                marker,
            }));

            tracing::debug!(cleared, added = registry.len(), "Replaced map markers");
            registry.clone()
        };

        let count = snapshot.len();
        if let Some(hub) = &self.hub {
            hub.publish(WsEvent::map_updated(snapshot));
        }
        count
    }

    /// Snapshot of the current markers
    pub async fn markers(&self) -> Vec<MarkerHandle> {
        self.markers.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.markers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.markers.read().await.is_empty()
    }
}

fn drop_handles(registry: &mut Vec<MarkerHandle>) -> usize {
    let mut removed = 0;
    for handle in registry.drain(..) {
        tracing::trace!(marker_id = %handle.id, "Removed map marker");
        removed += 1;
    }
    removed
}
