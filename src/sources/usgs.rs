//! USGS Event Catalog
//!
//! Live feed from the FDSN event query service. Each fetch also replaces
//! the markers on the attached map layer.

use super::*;
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::map::{Marker, MarkerLayer};

/// Default FDSN query endpoint
pub const DEFAULT_USGS_URL: &str = "https://earthquake.usgs.gov/fdsnws/event/1/query";

/// Configuration for the USGS feed
#[derive(Debug, Clone)]
pub struct UsgsConfig {
    /// Query endpoint
    pub base_url: String,
    /// Events below this magnitude are not requested
    pub min_magnitude: f64,
    /// Request timeout, `None` leaves the transport default
    pub request_timeout: Option<std::time::Duration>,
}

impl Default for UsgsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_USGS_URL.to_string(),
            min_magnitude: 1.0,
            request_timeout: None,
        }
    }
}

/// USGS catalog adapter
pub struct UsgsFeed {
    client: Client,
    config: UsgsConfig,
    map: Option<Arc<MarkerLayer>>,
}

impl UsgsFeed {
    /// Create a new feed
    pub fn new(config: UsgsConfig) -> Result<Self, SourceError> {
        let mut builder = Client::builder().user_agent(concat!("QuakeWatch/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self {
            client,
            config,
            map: None,
        })
    }

    /// Attach the map layer refreshed on every successful fetch
    pub fn with_map(mut self, layer: Arc<MarkerLayer>) -> Self {
        self.map = Some(layer);
        self
    }

    /// Build the query URL for a time range
    pub fn query_url(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        let start = start.to_rfc3339_opts(SecondsFormat::Millis, true);
        let end = end.to_rfc3339_opts(SecondsFormat::Millis, true);

        format!(
            "{}?format=geojson&starttime={}&endtime={}&minmagnitude={}",
            self.config.base_url,
            urlencoding::encode(&start),
            urlencoding::encode(&end),
            self.config.min_magnitude
        )
    }

    /// Fetch the raw feature collection for a time range
    async fn fetch_collection(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FeatureCollection, SourceError> {
        let response = self
            .client
            .get(self.query_url(start, end))
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::Network(format!(
                "USGS catalog returned {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| SourceError::Parse(e.to_string()))
    }
}

/// GeoJSON feature collection as returned by the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub geometry: Option<Geometry>,
    pub properties: Properties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geometry {
    /// [lon, lat, depth?]
    pub coordinates: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Properties {
    #[serde(default)]
    pub mag: Option<f64>,
    /// Epoch milliseconds
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub place: Option<String>,
}

impl Feature {
    /// (lat, lon) from GeoJSON's lon-first coordinates
    pub fn lat_lon(&self) -> Option<(f64, f64)> {
        let coords = &self.geometry.as_ref()?.coordinates;
        match coords.as_slice() {
            [lon, lat, ..] => Some((*lat, *lon)),
            _ => None,
        }
    }

    pub fn reading(&self) -> Option<Reading> {
        let mag = self.properties.mag?;
        let time = self.properties.time?;
        Reading::from_millis(time, mag)
    }

    pub fn marker(&self) -> Option<Marker> {
        let mag = self.properties.mag?;
        let (lat, lon) = self.lat_lon()?;
        Some(Marker::for_event(lat, lon, mag))
    }
}

impl FeatureCollection {
    /// Split the collection into pipeline readings and map markers
    pub fn readings_and_markers(&self) -> (Vec<Reading>, Vec<Marker>) {
        let mut readings = Vec::with_capacity(self.features.len());
        let mut markers = Vec::with_capacity(self.features.len());

        for feature in &self.features {
            match feature.reading() {
                Some(reading) => readings.push(reading),
                None => tracing::debug!(
                    place = ?feature.properties.place,
                    "Skipping feature without magnitude or time"
                ),
            }
            if let Some(marker) = feature.marker() {
                markers.push(marker);
            }
        }

        (readings, markers)
    }
}

#[async_trait]
impl ReadingSource for UsgsFeed {
    fn name(&self) -> &str {
        "usgs"
    }

    fn body(&self) -> Body {
        Body::Earth
    }

    async fn fetch(&self, window: Window) -> Result<Vec<Reading>, SourceError> {
        let end = Utc::now();
        let start = window.start(end);

        let collection = self.fetch_collection(start, end).await?;
        let (readings, markers) = collection.readings_and_markers();

        if let Some(map) = &self.map {
            map.replace_all(markers).await;
        }

        tracing::debug!(
            events = collection.features.len(),
            readings = readings.len(),
            lookback_minutes = window.lookback_minutes,
            "Fetched USGS events"
        );

        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::RawQuery, http::StatusCode, routing::get, Router};
    use tokio::sync::Mutex;

    const ONE_EVENT: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [10, 20, 5.0]},
                "properties": {"mag": 4.2, "time": 1700000000000, "place": "Somewhere"}
            }
        ]
    }"#;

    async fn spawn_catalog(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/query", addr)
    }

    fn feed_for(url: String) -> UsgsFeed {
        UsgsFeed::new(UsgsConfig {
            base_url: url,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_query_url() {
        let feed = UsgsFeed::new(UsgsConfig::default()).unwrap();
        let start = DateTime::from_timestamp(0, 0).unwrap();
        let end = DateTime::from_timestamp(3600, 0).unwrap();

        let url = feed.query_url(start, end);

        assert!(url.starts_with(DEFAULT_USGS_URL));
        assert!(url.contains("format=geojson"));
        assert!(url.contains("starttime=1970-01-01T00%3A00%3A00.000Z"));
        assert!(url.contains("endtime=1970-01-01T01%3A00%3A00.000Z"));
        assert!(url.contains("minmagnitude=1"));
    }

    #[test]
    fn test_feature_to_reading_and_marker() {
        let collection: FeatureCollection = serde_json::from_str(ONE_EVENT).unwrap();

        let (readings, markers) = collection.readings_and_markers();

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].magnitude, 4.2);
        assert_eq!(readings[0].timestamp.timestamp_millis(), 1_700_000_000_000);

        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].lat, 20.0);
        assert_eq!(markers[0].lon, 10.0);
        assert!(markers[0].popup.contains("4.2"));
        assert!(markers[0].popup.contains("20"));
        assert!(markers[0].popup.contains("10"));
    }

    #[test]
    fn test_null_magnitude_skipped() {
        let json = r#"{"features": [
            {"geometry": {"coordinates": [1, 2]}, "properties": {"mag": null, "time": 1}},
            {"geometry": null, "properties": {"mag": 2.5, "time": 2}}
        ]}"#;
        let collection: FeatureCollection = serde_json::from_str(json).unwrap();

        let (readings, markers) = collection.readings_and_markers();

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].magnitude, 2.5);
        assert!(markers.is_empty());
    }

    #[test]
    fn test_missing_features_is_parse_error() {
        assert!(serde_json::from_str::<FeatureCollection>(r#"{"type": "oops"}"#).is_err());
    }

    #[tokio::test]
    async fn test_fetch_from_catalog_updates_map() {
        let seen_query = Arc::new(Mutex::new(None::<String>));
        let seen = Arc::clone(&seen_query);
        let app = Router::new().route(
            "/query",
            get(move |RawQuery(query): RawQuery| {
                let seen = Arc::clone(&seen);
                async move {
                    *seen.lock().await = query;
                    ONE_EVENT
                }
            }),
        );
        let url = spawn_catalog(app).await;

        let layer = Arc::new(MarkerLayer::new());
        layer.add(Marker::for_event(0.0, 0.0, 9.9)).await;
        let feed = feed_for(url).with_map(Arc::clone(&layer));

        let readings = feed.fetch(Window::new(300, 5)).await.unwrap();

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].magnitude, 4.2);

        let markers = layer.markers().await;
        assert_eq!(markers.len(), 1);
        assert_eq!((markers[0].marker.lat, markers[0].marker.lon), (20.0, 10.0));

        let query = seen_query.lock().await.clone().unwrap();
        assert!(query.contains("format=geojson"));
        assert!(query.contains("minmagnitude=1"));
    }

    #[tokio::test]
    async fn test_server_error_is_network_failure() {
        let app = Router::new().route(
            "/query",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let url = spawn_catalog(app).await;

        let result = feed_for(url).fetch(Window::new(60, 5)).await;

        assert!(matches!(result, Err(SourceError::Network(_))));
    }

    #[tokio::test]
    async fn test_bad_body_is_parse_failure_and_map_untouched() {
        let app = Router::new().route("/query", get(|| async { "not json" }));
        let url = spawn_catalog(app).await;

        let layer = Arc::new(MarkerLayer::new());
        layer.add(Marker::for_event(1.0, 1.0, 1.0)).await;
        let feed = feed_for(url).with_map(Arc::clone(&layer));

        let result = feed.fetch(Window::new(60, 5)).await;

        assert!(matches!(result, Err(SourceError::Parse(_))));
        assert_eq!(layer.len().await, 1);
    }

    #[tokio::test]
    async fn test_unreachable_is_network_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = feed_for(format!("http://{}/query", addr))
            .fetch(Window::new(60, 5))
            .await;

        assert!(matches!(result, Err(SourceError::Network(_))));
    }
}
