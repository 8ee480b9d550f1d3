//! Renderer bridge
//!
//! The map renderer lives outside this crate (a web view, a GPU surface,
//! a terminal in the simulator). It receives one JSON object per message,
//! tagged by `type`. The renderer can disappear and come back at any time;
//! messages sent while no renderer is attached are dropped.

use std::sync::Arc;

use fogmap_core::{TileId, TilePoint, TileRecord};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// One tile as sent to the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererTile {
    pub id: TileId,
    pub points: Vec<TilePoint>,
}

impl From<&TileRecord> for RendererTile {
    fn from(tile: &TileRecord) -> Self {
        Self {
            id: tile.id.clone(),
            points: tile.points.clone(),
        }
    }
}

/// Messages understood by the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RendererMessage {
    #[serde(rename = "setDiscoveryMode")]
    SetDiscoveryMode { enabled: bool },

    #[serde(rename = "setDiscoveryTiles")]
    SetDiscoveryTiles { tiles: Vec<RendererTile> },

    #[serde(rename = "revealDiscoveryPoint")]
    RevealDiscoveryPoint {
        #[serde(rename = "tileId")]
        tile_id: TileId,
        point: TilePoint,
    },

    #[serde(rename = "clearDiscoveryFog")]
    ClearDiscoveryFog,

    #[serde(rename = "setMiniMapMode")]
    SetMiniMapMode { enabled: bool },

    #[serde(rename = "setMiniMapZoom")]
    SetMiniMapZoom { zoom: f64, duration: u64 },

    #[serde(rename = "updateMiniMapLocation")]
    UpdateMiniMapLocation {
        latitude: f64,
        longitude: f64,
        bearing: f64,
    },
}

impl RendererMessage {
    /// Wire name of the message
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetDiscoveryMode { .. } => "setDiscoveryMode",
            Self::SetDiscoveryTiles { .. } => "setDiscoveryTiles",
            Self::RevealDiscoveryPoint { .. } => "revealDiscoveryPoint",
            Self::ClearDiscoveryFog => "clearDiscoveryFog",
            Self::SetMiniMapMode { .. } => "setMiniMapMode",
            Self::SetMiniMapZoom { .. } => "setMiniMapZoom",
            Self::UpdateMiniMapLocation { .. } => "updateMiniMapLocation",
        }
    }
}

/// Anything that can deliver a serialized message to a renderer
pub trait RendererSink: Send + Sync {
    fn post_message(&self, message: &str);
}

/// Shared, attachable connection to the renderer
#[derive(Clone, Default)]
pub struct RendererBridge {
    sink: Arc<RwLock<Option<Arc<dyn RendererSink>>>>,
}

impl std::fmt::Debug for RendererBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererBridge")
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl RendererBridge {
    /// A bridge with no renderer attached
    pub fn new() -> Self {
        Self::default()
    }

    /// A bridge already attached to `sink`
    pub fn with_sink(sink: Arc<dyn RendererSink>) -> Self {
        let bridge = Self::new();
        bridge.attach(sink);
        bridge
    }

    /// Route messages to `sink`, replacing any previous renderer
    pub fn attach(&self, sink: Arc<dyn RendererSink>) {
        *self.sink.write() = Some(sink);
    }

    /// Stop routing messages; later sends are dropped
    pub fn detach(&self) {
        *self.sink.write() = None;
    }

    pub fn is_attached(&self) -> bool {
        self.sink.read().is_some()
    }

    /// Serialize and deliver a message; returns whether a renderer got it
    pub fn send(&self, message: &RendererMessage) -> bool {
        let Some(sink) = self.sink.read().clone() else {
            trace!(kind = message.kind(), "No renderer attached, dropping message");
            return false;
        };

        match serde_json::to_string(message) {
            Ok(encoded) => {
                sink.post_message(&encoded);
                true
            }
            Err(e) => {
                warn!(kind = message.kind(), error = %e, "Failed to encode renderer message");
                false
            }
        }
    }

    pub fn send_discovery_mode(&self, enabled: bool) -> bool {
        self.send(&RendererMessage::SetDiscoveryMode { enabled })
    }

    pub fn send_discovery_tiles(&self, tiles: &[TileRecord]) -> bool {
        self.send(&RendererMessage::SetDiscoveryTiles {
            tiles: tiles.iter().map(RendererTile::from).collect(),
        })
    }

    pub fn send_reveal(&self, tile_id: &TileId, point: TilePoint) -> bool {
        self.send(&RendererMessage::RevealDiscoveryPoint {
            tile_id: tile_id.clone(),
            point,
        })
    }

    pub fn send_clear_fog(&self) -> bool {
        self.send(&RendererMessage::ClearDiscoveryFog)
    }

    pub fn send_minimap_mode(&self, enabled: bool) -> bool {
        self.send(&RendererMessage::SetMiniMapMode { enabled })
    }

    pub fn send_minimap_zoom(&self, zoom: f64, duration_ms: u64) -> bool {
        self.send(&RendererMessage::SetMiniMapZoom {
            zoom,
            duration: duration_ms,
        })
    }

    pub fn send_minimap_location(&self, latitude: f64, longitude: f64, bearing: f64) -> bool {
        self.send(&RendererMessage::UpdateMiniMapLocation {
            latitude,
            longitude,
            bearing,
        })
    }
}

/// Renderer double that keeps every message it receives
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    messages: parking_lot::Mutex<Vec<String>>,
}

impl RecordingRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Raw messages in delivery order
    pub fn raw(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Decoded messages in delivery order; undecodable entries are skipped
    pub fn messages(&self) -> Vec<RendererMessage> {
        self.messages
            .lock()
            .iter()
            .filter_map(|raw| serde_json::from_str(raw).ok())
            .collect()
    }

    /// Wire names in delivery order
    pub fn kinds(&self) -> Vec<&'static str> {
        self.messages().iter().map(RendererMessage::kind).collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

impl RendererSink for RecordingRenderer {
    fn post_message(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let reveal = RendererMessage::RevealDiscoveryPoint {
            tile_id: TileId::new(15, 9739, 12405),
            point: TilePoint::new(12.0, 200.0, 13.5),
        };
        let value = serde_json::to_value(&reveal).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "revealDiscoveryPoint",
                "tileId": "15/9739/12405",
                "point": { "x": 12.0, "y": 200.0, "r": 13.5 }
            })
        );

        let clear = serde_json::to_value(&RendererMessage::ClearDiscoveryFog).unwrap();
        assert_eq!(clear, json!({ "type": "clearDiscoveryFog" }));

        let zoom = serde_json::to_value(&RendererMessage::SetMiniMapZoom {
            zoom: 17.0,
            duration: 300,
        })
        .unwrap();
        assert_eq!(zoom, json!({ "type": "setMiniMapZoom", "zoom": 17.0, "duration": 300 }));
    }

    #[test]
    fn test_tiles_message() {
        let tile = TileRecord {
            id: TileId::new(15, 1, 2),
            points: vec![TilePoint::new(1.0, 2.0, 3.0)],
        };
        let value = serde_json::to_value(&RendererMessage::SetDiscoveryTiles {
            tiles: vec![RendererTile::from(&tile)],
        })
        .unwrap();
        assert_eq!(value["type"], "setDiscoveryTiles");
        assert_eq!(value["tiles"][0]["id"], "15/1/2");
        assert_eq!(value["tiles"][0]["points"][0]["r"], 3.0);
    }

    #[test]
    fn test_detached_bridge_drops_messages() {
        let renderer = RecordingRenderer::new();
        let bridge = RendererBridge::new();

        assert!(!bridge.send_discovery_mode(true));

        bridge.attach(renderer.clone());
        assert!(bridge.send_discovery_mode(true));

        bridge.detach();
        assert!(!bridge.send_clear_fog());

        assert_eq!(renderer.kinds(), vec!["setDiscoveryMode"]);
    }

    #[test]
    fn test_clones_share_attachment() {
        let renderer = RecordingRenderer::new();
        let bridge = RendererBridge::new();
        let clone = bridge.clone();

        bridge.attach(renderer.clone());
        assert!(clone.is_attached());
        clone.send_minimap_location(40.0, -73.0, 90.0);

        assert_eq!(
            renderer.messages(),
            vec![RendererMessage::UpdateMiniMapLocation {
                latitude: 40.0,
                longitude: -73.0,
                bearing: 90.0
            }]
        );
    }
}
