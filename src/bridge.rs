//! ==============================================================================
//! bridge.rs - latest-snapshot store shared by the producer and the dashboard
//! ==============================================================================
//!
//! purpose:
//!     holds the single most recent raw reading together with its display
//!     projection. there is no history: every ingest overwrites the cell.
//!
//! states:
//!     empty      nothing ingested yet, serve() answers with zeros
//!     populated  serve() answers with the projection of the latest ingest
//!
//!     the only transition is empty -> populated on the first good ingest.
//!
//! concurrency:
//!     one producer (POST or simulator) and any number of readers (GET).
//!     the raw/display pair lives behind one Arc and is swapped under the
//!     write lock, so a reader can never see a projection from a different
//!     reading than the raw it is paired with.
//!
//! relationships:
//!     - created by: main.rs (one per process, lives until exit)
//!     - used by: server.rs (GET / POST handlers)
//!     - used by: simulator.rs (LocalSink)
//!     - uses: domain.rs (project)
//!
//! ==============================================================================

use crate::domain::{self, DisplayTelemetry, RawTelemetry};
use crate::error::BridgeError;

use std::sync::Arc;
use tokio::sync::RwLock;

/// one accepted reading and the projection computed from it
#[derive(Debug, PartialEq)]
pub struct Snapshot {
    pub raw: RawTelemetry,
    pub display: DisplayTelemetry,
}

/// acknowledgement returned by a successful ingest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// total accepted ingests including this one
    pub sequence: u64,
}

/// point-in-time counters for the health endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStats {
    pub populated: bool,
    pub ingested: u64,
    /// device timestamp of the raw reading currently held
    pub last_timestamp_ms: Option<u64>,
}

#[derive(Default)]
struct Cell {
    latest: Option<Arc<Snapshot>>,
    ingested: u64,
}

/// clone-able handle to the process-wide snapshot cell
#[derive(Clone, Default)]
pub struct TelemetryBridge {
    cell: Arc<RwLock<Cell>>,
    /// log every accepted reading at info instead of debug
    show_readings: bool,
}

impl TelemetryBridge {
    pub fn new(show_readings: bool) -> Self {
        Self {
            cell: Arc::default(),
            show_readings,
        }
    }

    /// decode a raw payload and ingest it
    ///
    /// decoding happens before the lock is taken, a bad payload never
    /// touches the current snapshot.
    pub async fn ingest_json(&self, body: &[u8]) -> Result<Ack, BridgeError> {
        let raw = domain::decode_raw(body).map_err(|e| {
            tracing::warn!("[BRIDGE] rejected payload: {}", e);
            BridgeError::Decode(e)
        })?;
        Ok(self.ingest(raw).await)
    }

    /// replace the latest snapshot with `raw` and its projection
    pub async fn ingest(&self, raw: RawTelemetry) -> Ack {
        let view = domain::project(&raw);
        if self.show_readings {
            tracing::info!(
                "[BRIDGE] t={} | {:.1}°C {:.1}% | bpm {:.1} | gas {:.0}ppm | IR {:?}",
                view.timestamp_ms,
                view.temperature,
                view.humidity,
                view.bpm,
                view.gas,
                view.infrared,
            );
        } else {
            tracing::debug!("[BRIDGE] ingest t={}", view.timestamp_ms);
        }

        let snapshot = Arc::new(Snapshot { raw, display: view });

        let mut cell = self.cell.write().await;
        cell.latest = Some(snapshot);
        cell.ingested += 1;
        Ack {
            sequence: cell.ingested,
        }
    }

    /// the cached projection of the latest snapshot, zeros when empty
    pub async fn serve(&self) -> DisplayTelemetry {
        let cell = self.cell.read().await;
        cell.latest
            .as_ref()
            .map(|snapshot| snapshot.display.clone())
            .unwrap_or_default()
    }

    /// the latest raw/display pair, None while empty
    #[cfg(test)]
    pub async fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.cell.read().await.latest.clone()
    }

    pub async fn stats(&self) -> BridgeStats {
        let cell = self.cell.read().await;
        BridgeStats {
            populated: cell.latest.is_some(),
            ingested: cell.ingested,
            last_timestamp_ms: cell.latest.as_ref().map(|snapshot| snapshot.raw.timestamp_ms),
        }
    }
}
