//! ==============================================================================
//! simulator.rs - synthetic device feeding the bridge
//! ==============================================================================
//!
//! purpose:
//!     stands in for the real board while it is not wired up. produces a
//!     stream of plausible raw readings and hands them to a sink, either the
//!     local bridge or a remote one over http (the same POST a device does).
//!
//! behaviour:
//!     - acceleration random-walks around resting gravity
//!     - temperature / humidity drift slowly inside indoor ranges
//!     - heart bpm hovers around a resting rate, occasionally reporting the
//!       negative values the pulse sensor emits while it settles
//!     - gas ppm random-walks, the trigger trips above GAS_TRIGGER_PPM
//!     - the infrared flag trips now and then
//!
//! relationships:
//!     - started by: main.rs when [simulator] enabled = true
//!     - uses: bridge.rs (LocalSink), reqwest (HttpSink)
//!     - produces: domain.rs RawTelemetry
//!
//! ==============================================================================

use crate::bridge::TelemetryBridge;
use crate::domain::{Acceleration, Gas, Heart, Orientation, RawTelemetry, Thermo};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::MissedTickBehavior;

const GRAVITY: f64 = 9.81;
const GAS_TRIGGER_PPM: i64 = 1000;
/// analog front-end is 10 bit, full scale at this concentration
const GAS_FULL_SCALE_PPM: f64 = 1200.0;
const RESTING_BPM: f64 = 72.0;

/// current unix time in milliseconds
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// ==============================================================================
// reading generator
// ==============================================================================

pub struct TelemetrySimulator {
    rng: StdRng,
    timestamp_ms: u64,
    accel: Acceleration,
    yaw: f64,
    thermo: Thermo,
    gas_ppm: f64,
}

impl TelemetrySimulator {
    /// `seed` makes the stream reproducible, `None` seeds from the os
    pub fn new(seed: Option<u64>, start_ms: u64) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            timestamp_ms: start_ms,
            accel: Acceleration { x: 0.0, y: 0.0, z: GRAVITY },
            yaw: 0.0,
            thermo: Thermo { temperature: 22.0, humidity: 45.0 },
            gas_ppm: 420.0,
        }
    }

    /// advance the device clock by `step_ms` and take a reading
    pub fn next_reading(&mut self, step_ms: u64) -> RawTelemetry {
        self.timestamp_ms += step_ms;

        self.accel.x = walk(&mut self.rng, self.accel.x, 0.05, -2.0, 2.0);
        self.accel.y = walk(&mut self.rng, self.accel.y, 0.05, -2.0, 2.0);
        self.accel.z = GRAVITY + self.rng.gen_range(-0.05..0.05);
        self.yaw = (self.yaw + self.rng.gen_range(-2.0..2.0)).rem_euclid(360.0);

        self.thermo.temperature = walk(&mut self.rng, self.thermo.temperature, 0.1, 18.0, 35.0);
        self.thermo.humidity = walk(&mut self.rng, self.thermo.humidity, 0.3, 20.0, 80.0);
        self.gas_ppm = walk(&mut self.rng, self.gas_ppm, 15.0, 350.0, GAS_FULL_SCALE_PPM);

        RawTelemetry {
            timestamp_ms: self.timestamp_ms,
            infrared_flag: i64::from(self.rng.gen_bool(0.1)),
            acceleration: self.accel,
            orientation: self.orientation(),
            thermo: self.thermo,
            heart: self.heart(),
            gas: self.gas(),
        }
    }

    /// tilt angles implied by the gravity vector, in degrees
    fn orientation(&self) -> Orientation {
        let Acceleration { x, y, z } = self.accel;
        Orientation {
            roll: y.atan2(z).to_degrees(),
            pitch: (-x).atan2((y * y + z * z).sqrt()).to_degrees(),
            yaw: self.yaw,
        }
    }

    fn heart(&mut self) -> Heart {
        let bpm = if self.rng.gen_bool(0.05) {
            // settling: the sensor reports small negative rates
            self.rng.gen_range(-5.0..0.0)
        } else {
            RESTING_BPM + self.rng.gen_range(-6.0..6.0)
        };
        let raw = self.rng.gen_range(400..624);
        Heart {
            raw,
            hp: raw as f64 / 1023.0,
            bpm,
            armed: true,
        }
    }

    fn gas(&self) -> Gas {
        let ppm = self.gas_ppm.round() as i64;
        let triggered = ppm > GAS_TRIGGER_PPM;
        Gas {
            analog: (self.gas_ppm / GAS_FULL_SCALE_PPM * 1023.0).round() as i64,
            digital: triggered,
            triggered,
            ppm,
        }
    }
}

/// one bounded random-walk step
fn walk(rng: &mut StdRng, value: f64, step: f64, min: f64, max: f64) -> f64 {
    (value + rng.gen_range(-step..step)).clamp(min, max)
}

// ==============================================================================
// sinks
// ==============================================================================

/// where simulated readings go
pub trait TelemetrySink {
    fn push(&self, reading: &RawTelemetry) -> impl Future<Output = Result<()>> + Send;
}

/// ingest straight into the in-process bridge
pub struct LocalSink {
    bridge: TelemetryBridge,
}

impl LocalSink {
    pub fn new(bridge: TelemetryBridge) -> Self {
        Self { bridge }
    }
}

impl TelemetrySink for LocalSink {
    async fn push(&self, reading: &RawTelemetry) -> Result<()> {
        self.bridge.ingest(reading.clone()).await;
        Ok(())
    }
}

/// POST to a remote bridge, exactly like the device firmware does
pub struct HttpSink {
    client: reqwest::Client,
    url: String,
}

impl HttpSink {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build http client")?;
        Ok(Self { client, url: url.into() })
    }
}

impl TelemetrySink for HttpSink {
    async fn push(&self, reading: &RawTelemetry) -> Result<()> {
        self.client
            .post(&self.url)
            .json(reading)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("{} rejected reading", self.url))?;
        Ok(())
    }
}

// ==============================================================================
// polling loop
// ==============================================================================

/// generate and push one reading per `interval`, forever
///
/// a failed push is logged and skipped; the next tick sends a fresh reading.
pub async fn run<S: TelemetrySink>(mut simulator: TelemetrySimulator, sink: S, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let step_ms = interval.as_millis() as u64;

    tracing::info!("[SIM] Producing readings every {}ms", step_ms);
    loop {
        ticker.tick().await;
        let reading = simulator.next_reading(step_ms);
        if let Err(e) = sink.push(&reading).await {
            tracing::warn!("[SIM] ⚠ Push failed: {:#}", e);
        }
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{project, InfraredStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = TelemetrySimulator::new(Some(42), 1_000);
        let mut b = TelemetrySimulator::new(Some(42), 1_000);
        for _ in 0..50 {
            assert_eq!(a.next_reading(100), b.next_reading(100));
        }
    }

    #[test]
    fn test_readings_stay_in_range() {
        let mut sim = TelemetrySimulator::new(Some(7), 0);
        let mut last_ts = 0;
        let mut saw_obstacle = false;
        let mut saw_negative_bpm = false;

        for _ in 0..2_000 {
            let r = sim.next_reading(250);
            assert!(r.timestamp_ms > last_ts);
            last_ts = r.timestamp_ms;

            assert!((-2.0..=2.0).contains(&r.acceleration.x));
            assert!((-2.0..=2.0).contains(&r.acceleration.y));
            assert!((GRAVITY - 0.05..=GRAVITY + 0.05).contains(&r.acceleration.z));
            assert!((18.0..=35.0).contains(&r.thermo.temperature));
            assert!((20.0..=80.0).contains(&r.thermo.humidity));
            assert!((350..=1200).contains(&r.gas.ppm));
            assert_eq!(r.gas.triggered, r.gas.ppm > GAS_TRIGGER_PPM);
            assert!((0.0..=360.0).contains(&r.orientation.yaw));

            saw_obstacle |= r.infrared_flag != 0;
            saw_negative_bpm |= r.heart.bpm < 0.0;

            // whatever the simulator sends must project cleanly
            assert!(project(&r).bpm >= 0.0);
        }

        assert_eq!(last_ts, 2_000 * 250);
        assert!(saw_obstacle);
        assert!(saw_negative_bpm);
    }

    #[tokio::test]
    async fn test_local_sink_ingests() {
        let bridge = TelemetryBridge::default();
        let sink = LocalSink::new(bridge.clone());
        let reading = TelemetrySimulator::new(Some(1), 5_000).next_reading(1_000);

        sink.push(&reading).await.unwrap();

        let snapshot = bridge.snapshot().await.unwrap();
        assert_eq!(snapshot.raw, reading);
        assert_eq!(snapshot.display.timestamp_ms, 6_000);
        assert_ne!(snapshot.display.infrared, InfraredStatus::Unknown);
    }

    #[tokio::test]
    async fn test_http_sink_posts_to_remote_bridge() {
        let remote = TelemetryBridge::default();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(crate::server::serve(listener, remote.clone()));

        let reading = TelemetrySimulator::new(Some(3), 0).next_reading(1_000);
        let sink = HttpSink::new(format!("http://{}{}", addr, crate::server::TELEMETRY_PATH)).unwrap();
        sink.push(&reading).await.unwrap();

        assert_eq!(remote.snapshot().await.unwrap().raw, reading);

        // /health only answers GET, the 405 must surface as an error
        let wrong = HttpSink::new(format!("http://{}/health", addr)).unwrap();
        assert!(wrong.push(&reading).await.is_err());
        assert_eq!(remote.stats().await.ingested, 1);
    }

    /// fails every other push
    struct FlakySink {
        calls: Arc<AtomicUsize>,
        bridge: TelemetryBridge,
    }

    impl TelemetrySink for FlakySink {
        async fn push(&self, reading: &RawTelemetry) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 0 {
                anyhow::bail!("link down");
            }
            self.bridge.ingest(reading.clone()).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_keeps_going_after_failed_push() {
        let bridge = TelemetryBridge::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = FlakySink { calls: calls.clone(), bridge: bridge.clone() };
        let sim = TelemetrySimulator::new(Some(9), 0);

        let result = tokio::time::timeout(
            Duration::from_millis(300),
            run(sim, sink, Duration::from_millis(10)),
        )
        .await;
        assert!(result.is_err(), "run never returns on its own");

        assert!(calls.load(Ordering::SeqCst) >= 4);
        assert!(bridge.stats().await.ingested >= 2);
    }
}
