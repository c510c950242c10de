//! ==============================================================================
//! domain.rs - raw and display telemetry records
//! ==============================================================================
//!
//! purpose:
//!     the two wire shapes the bridge deals with, and the single pure mapping
//!     between them.
//!
//!     RawTelemetry      what the device (or simulator) pushes, nested objects
//!     DisplayTelemetry  what the dashboard polls, one flat object
//!
//! relationships:
//!     - used by: bridge.rs (caches project() next to each raw snapshot)
//!     - used by: simulator.rs (builds RawTelemetry readings)
//!
//! ==============================================================================

use serde::{Deserialize, Serialize};

// ==============================================================================
// raw telemetry (producer side)
// ==============================================================================

/// one complete device reading, exactly as pushed by the producer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTelemetry {
    /// device clock in milliseconds
    pub timestamp_ms: u64,
    /// 0 = clear, anything else = obstacle (accepts ints or bools)
    #[serde(deserialize_with = "flag::int")]
    pub infrared_flag: i64,
    #[serde(deserialize_with = "object::only")]
    pub acceleration: Acceleration,
    /// not used by the display projection, kept for the wire shape
    #[serde(deserialize_with = "object::only")]
    pub orientation: Orientation,
    #[serde(deserialize_with = "object::only")]
    pub thermo: Thermo,
    #[serde(deserialize_with = "object::only")]
    pub heart: Heart,
    #[serde(deserialize_with = "object::only")]
    pub gas: Gas,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Thermo {
    /// celsius
    pub temperature: f64,
    /// relative humidity (0-100%)
    pub humidity: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Heart {
    /// raw pulse sensor value
    pub raw: i64,
    pub hp: f64,
    /// beats per minute, the sensor reports negative values while settling
    pub bpm: f64,
    #[serde(deserialize_with = "flag::bool")]
    pub armed: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Gas {
    pub analog: i64,
    #[serde(deserialize_with = "flag::bool")]
    pub digital: bool,
    #[serde(deserialize_with = "flag::bool")]
    pub triggered: bool,
    /// estimated parts per million
    pub ppm: i64,
}

// ==============================================================================
// display telemetry (dashboard side)
// ==============================================================================

/// infrared obstacle status as the dashboard renders it
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfraredStatus {
    /// nothing ingested yet
    #[default]
    #[serde(rename = "")]
    Unknown,
    #[serde(rename = "CLEAR")]
    Clear,
    #[serde(rename = "OBSTACLE DETECTED")]
    ObstacleDetected,
}

impl InfraredStatus {
    pub fn from_flag(flag: i64) -> Self {
        if flag == 0 {
            Self::Clear
        } else {
            Self::ObstacleDetected
        }
    }
}

/// flat projection served on GET /getTelemetry
///
/// the default value is the "never ingested" answer: all zeros and an empty
/// infrared status.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayTelemetry {
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub bpm: f64,
    pub gas: f64,
    pub infrared: InfraredStatus,
    pub timestamp_ms: u64,
}

/// derive the dashboard view of a raw reading
pub fn project(raw: &RawTelemetry) -> DisplayTelemetry {
    DisplayTelemetry {
        accel_x: raw.acceleration.x,
        accel_y: raw.acceleration.y,
        accel_z: raw.acceleration.z,
        temperature: raw.thermo.temperature,
        humidity: raw.thermo.humidity,
        bpm: display_bpm(raw.heart.bpm),
        gas: raw.gas.ppm as f64,
        infrared: InfraredStatus::from_flag(raw.infrared_flag),
        timestamp_ms: raw.timestamp_ms,
    }
}

/// clamp at zero, then round to one decimal (half away from zero)
///
/// the order matters: rounding first would turn -0.04 into -0.0.
fn display_bpm(bpm: f64) -> f64 {
    let clamped = if bpm > 0.0 { bpm } else { 0.0 };
    let scaled = clamped * 10.0;
    if !scaled.is_finite() {
        // past f64::MAX / 10 there is no fractional part left to round
        return clamped;
    }
    scaled.round() / 10.0
}

/// decode a producer payload, the top level must be a JSON object
pub fn decode_raw(body: &[u8]) -> serde_json::Result<RawTelemetry> {
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(body)?;
    serde_json::from_value(serde_json::Value::Object(object))
}

// ==============================================================================
// boolean-like wire flags
// ==============================================================================
// the firmware sends 0/1 for most flags, older builds sent true/false.

mod flag {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Int(i64),
        Bool(bool),
    }

    pub fn int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Int(v) => v,
            Repr::Bool(b) => i64::from(b),
        })
    }

    pub fn bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Int(v) => v != 0,
            Repr::Bool(b) => b,
        })
    }
}

// nested records travel as objects only; serde's derive would also take
// positional arrays like "thermo": [22.5, 41.0]
mod object {
    use serde::de::{DeserializeOwned, Error};
    use serde::{Deserialize, Deserializer};
    use serde_json::{Map, Value};

    pub fn only<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        T::deserialize(Value::Object(map)).map_err(D::Error::custom)
    }
}
