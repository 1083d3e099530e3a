//! Domain records and request/response types for the Kyotei API.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InvalidCommand;

/// Highest race number held on a single race day
pub const MAX_RACE_NUMBER: u8 = 12;

/// Number of lanes (boats) in a race
pub const LANES: u8 = 6;

/// Identifies one race: venue, race number and race day.
///
/// Constructed through [`RaceId::new`], which enforces the venue and race
/// number ranges, so every value in circulation is a valid cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RaceId {
    venue: u8,
    race: u8,
    date: NaiveDate,
}

impl RaceId {
    /// Build an identifier, rejecting unknown venue codes and race numbers
    /// outside 1..=12.
    pub fn new(venue: u8, race: u8, date: NaiveDate) -> Option<Self> {
        if crate::venue::name_of(venue).is_none() {
            return None;
        }
        if !(1..=MAX_RACE_NUMBER).contains(&race) {
            return None;
        }
        Some(Self { venue, race, date })
    }

    pub fn venue(&self) -> u8 {
        self.venue
    }

    pub fn race(&self) -> u8 {
        self.race
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Two-digit venue code as used upstream (`jcd`)
    pub fn jcd(&self) -> String {
        format!("{:02}", self.venue)
    }

    /// Eight-digit race day (`hd`)
    pub fn hd(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }

    /// Human readable title, e.g. `丸亀 8R (2025/08/11)`
    pub fn title(&self) -> String {
        let name = crate::venue::name_of(self.venue).unwrap_or("?");
        format!("{} {}R ({})", name, self.race, self.date.format("%Y/%m/%d"))
    }
}

/// Weather panel of the pre-race page
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Conditions {
    pub weather: Option<String>, // "晴", "曇り", "雨" ...
    pub air_temp: Option<f64>,   // °C
    pub wind_speed: Option<f64>, // m
    pub wind_direction: Option<u8>, // upstream icon code 1-16
    pub water_temp: Option<f64>, // °C
    pub wave_height: Option<f64>, // cm
}

impl Conditions {
    pub fn is_empty(&self) -> bool {
        self.weather.is_none()
            && self.air_temp.is_none()
            && self.wind_speed.is_none()
            && self.wind_direction.is_none()
            && self.water_temp.is_none()
            && self.wave_height.is_none()
    }
}

/// One boat's row of the pre-race table
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct RacerEntry {
    pub lane: u8,
    pub racer_id: Option<u32>, // registration number (toban)
    pub name: String,
    pub body_weight: Option<f64>,
    pub exhibition_time: Option<f64>,
    pub tilt: Option<f64>,
    pub propeller: Option<String>,
    // Start exhibition
    pub start_course: Option<u8>,
    pub start_timing: Option<f64>, // negative = flying
    // Motor / boat figures, when the page carries them
    pub motor_no: Option<u32>,
    pub motor_rate: Option<f64>,
    pub boat_no: Option<u32>,
    pub boat_rate: Option<f64>,
}

/// Parsed pre-race information for one race
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceInfo {
    pub id: RaceId,
    /// Sorted by lane, at most one entry per lane
    pub entries: Vec<RacerEntry>,
    pub conditions: Conditions,
    pub retrieved_at: DateTime<Utc>,
}

impl RaceInfo {
    pub fn entry(&self, lane: u8) -> Option<&RacerEntry> {
        self.entries.iter().find(|e| e.lane == lane)
    }
}

/// Outcome of parsing a chat message
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Query(RaceId),
    Help,
    Invalid(InvalidCommand),
}

/// Body of `POST /ask`
#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub text: String,
}

/// Reply to `POST /ask`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub reply: String,
}

/// Query of `GET /_debug/beforeinfo`
#[derive(Debug, Clone, Deserialize)]
pub struct BeforeInfoQuery {
    pub jcd: u8,
    pub rno: u8,
    /// YYYYMMDD, defaults to today (JST)
    pub hd: Option<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}
