use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("Unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Box size in centimetres, weight in kilograms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
    pub length: f64,
    pub weight: f64,
}

impl Dimensions {
    pub const ZERO: Dimensions = Dimensions {
        width: 0.0,
        height: 0.0,
        length: 0.0,
        weight: 0.0,
    };

    pub fn new(width: f64, height: f64, length: f64, weight: f64) -> Self {
        Self { width, height, length, weight }
    }

    pub fn volume(&self) -> f64 {
        self.width * self.height * self.length
    }

    pub fn max_side(&self) -> f64 {
        self.width.max(self.height).max(self.length)
    }
}

/// A pickup or delivery interval within one day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub from: NaiveTime,
    pub to: NaiveTime,
}

impl TimeWindow {
    pub fn new(from: NaiveTime, to: NaiveTime) -> Self {
        Self { from, to }
    }

    /// Build from whole hours, e.g. `TimeWindow::hours(10, 18)`.
    pub fn hours(from: u32, to: u32) -> Option<Self> {
        Some(Self {
            from: NaiveTime::from_hms_opt(from, 0, 0)?,
            to: NaiveTime::from_hms_opt(to, 0, 0)?,
        })
    }

    pub fn has_elapsed(&self, now: NaiveTime) -> bool {
        now >= self.to
    }

    pub fn label(&self) -> String {
        format!("{}-{}", self.from.format("%H:%M"), self.to.format("%H:%M"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Address {
    pub country_code: String,
    pub region: Option<String>,
    pub city: String,
    pub line: String,
    pub postal_code: Option<String>,
    pub comment: Option<String>,
}

impl Address {
    pub fn full(&self) -> String {
        let mut parts = Vec::new();
        if let Some(postal_code) = &self.postal_code {
            parts.push(postal_code.as_str());
        }
        if let Some(region) = &self.region {
            parts.push(region.as_str());
        }
        parts.push(self.city.as_str());
        parts.push(self.line.as_str());
        parts.join(", ")
    }
}
