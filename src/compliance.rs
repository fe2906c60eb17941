//! Compliance score for a single detection record.
//!
//! Each review flag confirms one safety condition. A flag left unconfirmed
//! costs points; so does riding above the speed limit.

use serde::{Deserialize, Serialize};

use crate::model::DetectionModel;

pub const SPEED_LIMIT_KMH: f64 = 30.0;

const HELMET_PENALTY: u8 = 40;
const RIDER_PENALTY: u8 = 30;
const PASSENGER_PENALTY: u8 = 20;
const SPEED_PENALTY: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    Excellent,
    Moderate,
    Poor,
}

impl Grade {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => Grade::Excellent,
            50..=79 => Grade::Moderate,
            _ => Grade::Poor,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Grade::Excellent => "Excellent Compliance",
            Grade::Moderate => "Moderate Compliance",
            Grade::Poor => "Poor Compliance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    NoHelmet,
    NonHelmetRider,
    NoPassengerHelmet,
    Speeding,
}

impl Violation {
    pub fn penalty(&self) -> u8 {
        match self {
            Violation::NoHelmet => HELMET_PENALTY,
            Violation::NonHelmetRider => RIDER_PENALTY,
            Violation::NoPassengerHelmet => PASSENGER_PENALTY,
            Violation::Speeding => SPEED_PENALTY,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Violation::NoHelmet => "No Helmet",
            Violation::NonHelmetRider => "Rider helmet not confirmed",
            Violation::NoPassengerHelmet => "No Passenger Helmet",
            Violation::Speeding => "Speed Limit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub score: u8,
    pub grade: Grade,
    pub violations: Vec<Violation>,
}

impl ComplianceReport {
    pub fn is_compliant(&self) -> bool {
        self.violations.is_empty()
    }
}

pub fn violations(
    helmet_detected: bool,
    non_helmet_rider: bool,
    passenger_with_helmet: bool,
    vehicle_speed: f64,
) -> Vec<Violation> {
    let mut found = Vec::new();
    if !helmet_detected {
        found.push(Violation::NoHelmet);
    }
    if !non_helmet_rider {
        found.push(Violation::NonHelmetRider);
    }
    if !passenger_with_helmet {
        found.push(Violation::NoPassengerHelmet);
    }
    if vehicle_speed > SPEED_LIMIT_KMH {
        found.push(Violation::Speeding);
    }
    found
}

pub fn assess(record: &DetectionModel) -> ComplianceReport {
    let violations = violations(
        record.helmet_detected,
        record.non_helmet_rider,
        record.passenger_with_helmet,
        record.vehicle_speed,
    );
    let score = violations
        .iter()
        .fold(100u8, |score, v| score.saturating_sub(v.penalty()));
    ComplianceReport {
        score,
        grade: Grade::from_score(score),
        violations,
    }
}
