// src/joints.rs - Joint and coordinate identifiers
use once_cell::sync::Lazy;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

use crate::error::LookupError;

pub const JOINT_COUNT: usize = 20;

/// Tracked body joints, in the sensor's skeleton array order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JointName {
    HipCenter = 0,
    Spine,
    ShoulderCenter,
    Head,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
}

impl JointName {
    pub const ALL: [JointName; JOINT_COUNT] = [
        JointName::HipCenter,
        JointName::Spine,
        JointName::ShoulderCenter,
        JointName::Head,
        JointName::ShoulderLeft,
        JointName::ElbowLeft,
        JointName::WristLeft,
        JointName::HandLeft,
        JointName::ShoulderRight,
        JointName::ElbowRight,
        JointName::WristRight,
        JointName::HandRight,
        JointName::HipLeft,
        JointName::KneeLeft,
        JointName::AnkleLeft,
        JointName::FootLeft,
        JointName::HipRight,
        JointName::KneeRight,
        JointName::AnkleRight,
        JointName::FootRight,
    ];

    /// Position of this joint in a sensor skeleton record.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Canonical lowercase key, e.g. `handleft`.
    pub fn key(self) -> &'static str {
        match self {
            JointName::HipCenter => "hipcenter",
            JointName::Spine => "spine",
            JointName::ShoulderCenter => "shouldercenter",
            JointName::Head => "head",
            JointName::ShoulderLeft => "shoulderleft",
            JointName::ElbowLeft => "elbowleft",
            JointName::WristLeft => "wristleft",
            JointName::HandLeft => "handleft",
            JointName::ShoulderRight => "shoulderright",
            JointName::ElbowRight => "elbowright",
            JointName::WristRight => "wristright",
            JointName::HandRight => "handright",
            JointName::HipLeft => "hipleft",
            JointName::KneeLeft => "kneeleft",
            JointName::AnkleLeft => "ankleleft",
            JointName::FootLeft => "footleft",
            JointName::HipRight => "hipright",
            JointName::KneeRight => "kneeright",
            JointName::AnkleRight => "ankleright",
            JointName::FootRight => "footright",
        }
    }

    /// Parses a joint name from a user supplied token (`HandLeft`, `hand_left`, `hand-left`).
    pub fn from_key(token: &str) -> Result<Self, LookupError> {
        JOINTS_BY_KEY
            .get(normalize_key(token).as_str())
            .copied()
            .ok_or_else(|| LookupError::UnknownJoint(token.to_string()))
    }
}

static JOINTS_BY_KEY: Lazy<HashMap<&'static str, JointName>> =
    Lazy::new(|| JointName::ALL.iter().map(|&joint| (joint.key(), joint)).collect());

impl fmt::Display for JointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for JointName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

/// One component of a joint sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coord {
    X,
    Y,
    Z,
    W,
}

impl Coord {
    pub const ALL: [Coord; 4] = [Coord::X, Coord::Y, Coord::Z, Coord::W];

    pub fn key(self) -> &'static str {
        match self {
            Coord::X => "x",
            Coord::Y => "y",
            Coord::Z => "z",
            Coord::W => "w",
        }
    }

    pub fn from_key(token: &str) -> Result<Self, LookupError> {
        match normalize_key(token).as_str() {
            "x" => Ok(Coord::X),
            "y" => Ok(Coord::Y),
            "z" => Ok(Coord::Z),
            "w" => Ok(Coord::W),
            _ => Err(LookupError::UnknownCoord(token.to_string())),
        }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Lowercases a lookup token and drops `_` and `-`.
pub fn normalize_key(token: &str) -> String {
    token
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}
