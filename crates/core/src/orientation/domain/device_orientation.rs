use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Physical orientation of the device holding the camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceOrientation {
    Unknown,
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
}

impl DeviceOrientation {
    pub const ALL: &'static [DeviceOrientation] = &[
        DeviceOrientation::Unknown,
        DeviceOrientation::Portrait,
        DeviceOrientation::PortraitUpsideDown,
        DeviceOrientation::LandscapeLeft,
        DeviceOrientation::LandscapeRight,
        DeviceOrientation::FaceUp,
        DeviceOrientation::FaceDown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceOrientation::Unknown => "unknown",
            DeviceOrientation::Portrait => "portrait",
            DeviceOrientation::PortraitUpsideDown => "portrait-upside-down",
            DeviceOrientation::LandscapeLeft => "landscape-left",
            DeviceOrientation::LandscapeRight => "landscape-right",
            DeviceOrientation::FaceUp => "face-up",
            DeviceOrientation::FaceDown => "face-down",
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            DeviceOrientation::Unknown => 0,
            DeviceOrientation::Portrait => 1,
            DeviceOrientation::PortraitUpsideDown => 2,
            DeviceOrientation::LandscapeLeft => 3,
            DeviceOrientation::LandscapeRight => 4,
            DeviceOrientation::FaceUp => 5,
            DeviceOrientation::FaceDown => 6,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => DeviceOrientation::Portrait,
            2 => DeviceOrientation::PortraitUpsideDown,
            3 => DeviceOrientation::LandscapeLeft,
            4 => DeviceOrientation::LandscapeRight,
            5 => DeviceOrientation::FaceUp,
            6 => DeviceOrientation::FaceDown,
            _ => DeviceOrientation::Unknown,
        }
    }
}

impl fmt::Display for DeviceOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceOrientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceOrientation::ALL
            .iter()
            .copied()
            .find(|o| o.as_str() == s)
            .ok_or_else(|| format!("unknown device orientation '{s}'"))
    }
}

/// Which side of the device the active camera faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraPosition {
    Back,
    Front,
}

impl fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraPosition::Back => write!(f, "back"),
            CameraPosition::Front => write!(f, "front"),
        }
    }
}

impl FromStr for CameraPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "back" => Ok(CameraPosition::Back),
            "front" => Ok(CameraPosition::Front),
            other => Err(format!("camera must be 'front' or 'back', got '{other}'")),
        }
    }
}
