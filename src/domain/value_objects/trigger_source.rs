use serde::{Deserialize, Serialize};

/// Where a fall-trigger event came from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    /// Operator pressed "simulate" (test action)
    #[default]
    Manual,
    /// The paired wearable reported a fall
    Device,
    /// Operator asked to re-send after a dispatch that reached nobody
    Retry,
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Device => write!(f, "device"),
            Self::Retry => write!(f, "retry"),
        }
    }
}

impl std::str::FromStr for TriggerSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "device" => Ok(Self::Device),
            "retry" => Ok(Self::Retry),
            other => Err(format!("unknown trigger source: {other}")),
        }
    }
}
