// Hit classification value objects

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PiracyType {
    Extortion,
    #[serde(rename = "Brute Force")]
    BruteForce,
}

impl PiracyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PiracyType::Extortion => "Extortion",
            PiracyType::BruteForce => "Brute Force",
        }
    }

    /// Forgiving parse from free text; `None` for unrecognized input.
    pub fn parse(raw: &str) -> Option<Self> {
        let canon: String = raw
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_lowercase();
        match canon.as_str() {
            "extortion" | "extort" | "ransom" => Some(PiracyType::Extortion),
            "bruteforce" | "brute" | "force" => Some(PiracyType::BruteForce),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Engagement {
    Air,
    Ground,
}

impl Engagement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engagement::Air => "Air",
            Engagement::Ground => "Ground",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "air" | "space" | "flight" => Some(Engagement::Air),
            "ground" | "surface" | "foot" => Some(Engagement::Ground),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntakeStep {
    Cargo,
    Assists,
    Details,
    Confirm,
    Completed,
}

impl IntakeStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntakeStep::Cargo => "cargo",
            IntakeStep::Assists => "assists",
            IntakeStep::Details => "details",
            IntakeStep::Confirm => "confirm",
            IntakeStep::Completed => "completed",
        }
    }
}
