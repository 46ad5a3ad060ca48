use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Annotation attached to a catalogued sample.
///
/// Stored as its integer code so existing catalogues stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Label {
    Absent = 0,
    Present = 1,
    Unsure = 2,
    Defected = 3,
}

impl Label {
    pub const ALL: [Label; 4] = [Label::Absent, Label::Present, Label::Unsure, Label::Defected];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn description(self) -> &'static str {
        match self {
            Label::Absent => "No avalanche present",
            Label::Present => "Avalanche present",
            Label::Unsure => "Unsure whether an avalanche is present",
            Label::Defected => "Sample is defected and should not be used",
        }
    }
}

impl TryFrom<u8> for Label {
    type Error = CatalogError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Label::ALL
            .into_iter()
            .find(|l| l.code() == code)
            .ok_or_else(|| CatalogError::InvalidItem(format!("unknown label code {code}")))
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> Self {
        label.code()
    }
}

impl FromStr for Label {
    type Err = CatalogError;

    /// Accepts the integer code or the lower-case name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u8>() {
            return Label::try_from(code);
        }
        match s.to_ascii_lowercase().as_str() {
            "absent" => Ok(Label::Absent),
            "present" => Ok(Label::Present),
            "unsure" => Ok(Label::Unsure),
            "defected" => Ok(Label::Defected),
            _ => Err(CatalogError::InvalidItem(format!("unknown label '{s}'"))),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Label::Absent => "absent",
            Label::Present => "present",
            Label::Unsure => "unsure",
            Label::Defected => "defected",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_integer_code() {
        assert_eq!(serde_json::to_string(&Label::Unsure).unwrap(), "2");
        let back: Label = serde_json::from_str("3").unwrap();
        assert_eq!(back, Label::Defected);
        assert!(serde_json::from_str::<Label>("7").is_err());
    }

    #[test]
    fn parses_codes_and_names() {
        assert_eq!("1".parse::<Label>().unwrap(), Label::Present);
        assert_eq!("Absent".parse::<Label>().unwrap(), Label::Absent);
        assert!("maybe".parse::<Label>().is_err());
    }
}
