//! Transport type classification.

use serde::{Deserialize, Serialize};

/// Fixed enumeration of transport categories a favorite can filter on.
///
/// Serialized with the raw values the apps have always persisted, so stored
/// favorites stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransportType {
    #[serde(rename = "S-Bahn")]
    SBahn,
    #[serde(rename = "U-Bahn")]
    UBahn,
    #[serde(rename = "Tram")]
    Tram,
    #[serde(rename = "StadtBus")]
    CityBus,
    #[serde(rename = "RegionalBus")]
    RegionalBus,
    #[serde(rename = "Regionalbahn")]
    RegionalBahn,
    #[serde(rename = "Regional-Express")]
    RegionalExpress,
    #[serde(rename = "ICE/IC/EC")]
    LongDistance,
}

impl TransportType {
    pub const ALL: [TransportType; 8] = [
        Self::SBahn,
        Self::UBahn,
        Self::Tram,
        Self::CityBus,
        Self::RegionalBus,
        Self::RegionalBahn,
        Self::RegionalExpress,
        Self::LongDistance,
    ];

    /// Classify a free-text mode name into at most one transport type.
    ///
    /// Rules are checked in order against the lower-cased name; the first hit
    /// wins. Order matters: regional buses must be tested before city buses,
    /// and the short `rb`/`re`/`ic` keywords come last.
    ///
    /// ```
    /// use commuter::domain::TransportType;
    ///
    /// assert_eq!(TransportType::classify("U-Bahn"), Some(TransportType::UBahn));
    /// assert_eq!(TransportType::classify("Regionalbus"), Some(TransportType::RegionalBus));
    /// assert_eq!(TransportType::classify("Bus"), Some(TransportType::CityBus));
    /// assert_eq!(TransportType::classify("Seilbahn"), None);
    /// ```
    pub fn classify(mode_class_name: &str) -> Option<Self> {
        let name = mode_class_name.to_lowercase();
        if name.is_empty() {
            return None;
        }
        let has = |needle: &str| name.contains(needle);

        if has("s-bahn") || has("sbahn") {
            Some(Self::SBahn)
        } else if has("u-bahn") || has("ubahn") {
            Some(Self::UBahn)
        } else if has("tram") || has("straßenbahn") {
            Some(Self::Tram)
        } else if has("regionalbus") || has("regbus") {
            Some(Self::RegionalBus)
        } else if has("stadtbus") || (has("bus") && !has("regional")) {
            Some(Self::CityBus)
        } else if has("regionalbahn") || has("rb") {
            Some(Self::RegionalBahn)
        } else if has("regional-express") || has("re") {
            Some(Self::RegionalExpress)
        } else if has("ice") || has("ic") || has("ec") {
            Some(Self::LongDistance)
        } else {
            None
        }
    }

    /// Map the provider's numeric product class.
    pub fn from_product_class(class: u32) -> Option<Self> {
        match class {
            1 => Some(Self::LongDistance),
            2 => Some(Self::RegionalExpress),
            4 => Some(Self::RegionalBahn),
            8 => Some(Self::SBahn),
            16 => Some(Self::UBahn),
            32 => Some(Self::Tram),
            64 => Some(Self::CityBus),
            128 => Some(Self::RegionalBus),
            _ => None,
        }
    }

    /// The persisted raw value, which also classifies back to `self`.
    pub fn raw_value(&self) -> &'static str {
        match self {
            Self::SBahn => "S-Bahn",
            Self::UBahn => "U-Bahn",
            Self::Tram => "Tram",
            Self::CityBus => "StadtBus",
            Self::RegionalBus => "RegionalBus",
            Self::RegionalBahn => "Regionalbahn",
            Self::RegionalExpress => "Regional-Express",
            Self::LongDistance => "ICE/IC/EC",
        }
    }

    /// Parse a persisted raw value.
    pub fn from_raw_value(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.raw_value() == raw)
    }

    /// Compact label for tight layouts.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::SBahn => "S",
            Self::UBahn => "U",
            Self::Tram => "T",
            Self::CityBus => "Bus",
            Self::RegionalBus => "RB",
            Self::RegionalBahn => "R",
            Self::RegionalExpress => "RE",
            Self::LongDistance => "ICE",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SBahn => "S-Bahn",
            Self::UBahn => "U-Bahn",
            Self::Tram => "Tram",
            Self::CityBus => "Bus",
            Self::RegionalBus => "RegBus",
            Self::RegionalBahn => "Regio",
            Self::RegionalExpress => "RegExp",
            Self::LongDistance => "ICE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_rail() {
        assert_eq!(TransportType::classify("S-Bahn"), Some(TransportType::SBahn));
        assert_eq!(TransportType::classify("SBAHN"), Some(TransportType::SBahn));
        assert_eq!(TransportType::classify("U-Bahn"), Some(TransportType::UBahn));
        assert_eq!(TransportType::classify("Tram"), Some(TransportType::Tram));
        assert_eq!(TransportType::classify("Straßenbahn"), Some(TransportType::Tram));
        assert_eq!(
            TransportType::classify("Regionalbahn"),
            Some(TransportType::RegionalBahn)
        );
        assert_eq!(
            TransportType::classify("Regional-Express"),
            Some(TransportType::RegionalExpress)
        );
        assert_eq!(TransportType::classify("ICE"), Some(TransportType::LongDistance));
        assert_eq!(TransportType::classify("EC"), Some(TransportType::LongDistance));
    }

    #[test]
    fn classify_buses() {
        assert_eq!(TransportType::classify("Bus"), Some(TransportType::CityBus));
        assert_eq!(TransportType::classify("StadtBus"), Some(TransportType::CityBus));
        assert_eq!(
            TransportType::classify("Regionalbus"),
            Some(TransportType::RegionalBus)
        );
        assert_eq!(
            TransportType::classify("MVV-Regionalbus"),
            Some(TransportType::RegionalBus)
        );
    }

    #[test]
    fn classify_unknown() {
        assert_eq!(TransportType::classify(""), None);
        assert_eq!(TransportType::classify("Seilbahn"), None);
    }

    #[test]
    fn raw_values_classify_to_themselves() {
        for t in TransportType::ALL {
            assert_eq!(TransportType::classify(t.raw_value()), Some(t), "{t:?}");
            assert_eq!(TransportType::from_raw_value(t.raw_value()), Some(t));
        }
    }

    #[test]
    fn product_classes() {
        assert_eq!(TransportType::from_product_class(8), Some(TransportType::SBahn));
        assert_eq!(TransportType::from_product_class(128), Some(TransportType::RegionalBus));
        assert_eq!(TransportType::from_product_class(3), None);
    }

    #[test]
    fn serde_uses_raw_values() {
        let json = serde_json::to_string(&TransportType::LongDistance).unwrap();
        assert_eq!(json, "\"ICE/IC/EC\"");
        let back: TransportType = serde_json::from_str("\"StadtBus\"").unwrap();
        assert_eq!(back, TransportType::CityBus);
    }
}
