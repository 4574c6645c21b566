//! EFA `rapidJSON` response DTOs.
//!
//! These map directly onto the departure monitor and stop finder
//! responses. Nearly everything is optional because the API omits fields
//! freely.

use serde::Deserialize;

/// Informational or error message attached to a response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMessage {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub module: Option<String>,
    pub code: Option<i64>,
    pub text: Option<String>,
}

/// Response from `XML_DM_REQUEST`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartureResponse {
    pub version: Option<String>,
    pub system_messages: Option<Vec<SystemMessage>>,
    pub stop_events: Option<Vec<StopEvent>>,
}

/// One departure on the board.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopEvent {
    pub is_realtime_controlled: Option<bool>,
    /// The stop point (platform) the vehicle departs from.
    pub location: Option<StopPoint>,
    pub departure_time_planned: Option<String>,
    pub departure_time_estimated: Option<String>,
    pub transportation: Option<Transportation>,
    pub onward_locations: Option<Vec<StopPoint>>,
}

/// A stop point: a platform, or a stop along the route.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopPoint {
    pub id: Option<String>,
    pub name: Option<String>,
    pub properties: Option<PlatformProperties>,
    pub parent: Option<LocationParent>,
}

/// Platform labels, in the order the app prefers them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformProperties {
    pub platform_name: Option<String>,
    pub planned_platform_name: Option<String>,
    pub platform: Option<String>,
    pub stop_id: Option<String>,
}

/// The line serving a departure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transportation {
    pub id: Option<String>,
    pub name: Option<String>,
    pub disassembled_name: Option<String>,
    /// Line label such as `S8` or `U6`.
    pub number: Option<String>,
    pub product: Option<Product>,
    pub destination: Option<Destination>,
}

/// Transport product.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Option<i64>,
    /// Product class bit (1 ICE, 2 RE, 4 RB, 8 S, 16 U, 32 Tram, 64 Bus,
    /// 128 regional bus).
    #[serde(rename = "class")]
    pub product_class: Option<u32>,
    /// Mode class name such as `S-Bahn` or `MetroBus`.
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Response from `XML_STOPFINDER_REQUEST`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopFinderResponse {
    pub version: Option<String>,
    pub system_messages: Option<Vec<SystemMessage>>,
    pub locations: Option<Vec<Location>>,
}

/// A stop finder hit: a stop, a coordinate, an address.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub disassembled_name: Option<String>,
    /// `[lat, lon]`.
    pub coord: Option<Vec<f64>>,
    pub parent: Option<LocationParent>,
    pub assigned_stops: Option<Vec<AssignedStop>>,
    /// Meters from the query point, for proximity searches.
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationParent {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// A stop near a coordinate, nested under a stop finder location.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedStop {
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub coord: Option<Vec<f64>>,
    pub parent: Option<LocationParent>,
    pub distance: Option<f64>,
    pub product_classes: Option<Vec<u32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn departure_response_tolerates_missing_fields() {
        let json = r#"{
            "version": "10.6.20.22",
            "stopEvents": [
                {
                    "departureTimePlanned": "2024-03-15T09:05:00Z",
                    "transportation": {
                        "number": "S8",
                        "product": { "class": 8, "name": "S-Bahn" },
                        "destination": { "name": "Flughafen München" }
                    },
                    "location": { "properties": { "platform": "1", "platformName": "Gleis 1" } }
                },
                {}
            ]
        }"#;

        let response: DepartureResponse = serde_json::from_str(json).unwrap();
        let events = response.stop_events.unwrap();
        assert_eq!(events.len(), 2);

        let product = events[0]
            .transportation
            .as_ref()
            .and_then(|t| t.product.as_ref())
            .unwrap();
        assert_eq!(product.product_class, Some(8));
        assert_eq!(product.name.as_deref(), Some("S-Bahn"));
        assert!(events[1].transportation.is_none());
    }

    #[test]
    fn stop_finder_with_assigned_stops() {
        let json = r#"{
            "locations": [
                {
                    "id": "streetID:1500000123",
                    "type": "street",
                    "assignedStops": [
                        { "id": "de:09162:6", "name": "Hauptbahnhof", "distance": 120, "coord": [48.14, 11.56] }
                    ]
                }
            ]
        }"#;

        let response: StopFinderResponse = serde_json::from_str(json).unwrap();
        let locations = response.locations.unwrap();
        let stops = locations[0].assigned_stops.as_ref().unwrap();
        assert_eq!(stops[0].id, "de:09162:6");
        assert_eq!(stops[0].distance, Some(120.0));
    }
}
