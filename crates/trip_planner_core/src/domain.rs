//! crates/trip_planner_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//!
//! The serialized shape of a `Trip` is the on-device storage format and the
//! value held by the remote favorites store, so field names follow that format
//! (camelCase) rather than Rust naming. Every nested field is optional or
//! defaulted: stored records written by older builds, or by another device,
//! must still load.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::OnceLock;

use crate::polyline;

/// Opaque trip identifier. Assigned at creation time, unique per device.
pub type TripId = String;

//=========================================================================================
// Geography
//=========================================================================================

/// A latitude/longitude pair in floating point degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// The `{lat, lng}` shape used by place lookups.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl From<LatLng> for Coordinate {
    fn from(value: LatLng) -> Self {
        Coordinate::new(value.lat, value.lng)
    }
}

impl From<Coordinate> for LatLng {
    fn from(value: Coordinate) -> Self {
        LatLng {
            lat: value.latitude,
            lng: value.longitude,
        }
    }
}

//=========================================================================================
// Places and Routes
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredFormatting {
    pub main_text: String,
    pub secondary_text: Option<String>,
}

/// An origin or destination picked by the user.
///
/// Older records store the place as a bare string; those load as a place with
/// only a description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "PlaceRefRecord")]
pub struct PlaceRef {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LatLng>,
    #[serde(
        rename = "structured_formatting",
        skip_serializing_if = "Option::is_none"
    )]
    pub structured_formatting: Option<StructuredFormatting>,
}

impl PlaceRef {
    /// Short display name: the main text when the provider gave one.
    pub fn main_text(&self) -> &str {
        self.structured_formatting
            .as_ref()
            .map(|f| f.main_text.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or(self.description.as_str())
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        self.location.map(Coordinate::from)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlaceRefRecord {
    Text(String),
    Full(PlaceRefFields),
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct PlaceRefFields {
    description: String,
    place_id: Option<String>,
    location: Option<LatLng>,
    #[serde(rename = "structured_formatting")]
    structured_formatting: Option<StructuredFormatting>,
}

impl From<PlaceRefRecord> for PlaceRef {
    fn from(record: PlaceRefRecord) -> Self {
        match record {
            PlaceRefRecord::Text(description) => PlaceRef {
                description,
                ..Default::default()
            },
            PlaceRefRecord::Full(f) => PlaceRef {
                description: f.description,
                place_id: f.place_id,
                location: f.location,
                structured_formatting: f.structured_formatting,
            },
        }
    }
}

/// A lodging or attraction candidate returned by the places provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceCandidate {
    pub name: String,
    pub rating: Option<f64>,
    pub vicinity: Option<String>,
    pub place_id: Option<String>,
}

impl PlaceCandidate {
    pub fn maps_url(&self) -> Option<String> {
        self.place_id
            .as_ref()
            .map(|id| format!("https://www.google.com/maps/place/?q=place_id:{}", id))
    }
}

/// The kinds of nearby places a trip collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceKind {
    Lodging,
    TouristAttraction,
}

impl PlaceKind {
    pub fn as_provider_type(&self) -> &'static str {
        match self {
            PlaceKind::Lodging => "lodging",
            PlaceKind::TouristAttraction => "tourist_attraction",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextValue {
    pub text: String,
    pub value: Option<f64>,
}

/// One turn-by-turn instruction of a route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteStep {
    pub html_instructions: String,
    pub distance: Option<TextValue>,
    pub duration: Option<TextValue>,
}

impl RouteStep {
    /// The instruction text with markup tags removed.
    pub fn plain_instructions(&self) -> String {
        static TAGS: OnceLock<Regex> = OnceLock::new();
        let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));
        tags.replace_all(&self.html_instructions, "").into_owned()
    }

    pub fn distance_text(&self) -> Option<&str> {
        self.distance.as_ref().map(|d| d.text.as_str())
    }
}

/// Summary of the route between origin and destination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSummary {
    pub distance: Option<String>,
    pub duration: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub steps: Vec<RouteStep>,
    pub polyline: Option<String>,
}

//=========================================================================================
// Travelers
//=========================================================================================

/// Traveler counts for a trip.
///
/// The fields are private so that `children_ages` always has exactly one entry
/// per child; every mutation goes through a method that keeps them aligned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "TravelersRecord")]
pub struct Travelers {
    adults: u32,
    children: u32,
    children_ages: Vec<u32>,
}

impl Default for Travelers {
    fn default() -> Self {
        Self {
            adults: 1,
            children: 0,
            children_ages: Vec::new(),
        }
    }
}

impl Travelers {
    pub fn new(adults: u32, children_ages: Vec<u32>) -> Self {
        Self {
            adults: adults.max(1),
            children: children_ages.len() as u32,
            children_ages,
        }
    }

    pub fn adults(&self) -> u32 {
        self.adults
    }

    pub fn children(&self) -> u32 {
        self.children
    }

    pub fn children_ages(&self) -> &[u32] {
        &self.children_ages
    }

    /// At least one adult travels.
    pub fn set_adults(&mut self, adults: u32) {
        self.adults = adults.max(1);
    }

    /// Changes the number of children. New children get age 0; removing
    /// children drops the ages from the end.
    pub fn set_children(&mut self, children: u32) {
        self.children_ages.resize(children as usize, 0);
        self.children = children;
    }

    /// Returns `false` if `index` does not name a child.
    pub fn set_child_age(&mut self, index: usize, age: u32) -> bool {
        match self.children_ages.get_mut(index) {
            Some(slot) => {
                *slot = age;
                true
            }
            None => false,
        }
    }

    pub fn total(&self) -> u32 {
        self.adults + self.children
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TravelersRecord {
    adults: u32,
    children: u32,
    #[serde(deserialize_with = "null_as_default")]
    children_ages: Vec<u32>,
}

impl Default for TravelersRecord {
    fn default() -> Self {
        Self {
            adults: 1,
            children: 0,
            children_ages: Vec::new(),
        }
    }
}

impl From<TravelersRecord> for Travelers {
    fn from(record: TravelersRecord) -> Self {
        let mut travelers = Travelers {
            adults: record.adults.max(1),
            children: 0,
            children_ages: record.children_ages,
        };
        travelers.set_children(record.children);
        travelers
    }
}

//=========================================================================================
// Trips
//=========================================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Car,
    Moto,
    Airplane,
    Motorhome,
}

impl std::str::FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "car" => Ok(TransportMode::Car),
            "moto" => Ok(TransportMode::Moto),
            "airplane" => Ok(TransportMode::Airplane),
            "motorhome" => Ok(TransportMode::Motorhome),
            other => Err(format!("unsupported transport mode '{}'", other)),
        }
    }
}

/// A user's rating of a finished trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripReview {
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// A saved itinerary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Trip {
    pub id: TripId,
    pub origin: Option<PlaceRef>,
    pub destination: Option<PlaceRef>,
    #[serde(deserialize_with = "lenient_datetime")]
    pub departure_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_datetime")]
    pub return_date: Option<DateTime<Utc>>,
    pub travelers: Travelers,
    #[serde(deserialize_with = "null_as_default")]
    pub has_pets: bool,
    #[serde(rename = "travelType", deserialize_with = "null_as_default")]
    pub transport_mode: TransportMode,
    #[serde(rename = "routeInfo")]
    pub route: Option<RouteSummary>,
    #[serde(rename = "hotels", deserialize_with = "null_as_default")]
    pub lodging: Vec<PlaceCandidate>,
    #[serde(deserialize_with = "null_as_default")]
    pub attractions: Vec<PlaceCandidate>,
    #[serde(deserialize_with = "lenient_datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "isFavorite", deserialize_with = "null_as_default")]
    pub favorite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<TripReview>,
}

impl Trip {
    /// The decoded route geometry, empty when the trip has no route.
    pub fn decoded_path(&self) -> Vec<Coordinate> {
        self.route
            .as_ref()
            .and_then(|r| r.polyline.as_deref())
            .map(polyline::decode)
            .unwrap_or_default()
    }

    /// A plain-text summary suitable for sharing.
    pub fn share_message(&self) -> String {
        let date = |d: &Option<DateTime<Utc>>| {
            d.as_ref()
                .map(|d| d.format("%d/%m/%Y").to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        let destination = self.destination.as_ref();
        let route = self.route.as_ref();
        format!(
            "My trip to {}:\nDates: {} - {}\nOrigin: {}\nDestination: {}\nDistance: {}\nDuration: {}",
            destination.map(|d| d.main_text()).unwrap_or("-"),
            date(&self.departure_date),
            date(&self.return_date),
            self.origin.as_ref().map(|o| o.description.as_str()).unwrap_or("-"),
            destination.map(|d| d.description.as_str()).unwrap_or("-"),
            route.and_then(|r| r.distance.as_deref()).unwrap_or("-"),
            route.and_then(|r| r.duration.as_deref()).unwrap_or("-"),
        )
    }
}

//=========================================================================================
// Users and Preferences
//=========================================================================================

/// A signed-in remote account. Persisted between runs so the id token can
/// authorize the remote favorites store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user_id: String,
    pub email: Option<String>,
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    /// Whether the id token expires within `margin` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        self.expires_at <= now + margin
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetLevel {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub travel_type: TransportMode,
    pub pet_friendly: bool,
    pub budget_level: BudgetLevel,
}

/// A partial update; unset fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct PreferencesUpdate {
    pub travel_type: Option<TransportMode>,
    pub pet_friendly: Option<bool>,
    pub budget_level: Option<BudgetLevel>,
}

impl UserPreferences {
    pub fn apply(&mut self, update: PreferencesUpdate) {
        if let Some(travel_type) = update.travel_type {
            self.travel_type = travel_type;
        }
        if let Some(pet_friendly) = update.pet_friendly {
            self.pet_friendly = pet_friendly;
        }
        if let Some(budget_level) = update.budget_level {
            self.budget_level = budget_level;
        }
    }
}

//=========================================================================================
// Serde helpers
//=========================================================================================

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Dates that are missing, null or unparseable load as `None`.
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|d| d.with_timezone(&Utc))
            .ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn children_ages_follow_children_count() {
        let mut travelers = Travelers::default();
        for n in [1, 3, 2, 0, 4, 4, 1] {
            travelers.set_children(n);
            assert_eq!(travelers.children_ages().len(), travelers.children() as usize);
        }
        assert_eq!(travelers.children_ages(), &[0]);
    }

    #[test]
    fn shrinking_children_keeps_leading_ages() {
        let mut travelers = Travelers::new(2, vec![4, 7, 9]);
        travelers.set_children(2);
        assert_eq!(travelers.children_ages(), &[4, 7]);
        assert!(!travelers.set_child_age(2, 5));
        assert!(travelers.set_child_age(1, 8));
        assert_eq!(travelers.children_ages(), &[4, 8]);
    }

    #[test]
    fn adults_never_drop_below_one() {
        let mut travelers = Travelers::default();
        travelers.set_adults(0);
        assert_eq!(travelers.adults(), 1);
    }

    #[test]
    fn inconsistent_stored_travelers_are_normalized() {
        let travelers: Travelers =
            serde_json::from_value(json!({"adults": 2, "children": 2, "childrenAges": [5]}))
                .unwrap();
        assert_eq!(travelers.children_ages(), &[5, 0]);
    }

    #[test]
    fn partial_trip_record_loads() {
        let trip: Trip = serde_json::from_value(json!({
            "id": "1",
            "destination": "Test",
            "hotels": null,
            "departureDate": "not a date"
        }))
        .unwrap();
        assert_eq!(trip.id, "1");
        assert_eq!(trip.destination.unwrap().description, "Test");
        assert!(trip.lodging.is_empty());
        assert!(trip.departure_date.is_none());
        assert!(!trip.favorite);
        assert_eq!(trip.travelers.adults(), 1);
    }

    #[test]
    fn trip_uses_storage_field_names() {
        let trip = Trip {
            id: "42".to_string(),
            transport_mode: TransportMode::Motorhome,
            favorite: true,
            ..Default::default()
        };
        let value = serde_json::to_value(&trip).unwrap();
        assert_eq!(value["isFavorite"], json!(true));
        assert_eq!(value["travelType"], json!("motorhome"));
        assert!(value.get("hotels").is_some());
        assert!(value.get("review").is_none());
    }

    #[test]
    fn step_instructions_drop_markup() {
        let step = RouteStep {
            html_instructions: "Turn <b>left</b> onto <div style=\"x\">Main St</div>".to_string(),
            ..Default::default()
        };
        assert_eq!(step.plain_instructions(), "Turn left onto Main St");
    }

    #[test]
    fn share_message_tolerates_missing_fields() {
        let trip = Trip {
            destination: Some(PlaceRef {
                description: "Rio de Janeiro, RJ, Brasil".to_string(),
                structured_formatting: Some(StructuredFormatting {
                    main_text: "Rio de Janeiro".to_string(),
                    secondary_text: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let message = trip.share_message();
        assert!(message.starts_with("My trip to Rio de Janeiro:"));
        assert!(message.contains("Distance: -"));
    }

    #[test]
    fn preferences_update_merges() {
        let mut prefs = UserPreferences::default();
        prefs.apply(PreferencesUpdate {
            pet_friendly: Some(true),
            ..Default::default()
        });
        assert_eq!(prefs.travel_type, TransportMode::Car);
        assert!(prefs.pet_friendly);
        assert_eq!(prefs.budget_level, BudgetLevel::Medium);
    }

    #[test]
    fn session_expiry_uses_margin() {
        let now = Utc::now();
        let session = AuthSession {
            user_id: "u1".to_string(),
            email: None,
            id_token: "token".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: now + chrono::Duration::minutes(3),
        };
        assert!(!session.expires_within(now, chrono::Duration::minutes(1)));
        assert!(session.expires_within(now, chrono::Duration::minutes(5)));

        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["idToken"], json!("token"));
        let restored: AuthSession = serde_json::from_value(value).unwrap();
        assert_eq!(restored, session);
    }
}
