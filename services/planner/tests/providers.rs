//! Maps and auth provider adapters against a `wiremock` server.

use planner_lib::adapters::{FirebaseAuthAdapter, GoogleMapsAdapter};
use planner_lib::planner::{TripPlanner, TripRequest};
use serde_json::json;
use std::sync::Arc;
use trip_planner_core::{
    AuthService, AuthSession, Coordinate, DirectionsService, LatLng, PlaceKind, PlaceRef,
    PortError,
};
use wiremock::matchers::{body_partial_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn maps(server: &MockServer, limit: usize) -> GoogleMapsAdapter {
    GoogleMapsAdapter::new(reqwest::Client::new(), server.uri(), "maps-key", "pt-BR", limit)
}

fn auth(server: &MockServer) -> FirebaseAuthAdapter {
    FirebaseAuthAdapter::new(reqwest::Client::new(), server.uri(), "auth-key")
}

fn directions_body() -> serde_json::Value {
    json!({
        "status": "OK",
        "routes": [{
            "legs": [{
                "distance": { "text": "430 km", "value": 430000 },
                "duration": { "text": "5 horas", "value": 18000 },
                "steps": [{
                    "html_instructions": "Siga na direção <b>norte</b>",
                    "distance": { "text": "1,2 km", "value": 1200 },
                    "duration": { "text": "2 min", "value": 120 }
                }]
            }],
            "overview_polyline": { "points": "_p~iF~ps|U_ulLnnqC_mqNvxq`@" }
        }]
    })
}

fn places_body(count: usize) -> serde_json::Value {
    let results: Vec<_> = (0..count)
        .map(|i| json!({ "name": format!("Place {}", i), "rating": 4.5, "place_id": format!("p{}", i) }))
        .collect();
    json!({ "status": "OK", "results": results })
}

// ---------------------------------------------------------------------------
// Directions and places
// ---------------------------------------------------------------------------

#[tokio::test]
async fn directions_read_the_first_leg() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maps/api/directions/json"))
        .and(query_param("origin", "-23.55,-46.63"))
        .and(query_param("language", "pt-BR"))
        .and(query_param("key", "maps-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(directions_body()))
        .mount(&server)
        .await;

    let route = maps(&server, 5)
        .get_directions(Coordinate::new(-23.55, -46.63), Coordinate::new(-22.9, -43.17))
        .await
        .expect("route");

    assert_eq!(route.distance.as_deref(), Some("430 km"));
    assert_eq!(route.steps.len(), 1);
    assert_eq!(route.steps[0].plain_instructions(), "Siga na direção norte");
    assert_eq!(route.steps[0].distance_text(), Some("1,2 km"));
    assert_eq!(route.polyline.as_deref(), Some("_p~iF~ps|U_ulLnnqC_mqNvxq`@"));
}

#[tokio::test]
async fn empty_routes_are_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": "ZERO_RESULTS", "routes": [] })),
        )
        .mount(&server)
        .await;

    let err = maps(&server, 5)
        .get_directions(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::NotFound(_)));
}

#[tokio::test]
async fn denied_requests_are_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid."
        })))
        .mount(&server)
        .await;

    let err = maps(&server, 5)
        .nearby_places(Coordinate::new(0.0, 0.0), PlaceKind::Lodging, 1500)
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Unauthorized));
}

#[tokio::test]
async fn provider_errors_keep_their_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OVER_QUERY_LIMIT",
            "error_message": "You have exceeded your daily request quota."
        })))
        .mount(&server)
        .await;

    match maps(&server, 5)
        .nearby_places(Coordinate::new(0.0, 0.0), PlaceKind::Lodging, 1500)
        .await
    {
        Err(PortError::Unexpected(message)) => assert!(message.contains("quota")),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn nearby_places_are_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maps/api/place/nearbysearch/json"))
        .and(query_param("type", "tourist_attraction"))
        .and(query_param("radius", "2000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(places_body(9)))
        .mount(&server)
        .await;

    let places = maps(&server, 3)
        .nearby_places(Coordinate::new(-22.9, -43.17), PlaceKind::TouristAttraction, 2000)
        .await
        .expect("places");
    assert_eq!(places.len(), 3);
    assert_eq!(places[0].name, "Place 0");
}

#[tokio::test]
async fn planner_assembles_a_trip_from_the_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maps/api/directions/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(directions_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/maps/api/place/nearbysearch/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(places_body(8)))
        .mount(&server)
        .await;

    let planner = TripPlanner::new(Arc::new(maps(&server, 20)));
    let place = |name: &str, lat, lng| PlaceRef {
        description: name.to_string(),
        location: Some(LatLng { lat, lng }),
        ..Default::default()
    };
    let trip = planner
        .plan(TripRequest {
            origin: place("São Paulo", -23.55, -46.63),
            destination: place("Rio de Janeiro", -22.9, -43.17),
            ..Default::default()
        })
        .await
        .expect("plan");

    assert_eq!(trip.lodging.len(), 5);
    assert_eq!(trip.attractions.len(), 5);
    assert_eq!(trip.decoded_path().len(), 3);
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sign_in_returns_the_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .and(query_param("key", "auth-key"))
        .and(body_partial_json(json!({ "email": "ana@example.com", "returnSecureToken": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "localId": "uid-1",
            "email": "ana@example.com",
            "idToken": "id-token",
            "refreshToken": "refresh-token",
            "expiresIn": "3600"
        })))
        .mount(&server)
        .await;

    let session = auth(&server)
        .sign_in("ana@example.com", "secret1")
        .await
        .expect("session");
    assert_eq!(session.user_id, "uid-1");
    assert_eq!(session.id_token, "id-token");
    assert!(session.expires_at > chrono::Utc::now());
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "INVALID_LOGIN_CREDENTIALS" }
        })))
        .mount(&server)
        .await;

    assert!(matches!(
        auth(&server).sign_in("ana@example.com", "wrong").await,
        Err(PortError::Unauthorized)
    ));
}

#[tokio::test]
async fn reset_password_requests_an_email() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:sendOobCode"))
        .and(body_partial_json(json!({ "requestType": "PASSWORD_RESET" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "email": "ana@example.com" })))
        .expect(1)
        .mount(&server)
        .await;

    auth(&server)
        .reset_password("ana@example.com")
        .await
        .expect("reset");
}

fn expired_session(refresh_token: Option<&str>) -> AuthSession {
    AuthSession {
        user_id: "uid-1".to_string(),
        email: Some("ana@example.com".to_string()),
        id_token: "old-token".to_string(),
        refresh_token: refresh_token.map(str::to_string),
        expires_at: chrono::Utc::now() - chrono::Duration::minutes(5),
    }
}

#[tokio::test]
async fn refresh_renews_the_id_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/token"))
        .and(query_param("key", "auth-key"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_id": "uid-1",
            "id_token": "new-token",
            "refresh_token": "next-refresh",
            "expires_in": "3600"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let renewed = auth(&server)
        .with_token_url(server.uri())
        .refresh(&expired_session(Some("refresh-token")))
        .await
        .expect("renewed session");
    assert_eq!(renewed.id_token, "new-token");
    assert_eq!(renewed.refresh_token.as_deref(), Some("next-refresh"));
    assert_eq!(renewed.email.as_deref(), Some("ana@example.com"));
    assert!(!renewed.expires_within(chrono::Utc::now(), chrono::Duration::minutes(1)));
}

#[tokio::test]
async fn refresh_without_a_refresh_token_is_unauthorized() {
    let server = MockServer::start().await;
    let result = auth(&server)
        .with_token_url(server.uri())
        .refresh(&expired_session(None))
        .await;
    assert!(matches!(result, Err(PortError::Unauthorized)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn revoked_refresh_tokens_are_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "TOKEN_EXPIRED" }
        })))
        .mount(&server)
        .await;

    let result = auth(&server)
        .with_token_url(server.uri())
        .refresh(&expired_session(Some("stale")))
        .await;
    assert!(matches!(result, Err(PortError::Unauthorized)));
}
