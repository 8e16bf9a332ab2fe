//! Tests for the media server client.
//!
//! These tests use mock servers to verify request shapes and error mapping
//! without a real media server.

use chrono::{TimeZone, Utc};
use gramophone_core::types::{PlaybackProgressInfo, PlaybackStartInfo, PlaybackStopInfo};
use gramophone_core::{GramophoneError, PlaybackReporter, TrackId};
use gramophone_server_client::{MediaServerClient, ServerClientError, ServerConfig, TOKEN_HEADER};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn signed_in(server: &MockServer) -> MediaServerClient {
    let config = ServerConfig::with_credentials(server.uri(), "secret-token", "user-1");
    MediaServerClient::new(config).unwrap()
}

// =============================================================================
// Client Creation Tests
// =============================================================================

mod client_creation {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(MediaServerClient::new(ServerConfig::new("https://media.example.com")).is_ok());
        assert!(MediaServerClient::new(ServerConfig::new("http://localhost:8096/jellyfin")).is_ok());
    }

    #[test]
    fn test_empty_url_rejected() {
        match MediaServerClient::new(ServerConfig::new("")) {
            Err(ServerClientError::InvalidUrl(msg)) => assert!(msg.contains("empty")),
            other => panic!("Expected InvalidUrl error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let result = MediaServerClient::new(ServerConfig::new("ftp://media.example.com"));
        assert!(matches!(result, Err(ServerClientError::InvalidUrl(_))));
    }

    #[test]
    fn test_credentials() {
        let config = ServerConfig::with_credentials("https://media.example.com", "t", "u")
            .with_device_name("kitchen");
        assert_eq!(config.device_name, "kitchen");

        let client = MediaServerClient::new(config).unwrap();
        assert!(client.is_authenticated());
        assert_eq!(client.user_id().as_deref(), Some("u"));

        let anonymous = MediaServerClient::new(ServerConfig::new("https://media.example.com"));
        assert!(!anonymous.unwrap().is_authenticated());
    }
}

// =============================================================================
// Report Tests
// =============================================================================

mod reports {
    use super::*;

    #[tokio::test]
    async fn test_start_report() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Sessions/Playing"))
            .and(header(TOKEN_HEADER, "secret-token"))
            .and(body_json(serde_json::json!({
                "ItemId": "item-1",
                "VolumeLevel": 80,
                "CanSeek": true,
                "IsPaused": false
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = signed_in(&server);
        let info = PlaybackStartInfo {
            item_id: TrackId::new("item-1"),
            volume_level: 80,
            can_seek: true,
            is_paused: false,
        };

        client.report_playback_start(&info).await.unwrap();
    }

    #[tokio::test]
    async fn test_progress_report_uses_ticks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Sessions/Playing/Progress"))
            .and(body_json(serde_json::json!({
                "ItemId": "item-1",
                "PositionTicks": 300_000_000_i64,
                "VolumeLevel": 100,
                "IsPaused": true,
                "CanSeek": true
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = signed_in(&server);
        let info = PlaybackProgressInfo::new(TrackId::new("item-1"), Duration::from_secs(30), 100, true);

        client.report_playback_progress(&info).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_report() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Sessions/Playing/Stopped"))
            .and(body_json(serde_json::json!({
                "ItemId": "item-2",
                "PositionTicks": 15_000_000_i64
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = signed_in(&server);
        let info = PlaybackStopInfo::new(TrackId::new("item-2"), Duration::from_millis(1500));

        client.report_playback_stopped(&info).await.unwrap();
    }

    #[tokio::test]
    async fn test_mark_played() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Users/user-1/PlayedItems/item-3"))
            .and(query_param("DatePlayed", "2024-03-01T12:30:00Z"))
            .and(header(TOKEN_HEADER, "secret-token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = signed_in(&server);
        let played_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

        client
            .mark_played(&TrackId::new("item-3"), "user-1", played_at)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_base_path_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jellyfin/Sessions/Playing/Stopped"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let config = ServerConfig::with_credentials(format!("{}/jellyfin/", server.uri()), "t", "u");
        let client = MediaServerClient::new(config).unwrap();

        client
            .report_stopped(&PlaybackStopInfo::new(TrackId::new("x"), Duration::ZERO))
            .await
            .unwrap();
    }
}

// =============================================================================
// Error Handling Tests
// =============================================================================

mod error_handling {
    use super::*;

    #[tokio::test]
    async fn test_unauthorized_maps_to_auth_required() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = signed_in(&server);
        let result = client
            .report_stopped(&PlaybackStopInfo::new(TrackId::new("x"), Duration::ZERO))
            .await;

        assert!(matches!(result, Err(ServerClientError::AuthRequired)));
    }

    #[tokio::test]
    async fn test_server_error_keeps_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = signed_in(&server);
        let result = client
            .report_stopped(&PlaybackStopInfo::new(TrackId::new("x"), Duration::ZERO))
            .await;

        match result {
            Err(ServerClientError::ServerError { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("Expected ServerError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_token_never_sends() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let client = MediaServerClient::new(ServerConfig::new(server.uri())).unwrap();
        let result = client
            .mark_item_played(&TrackId::new("x"), Utc::now())
            .await;

        assert!(matches!(result, Err(ServerClientError::AuthRequired)));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        // Nothing listens on port 1
        let config = ServerConfig::with_credentials("http://127.0.0.1:1", "t", "u");
        let client = MediaServerClient::new(config).unwrap();

        let err = client
            .report_playback_stopped(&PlaybackStopInfo::new(TrackId::new("x"), Duration::ZERO))
            .await
            .unwrap_err();

        assert!(matches!(err, GramophoneError::Network(_)));
    }
}
