// Credential provider behavior around the persisted token.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;
use tokio::runtime::Runtime;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivesort::auth;
use drivesort::config::Config;

fn config_with_token(token_path: PathBuf) -> Config {
    Config {
        api_base_url: "http://127.0.0.1:1".to_string(),
        upload_base_url: "http://127.0.0.1:1".to_string(),
        // Deliberately absent: any refresh or interactive attempt would
        // fail loudly instead of silently passing the test.
        client_secret_path: PathBuf::from("/nonexistent/credentials.json"),
        token_path,
        scope: "https://www.googleapis.com/auth/drive.file".to_string(),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

#[test]
fn a_saved_valid_token_skips_authorization_entirely() {
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    let token = json!({
        "access_token": "cached-token",
        "refresh_token": "cached-refresh",
        "expires_at": unix_now() + 3_600,
    });
    std::fs::write(&token_path, token.to_string()).unwrap();

    let session = auth::obtain_session(&config_with_token(token_path)).unwrap();
    assert_eq!(session.access_token, "cached-token");
}

#[test]
fn an_expired_token_without_refresh_needs_full_authorization() {
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    let token = json!({
        "access_token": "stale-token",
        "expires_at": unix_now() - 10,
    });
    std::fs::write(&token_path, token.to_string()).unwrap();

    // With no refresh token and no client secret file, the provider has no
    // path left and must fail instead of handing back the stale token.
    let err = auth::obtain_session(&config_with_token(token_path)).unwrap_err();
    assert!(err.to_string().contains("authentication failed"));
}

#[test]
fn an_expired_token_with_a_refresh_grant_is_renewed_and_persisted() {
    let rt = Runtime::new().unwrap();
    let server = rt.block_on(MockServer::start());

    rt.block_on(async {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=old-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-token",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;
    });

    let dir = tempfile::tempdir().unwrap();
    let secret_path = dir.path().join("credentials.json");
    let secret = json!({
        "installed": {
            "client_id": "id",
            "client_secret": "shhh",
            "auth_uri": format!("{}/auth", server.uri()),
            "token_uri": format!("{}/token", server.uri()),
        }
    });
    std::fs::write(&secret_path, secret.to_string()).unwrap();

    let token_path = dir.path().join("token.json");
    let token = json!({
        "access_token": "stale-token",
        "refresh_token": "old-refresh",
        "expires_at": unix_now() - 10,
    });
    std::fs::write(&token_path, token.to_string()).unwrap();

    let mut config = config_with_token(token_path.clone());
    config.client_secret_path = secret_path;

    let session = auth::obtain_session(&config).unwrap();
    assert_eq!(session.access_token, "fresh-token");

    // The refresh response carried no refresh token; the old one must
    // survive in the persisted file alongside the new access token.
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&token_path).unwrap()).unwrap();
    assert_eq!(saved["access_token"], "fresh-token");
    assert_eq!(saved["refresh_token"], "old-refresh");

    rt.block_on(server.verify());
}

#[test]
fn a_corrupt_token_file_is_not_fatal_on_its_own() {
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    std::fs::write(&token_path, "not json at all").unwrap();

    // The unreadable file is logged and skipped; failure here comes from
    // the next step (no client secret), not from the corrupt file.
    let err = auth::obtain_session(&config_with_token(token_path)).unwrap_err();
    assert!(err.to_string().contains("client secret"));
}
