// Credential provider: turns the on-disk token, the refresh grant and the
// interactive authorization-code flow into one access token for the
// organizer. Read or write problems with the persisted token are logged
// and skipped; only ending up with no usable credential at all is fatal.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use dialoguer::Input;
use log::{info, warn};
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};

/// Redirect target for the manual paste-the-code fallback.
const OOB_REDIRECT: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Seconds of slack before the recorded expiry at which a token is already
/// treated as expired.
const EXPIRY_SKEW_SECS: u64 = 60;

/// Authenticated session handed to the organizer. Holds nothing but the
/// bearer token; process exit is its teardown.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
}

/// Serialized shape of the persisted credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Absolute unix seconds; `None` means "unknown, assume valid".
    #[serde(default)]
    pub expires_at: Option<u64>,
}

impl StoredToken {
    pub fn is_expired(&self, now: u64) -> bool {
        match self.expires_at {
            Some(at) => now + EXPIRY_SKEW_SECS >= at,
            None => false,
        }
    }
}

/// The `installed` section of a Google OAuth client secret file.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: ClientSecret,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Produce a usable session, trying in order: the persisted token, a
/// refresh grant, the interactive authorization flow. Whatever credential
/// results is persisted for the next run (best effort).
pub fn obtain_session(config: &Config) -> Result<Session> {
    println!("Authenticating with Google Drive...");

    let loaded = match load_token(&config.token_path) {
        Ok(token) => token,
        Err(e) => {
            warn!("ignoring unreadable token file: {}", e);
            None
        }
    };

    let now = unix_now();
    let mut refreshed: Option<StoredToken> = None;

    if let Some(token) = loaded {
        if !token.is_expired(now) {
            info!("using persisted token from {}", config.token_path.display());
            return Ok(Session {
                access_token: token.access_token,
            });
        }
        if let Some(refresh_token) = token.refresh_token.clone() {
            match refresh(config, &refresh_token) {
                Ok(mut token) => {
                    // The token endpoint usually omits the refresh token on
                    // a refresh grant; keep the one we already have.
                    if token.refresh_token.is_none() {
                        token.refresh_token = Some(refresh_token);
                    }
                    println!("Refreshed expired credentials.");
                    refreshed = Some(token);
                }
                Err(e) => {
                    warn!("token refresh failed, starting authorization: {}", e);
                }
            }
        }
    }

    let token = match refreshed {
        Some(token) => token,
        None => authorize_interactively(config)?,
    };

    match save_token(&config.token_path, &token) {
        Ok(()) => info!("saved token to {}", config.token_path.display()),
        Err(e) => warn!("could not persist token: {}", e),
    }

    Ok(Session {
        access_token: token.access_token,
    })
}

fn load_token(path: &Path) -> Result<Option<StoredToken>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path).map_err(|e| persistence(path, e.to_string()))?;
    let token = serde_json::from_str(&data).map_err(|e| persistence(path, e.to_string()))?;
    Ok(Some(token))
}

fn save_token(path: &Path, token: &StoredToken) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| persistence(path, e.to_string()))?;
    }
    let data = serde_json::to_string_pretty(token).map_err(|e| persistence(path, e.to_string()))?;
    fs::write(path, data).map_err(|e| persistence(path, e.to_string()))?;
    Ok(())
}

fn persistence(path: &Path, message: String) -> Error {
    Error::CredentialPersistence {
        path: path.to_path_buf(),
        message,
    }
}

fn read_client_secret(path: &Path) -> Result<ClientSecret> {
    let data = fs::read_to_string(path).map_err(|e| {
        Error::Authentication(format!(
            "cannot read client secret {}: {}",
            path.display(),
            e
        ))
    })?;
    let file: ClientSecretFile = serde_json::from_str(&data)
        .map_err(|e| Error::Authentication(format!("invalid client secret file: {}", e)))?;
    Ok(file.installed)
}

fn refresh(config: &Config, refresh_token: &str) -> Result<StoredToken> {
    let secret = read_client_secret(&config.client_secret_path)?;
    let client = reqwest::blocking::Client::new();
    let params = [
        ("client_id", secret.client_id.as_str()),
        ("client_secret", secret.client_secret.as_str()),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];
    let res = client
        .post(&secret.token_uri)
        .form(&params)
        .send()
        .map_err(|e| Error::Authentication(format!("token refresh request failed: {}", e)))?;
    token_from_response(res)
}

/// Interactive authorization: browser flow against a loopback redirect
/// when a local port can be bound, manual code entry otherwise.
fn authorize_interactively(config: &Config) -> Result<StoredToken> {
    let secret = read_client_secret(&config.client_secret_path)?;
    match TcpListener::bind(("127.0.0.1", 0)) {
        Ok(listener) => browser_flow(config, &secret, listener),
        Err(e) => {
            warn!(
                "cannot bind a loopback port for the redirect ({}), using manual code entry",
                e
            );
            manual_flow(config, &secret)
        }
    }
}

fn browser_flow(
    config: &Config,
    secret: &ClientSecret,
    listener: TcpListener,
) -> Result<StoredToken> {
    let port = listener
        .local_addr()
        .map_err(|e| Error::Authentication(format!("loopback listener has no address: {}", e)))?
        .port();
    let redirect_uri = format!("http://127.0.0.1:{}", port);
    // Round-tripped through the redirect so a stray local request cannot
    // hand us someone else's code.
    let state = Uuid::new_v4().simple().to_string();
    let url = consent_url(secret, &config.scope, &redirect_uri, Some(&state));

    println!("Opening your browser for authorization...");
    if let Err(e) = open::that(&url) {
        warn!("could not launch a browser: {}", e);
        println!("Open this URL manually:\n{}", url);
    }

    let code = wait_for_redirect(&listener, &state)?;
    exchange_code(secret, &code, &redirect_uri)
}

fn manual_flow(config: &Config, secret: &ClientSecret) -> Result<StoredToken> {
    let url = consent_url(secret, &config.scope, OOB_REDIRECT, None);
    println!("Open this URL in a browser, authorize the app, then paste the code below:");
    println!("{}", url);
    let code: String = Input::new()
        .with_prompt("Authorization code")
        .interact_text()
        .map_err(|e| Error::Authentication(format!("reading authorization code: {}", e)))?;
    exchange_code(secret, code.trim(), OOB_REDIRECT)
}

fn consent_url(
    secret: &ClientSecret,
    scope: &str,
    redirect_uri: &str,
    state: Option<&str>,
) -> String {
    let mut url = format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
        secret.auth_uri,
        encode(&secret.client_id),
        encode(redirect_uri),
        encode(scope),
    );
    if let Some(state) = state {
        url.push_str("&state=");
        url.push_str(&encode(state));
    }
    url
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

/// Block until the provider redirects the browser back to us with our
/// `state`, answering each connection with a small page. Browser
/// preconnects and favicon probes hit the listener too, so connections
/// that carry no code or a foreign state are answered and ignored rather
/// than consuming the wait.
fn wait_for_redirect(listener: &TcpListener, expected_state: &str) -> Result<String> {
    loop {
        let (stream, _) = listener
            .accept()
            .map_err(|e| Error::Authentication(format!("redirect listener failed: {}", e)))?;
        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).is_err() {
            continue;
        }
        match parse_redirect(&request_line) {
            RedirectOutcome::Code { code, state } if state.as_deref() == Some(expected_state) => {
                answer_browser(&stream, "Authorization complete. You can close this window.");
                return Ok(code);
            }
            RedirectOutcome::Code { .. } => {
                warn!("ignoring a redirect with a mismatched state");
                answer_browser(&stream, "Stale authorization response; still waiting.");
            }
            RedirectOutcome::Denied(reason) => {
                answer_browser(&stream, "Authorization failed. You can close this window.");
                return Err(Error::Authentication(format!(
                    "authorization denied: {}",
                    reason
                )));
            }
            RedirectOutcome::Unrelated => {
                answer_browser(&stream, "Waiting for authorization...");
            }
        }
    }
}

fn answer_browser(stream: &TcpStream, body: &str) {
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let mut stream = stream;
    if let Err(e) = stream.write_all(response.as_bytes()) {
        warn!("could not answer the browser redirect: {}", e);
    }
}

#[derive(Debug, PartialEq)]
enum RedirectOutcome {
    Code { code: String, state: Option<String> },
    Denied(String),
    Unrelated,
}

/// Classify one request line (`GET /?code=...&state=... HTTP/1.1`). An
/// `error` parameter means the user denied the consent screen; anything
/// without a code is some other local request.
fn parse_redirect(request_line: &str) -> RedirectOutcome {
    let target = match request_line.split_whitespace().nth(1) {
        Some(target) => target,
        None => return RedirectOutcome::Unrelated,
    };
    let query = target.splitn(2, '?').nth(1).unwrap_or("");
    let mut code = None;
    let mut state = None;
    for pair in query.split('&') {
        let mut parts = pair.splitn(2, '=');
        let key = parts.next().unwrap_or("");
        let value = parts.next().unwrap_or("");
        match key {
            "code" => match percent_decode_str(value).decode_utf8() {
                Ok(decoded) => code = Some(decoded.into_owned()),
                Err(_) => return RedirectOutcome::Unrelated,
            },
            "state" => {
                if let Ok(decoded) = percent_decode_str(value).decode_utf8() {
                    state = Some(decoded.into_owned());
                }
            }
            "error" => return RedirectOutcome::Denied(value.to_string()),
            _ => {}
        }
    }
    match code {
        Some(code) => RedirectOutcome::Code { code, state },
        None => RedirectOutcome::Unrelated,
    }
}

fn exchange_code(secret: &ClientSecret, code: &str, redirect_uri: &str) -> Result<StoredToken> {
    let client = reqwest::blocking::Client::new();
    let params = [
        ("client_id", secret.client_id.as_str()),
        ("client_secret", secret.client_secret.as_str()),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("grant_type", "authorization_code"),
    ];
    let res = client
        .post(&secret.token_uri)
        .form(&params)
        .send()
        .map_err(|e| Error::Authentication(format!("code exchange request failed: {}", e)))?;
    token_from_response(res)
}

fn token_from_response(res: reqwest::blocking::Response) -> Result<StoredToken> {
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().unwrap_or_default();
        return Err(Error::Authentication(format!(
            "token endpoint returned {}: {}",
            status, body
        )));
    }
    let parsed: TokenResponse = res
        .json()
        .map_err(|e| Error::Authentication(format!("invalid token response: {}", e)))?;
    let expires_at = parsed.expires_in.map(|secs| unix_now() + secs);
    Ok(StoredToken {
        access_token: parsed.access_token,
        refresh_token: parsed.refresh_token,
        expires_at,
    })
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
