// Organizer module: a small blocking HTTP client that talks to the Drive
// v3 REST API. It is intentionally small and synchronous; there is one
// logical thread of control for all remote operations.
//
// Folder references are never cached: every upload re-resolves its
// category by name, so repeated calls are idempotent but pay one lookup
// each. Lookup-then-create is not atomic, and concurrent callers racing
// on an unseen name can each create a folder (sequential CLI use in
// practice, so the race is documented rather than locked away).

use std::fs;
use std::path::PathBuf;

use log::info;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::Session;
use crate::config::{Config, FOLDER_MIME_TYPE};
use crate::error::{Error, Result};

/// Blocking client bound to one authenticated account for the process
/// lifetime.
#[derive(Clone)]
pub struct DriveClient {
    client: Client,
    base_url: String,
    upload_url: String,
    auth: HeaderValue,
}

/// Where the bytes for an upload come from.
#[derive(Debug, Clone)]
pub enum UploadSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// One upload, built fresh per call and dropped when it resolves.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source: UploadSource,
    /// Display name the file gets on the remote side.
    pub name: String,
    /// Category label, mapped 1:1 to a folder name.
    pub category: String,
    /// Content-type hint; guessed from the path or defaulted when absent.
    pub content_type: Option<String>,
}

/// What the service reports back for a created file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub id: String,
    pub name: String,
    pub web_view_link: Option<String>,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Deserialize)]
struct FileRef {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct CreatedFolder {
    id: String,
}

impl UploadRequest {
    /// Materialize the content and its content type. A path source is read
    /// here, before any remote call, so a missing local file fails without
    /// touching the network.
    fn resolve_content(&self) -> Result<(Vec<u8>, String)> {
        match &self.source {
            UploadSource::Path(path) => {
                let bytes = fs::read(path).map_err(|e| {
                    Error::UserInput(format!("cannot read {}: {}", path.display(), e))
                })?;
                let content_type = self.content_type.clone().unwrap_or_else(|| {
                    mime_guess::from_path(path).first_or_octet_stream().to_string()
                });
                Ok((bytes, content_type))
            }
            UploadSource::Bytes(bytes) => {
                let content_type = self
                    .content_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                Ok((bytes.clone(), content_type))
            }
        }
    }
}

impl DriveClient {
    /// Bind a fresh HTTP client to the authenticated session and the
    /// configured endpoints.
    pub fn new(config: &Config, session: &Session) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::RemoteOperation(format!("failed to build HTTP client: {}", e)))?;
        let auth = HeaderValue::from_str(&format!("Bearer {}", session.access_token))
            .map_err(|e| Error::Authentication(format!("access token is not header-safe: {}", e)))?;
        Ok(DriveClient {
            client,
            base_url: config.api_base_url.clone(),
            upload_url: config.upload_base_url.clone(),
            auth,
        })
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.auth.clone());
        headers
    }

    /// Look up a non-trashed folder by exact name. Returns the first match
    /// when duplicates exist; the service's reported order is effectively
    /// arbitrary.
    pub fn find_folder(&self, name: &str) -> Result<Option<String>> {
        let query = folder_query(name);
        let url = format!("{}/files", self.base_url);
        let res = self
            .client
            .get(&url)
            .headers(self.auth_headers())
            .query(&[
                ("q", query.as_str()),
                ("spaces", "drive"),
                ("fields", "files(id, name)"),
            ])
            .send()
            .map_err(|e| Error::RemoteOperation(format!("folder lookup failed: {}", e)))?;
        let res = check_status("folder lookup", res)?;
        let list: FileList = res
            .json()
            .map_err(|e| Error::RemoteOperation(format!("invalid folder list response: {}", e)))?;
        Ok(list.files.into_iter().next().map(|folder| {
            log::debug!("first match for '{}': {} ({})", name, folder.name, folder.id);
            folder.id
        }))
    }

    /// Unconditionally create a folder; duplicate checking is the caller's
    /// concern (see `get_or_create_folder`).
    pub fn create_folder(&self, name: &str) -> Result<String> {
        let url = format!("{}/files", self.base_url);
        let metadata = json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
        });
        let res = self
            .client
            .post(&url)
            .headers(self.auth_headers())
            .query(&[("fields", "id")])
            .json(&metadata)
            .send()
            .map_err(|e| Error::RemoteOperation(format!("folder creation failed: {}", e)))?;
        let res = check_status("folder creation", res)?;
        let created: CreatedFolder = res.json().map_err(|e| {
            Error::RemoteOperation(format!("invalid folder creation response: {}", e))
        })?;
        info!("created folder '{}' ({})", name, created.id);
        Ok(created.id)
    }

    /// Resolve a category to a folder id, creating the folder when absent.
    /// Two separate remote calls; not atomic.
    pub fn get_or_create_folder(&self, name: &str) -> Result<String> {
        if let Some(id) = self.find_folder(name)? {
            info!("found existing folder '{}' ({})", name, id);
            return Ok(id);
        }
        self.create_folder(name)
    }

    /// Resolve the category folder, then upload the content as a child of
    /// it in a single multipart call. Returns the remote id, name and
    /// shareable link.
    pub fn upload(&self, request: &UploadRequest) -> Result<UploadResult> {
        let (bytes, content_type) = request.resolve_content()?;
        let folder_id = self.get_or_create_folder(&request.category)?;

        let metadata = json!({
            "name": request.name,
            "parents": [folder_id],
        });
        let boundary = Uuid::new_v4().simple().to_string();
        let body = multipart_related(&metadata, &content_type, &bytes, &boundary);

        let url = format!("{}/files", self.upload_url);
        let res = self
            .client
            .post(&url)
            .headers(self.auth_headers())
            .query(&[
                ("uploadType", "multipart"),
                ("fields", "id, name, webViewLink"),
            ])
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .map_err(|e| Error::RemoteOperation(format!("upload failed: {}", e)))?;
        let res = check_status("upload", res)?;
        let result: UploadResult = res
            .json()
            .map_err(|e| Error::RemoteOperation(format!("invalid upload response: {}", e)))?;
        info!("uploaded '{}' as {}", result.name, result.id);
        Ok(result)
    }
}

fn check_status(operation: &str, res: Response) -> Result<Response> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status();
    let body = res.text().unwrap_or_default();
    Err(Error::RemoteOperation(format!(
        "{} returned {}: {}",
        operation, status, body
    )))
}

/// Build the `files.list` query for an exact-name, non-trashed folder.
fn folder_query(name: &str) -> String {
    format!(
        "name='{}' and mimeType='{}' and trashed=false",
        escape_query_value(name),
        FOLDER_MIME_TYPE
    )
}

/// Escape backslashes and single quotes per the Drive query grammar.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Assemble a `multipart/related` body: a JSON metadata part naming the
/// parent folder, then the media part.
fn multipart_related(
    metadata: &serde_json::Value,
    content_type: &str,
    bytes: &[u8],
    boundary: &str,
) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_pass_through_the_query_escape() {
        assert_eq!(escape_query_value("Maths"), "Maths");
    }

    #[test]
    fn quotes_and_backslashes_are_escaped() {
        assert_eq!(escape_query_value("O'Brien"), "O\\'Brien");
        assert_eq!(escape_query_value(r"a\b"), r"a\\b");
    }

    #[test]
    fn folder_query_matches_exact_name_and_excludes_trash() {
        assert_eq!(
            folder_query("Science"),
            "name='Science' and mimeType='application/vnd.google-apps.folder' and trashed=false"
        );
    }

    #[test]
    fn multipart_body_has_metadata_then_media() {
        let metadata = json!({ "name": "a.txt", "parents": ["folder-1"] });
        let body = multipart_related(&metadata, "text/plain", b"hello", "BOUNDARY");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--BOUNDARY\r\n"));
        assert!(text.ends_with("\r\n--BOUNDARY--\r\n"));
        let metadata_at = text.find("\"parents\":[\"folder-1\"]").unwrap();
        let media_at = text.find("Content-Type: text/plain\r\n\r\nhello").unwrap();
        assert!(metadata_at < media_at);
    }

    #[test]
    fn byte_sources_default_to_octet_stream() {
        let request = UploadRequest {
            source: UploadSource::Bytes(b"data".to_vec()),
            name: "data.bin".into(),
            category: "Misc".into(),
            content_type: None,
        };
        let (bytes, content_type) = request.resolve_content().unwrap();
        assert_eq!(bytes, b"data");
        assert_eq!(content_type, "application/octet-stream");
    }

    #[test]
    fn path_sources_guess_their_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "some notes").unwrap();
        let request = UploadRequest {
            source: UploadSource::Path(path),
            name: "notes.txt".into(),
            category: "Maths".into(),
            content_type: None,
        };
        let (bytes, content_type) = request.resolve_content().unwrap();
        assert_eq!(bytes, b"some notes");
        assert_eq!(content_type, "text/plain");
    }

    #[test]
    fn missing_path_fails_before_any_request_is_built() {
        let request = UploadRequest {
            source: UploadSource::Path(PathBuf::from("/no/such/file.txt")),
            name: "file.txt".into(),
            category: "Maths".into(),
            content_type: None,
        };
        assert!(request.resolve_content().is_err());
    }
}
