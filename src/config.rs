// Runtime configuration. The original prototype kept these as ambient
// constants; here everything the credential provider and the organizer
// need lives in one struct constructed by `main`.

use std::path::PathBuf;

/// Reserved MIME type the service uses to mark folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Clone)]
pub struct Config {
    /// Drive v3 metadata endpoint (folder lookup and creation).
    pub api_base_url: String,
    /// Drive v3 media endpoint (multipart file uploads).
    pub upload_base_url: String,
    /// OAuth client secret file, supplied by the user out-of-band.
    pub client_secret_path: PathBuf,
    /// Where the serialized token is persisted between runs.
    pub token_path: PathBuf,
    /// Requested OAuth scope.
    pub scope: String,
}

impl Config {
    /// Build a config from the environment, falling back to the Google
    /// endpoints and the platform config directory.
    pub fn from_env() -> Self {
        let api_base_url = std::env::var("DRIVE_API_URL")
            .unwrap_or_else(|_| "https://www.googleapis.com/drive/v3".into());
        let upload_base_url = std::env::var("DRIVE_UPLOAD_URL")
            .unwrap_or_else(|_| "https://www.googleapis.com/upload/drive/v3".into());
        let client_secret_path = std::env::var("DRIVE_CLIENT_SECRET")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("credentials.json"));
        let token_path = std::env::var("DRIVE_TOKEN_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_token_path());
        Config {
            api_base_url,
            upload_base_url,
            client_secret_path,
            token_path,
            scope: "https://www.googleapis.com/auth/drive.file".into(),
        }
    }
}

fn default_token_path() -> PathBuf {
    let dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join("drivesort").join("token.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_token_path_is_under_the_app_dir() {
        let path = default_token_path();
        assert!(path.ends_with("drivesort/token.json"));
    }
}
