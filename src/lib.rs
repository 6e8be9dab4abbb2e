// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) composes these modules into the interactive tool.
//
// Module responsibilities:
// - `config`: Explicit runtime configuration (endpoints, credential paths)
//   built once in `main` and passed down.
// - `error`: The crate's error taxonomy. Only authentication failures are
//   fatal; everything else is logged and the flow continues.
// - `auth`: Credential provider. Loads, refreshes or interactively obtains
//   an access token and hands the organizer a session.
// - `drive`: The organizer. Folder lookup/creation and file uploads against
//   the Drive v3 REST API.
// - `picker`: GUI file-selection worker thread with a bounded wait.
// - `demo`: Scripted batch that uploads four fixed samples.
// - `ui`: Interactive terminal flows built on `dialoguer`.
//
// Keeping this separation makes it easier to test the organizer against a
// mock HTTP server (see `tests/`) without touching the terminal flows.
pub mod auth;
pub mod config;
pub mod demo;
pub mod drive;
pub mod error;
pub mod picker;
pub mod ui;
