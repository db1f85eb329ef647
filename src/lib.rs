// Library root
// -----------
// This crate exposes the library surface of the Elfsquad CLI. The binary
// (`main.rs`) parses the command line and delegates to these modules.
//
// Module responsibilities:
// - `config`: endpoints, client identifiers and paths, overridable from the
//   environment.
// - `credentials`: the persisted token record and its on-disk store.
// - `token`: login, logout and access-token refresh.
// - `callback`: the local listener receiving the OAuth redirect.
// - `api`: blocking HTTP calls to the token endpoint and the extensions API.
// - `archive` / `publish`: packaging the build output and uploading it.
// - `scaffold`: generating a new extension project.
// - `ui` / `logging`: terminal output and diagnostics.
pub mod api;
pub mod archive;
pub mod callback;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod publish;
pub mod scaffold;
pub mod token;
pub mod ui;
