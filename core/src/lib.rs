//! Client library for the Joplin WebClipper service and the `joplin` CLI.
//!
//! # Overview
//! Two dispatchers expose the same note/folder/tag/resource operations:
//! `JoplinApi` talks HTTP to the WebClipper service, `JoplinCli` runs the
//! terminal binary. `factory::create` picks one by kind tag. Responses are
//! handed back as-is; the library does not model notes or folders.
//!
//! # Design
//! - Requests are plain data (`HttpRequest`/`HttpResponse`); `Transport` is
//!   the only seam that touches the network, so request building is tested
//!   without a server.
//! - Verbs and paths are closed enums. Anything outside them fails with
//!   `ApiError::InvalidArgument` before a request is built.
//! - Configuration is immutable once a dispatcher is built. Logging goes
//!   through `tracing` under a span the caller can inject; the library never
//!   installs a subscriber.
//!
//! ```no_run
//! use joplin_api::{ClientConfig, FolderOptions, JoplinApi, NoteOptions};
//!
//! # fn main() -> joplin_api::Result<()> {
//! let joplin = JoplinApi::new(ClientConfig::new("my-token"))?;
//! joplin.ping()?;
//! let folder: serde_json::Value = joplin.create_folder("Inbox", &FolderOptions::default())?.json()?;
//! let folder_id = folder["id"].as_str().unwrap_or_default();
//! joplin.create_note("Hello", "# Hello", folder_id, &NoteOptions::default())?;
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod cli;
pub mod client;
pub mod config;
pub mod endpoint;
mod endpoints;
pub mod error;
pub mod factory;
pub mod http;
pub mod payload;
pub mod transport;

#[cfg(test)]
mod testing;

pub use cancel::CancelToken;
pub use cli::{CliCommand, CliOutput, CommandRunner, JoplinCli, ProcessRunner, SagaStep};
pub use client::{JoplinApi, PING_REPLY};
pub use config::{CliConfig, ClientConfig};
pub use endpoint::{Endpoint, Resource};
pub use error::{ApiError, Result};
pub use factory::{create, create_with, ApiKind, Dispatcher};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use payload::{FolderOptions, NoteOptions, Payload, ResourceOptions};
pub use transport::UreqTransport;
