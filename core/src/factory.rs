//! Pick a dispatcher implementation by kind tag.

use std::fmt;
use std::str::FromStr;

use crate::cli::JoplinCli;
use crate::client::JoplinApi;
use crate::config::{CliConfig, ClientConfig};
use crate::error::{ApiError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKind {
    /// WebClipper REST service.
    Api,
    /// `joplin` terminal binary.
    Cli,
}

impl FromStr for ApiKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "api" => Ok(ApiKind::Api),
            "cli" => Ok(ApiKind::Cli),
            _ => Err(ApiError::UnknownKind(s.to_string())),
        }
    }
}

impl fmt::Display for ApiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApiKind::Api => "api",
            ApiKind::Cli => "cli",
        })
    }
}

/// Explicit configuration for `create_with`. The token inside `client` is
/// replaced by the token argument.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub client: Option<ClientConfig>,
    pub cli: Option<CliConfig>,
}

#[derive(Debug)]
pub enum Dispatcher {
    Api(JoplinApi),
    Cli(JoplinCli),
}

impl Dispatcher {
    pub fn kind(&self) -> ApiKind {
        match self {
            Dispatcher::Api(_) => ApiKind::Api,
            Dispatcher::Cli(_) => ApiKind::Cli,
        }
    }

    pub fn as_api(&self) -> Option<&JoplinApi> {
        match self {
            Dispatcher::Api(api) => Some(api),
            Dispatcher::Cli(_) => None,
        }
    }

    pub fn as_cli(&self) -> Option<&JoplinCli> {
        match self {
            Dispatcher::Cli(cli) => Some(cli),
            Dispatcher::Api(_) => None,
        }
    }
}

/// Build a dispatcher from defaults. `kind` is `"api"` or `"cli"`; the CLI
/// dispatcher ignores `token`.
pub fn create(kind: &str, token: &str) -> Result<Dispatcher> {
    create_with(kind.parse()?, token, Settings::default())
}

pub fn create_with(kind: ApiKind, token: &str, settings: Settings) -> Result<Dispatcher> {
    match kind {
        ApiKind::Api => {
            let mut config = settings.client.unwrap_or_else(|| ClientConfig::new(""));
            config.token = token.to_string();
            Ok(Dispatcher::Api(JoplinApi::new(config)?))
        }
        ApiKind::Cli => Ok(Dispatcher::Cli(JoplinCli::new(settings.cli.unwrap_or_default()))),
    }
}
