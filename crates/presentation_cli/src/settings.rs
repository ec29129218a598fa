//! Client configuration loading
//!
//! Layers, lowest precedence first: built-in defaults, the configuration
//! file, then `TRANSPORT_NSW_*` environment variables
//! (e.g. `TRANSPORT_NSW_TIMEOUT_SECS=5`).

use std::path::Path;

use integration_transport_nsw::TransportNswConfig;

/// File looked up in the working directory when no path is given
const DEFAULT_CONFIG_NAME: &str = "transport-nsw";

/// Environment variable prefix
const ENV_PREFIX: &str = "TRANSPORT_NSW";

/// Load the client configuration
///
/// An explicit `path` must exist; otherwise `transport-nsw.{toml,yaml,json}`
/// is used when present.
pub fn load(path: Option<&Path>) -> Result<TransportNswConfig, config::ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
    };

    let settings = config::Config::builder()
        .add_source(file)
        .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()?;

    settings.try_deserialize()
}
