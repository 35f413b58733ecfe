use std::path::Path;

use cslink_frame::FrameConfig;
use cslink_transport::endpoint_path;

use crate::connection::{dial, Connection};
use crate::error::Result;

/// Connect to a listening endpoint as a client.
pub fn connect(path: impl AsRef<Path>) -> Result<Connection> {
    connect_with_config(path, &FrameConfig::default())
}

/// Connect to a named endpoint (see [`endpoint_path`]).
pub fn connect_endpoint(name: &str) -> Result<Connection> {
    connect(endpoint_path(name))
}

/// Connect with explicit frame configuration.
pub fn connect_with_config(path: impl AsRef<Path>, config: &FrameConfig) -> Result<Connection> {
    let stream = dial(path.as_ref())?;
    Connection::from_stream("client".to_string(), stream, config)
}
