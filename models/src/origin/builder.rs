use crate::error::model_error::ModelError;
use crate::{ErrorLocation, Scheme, ServerOrigin};

use std::panic::Location;

/// Builder for creating validated ServerOrigin instances.
#[derive(Debug, Default)]
pub struct ServerOriginBuilder {
    scheme: Option<String>,
    host: Option<String>,
    port: Option<u16>,
}

impl ServerOriginBuilder {
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Build the ServerOrigin with validation.
    #[track_caller]
    pub fn build(self) -> Result<ServerOrigin, ModelError> {
        let scheme = match self.scheme.as_deref() {
            None | Some("http") => Scheme::Http,
            Some("https") => Scheme::Https,
            Some(other) => {
                return Err(ModelError::Validation {
                    message: format!("Unsupported scheme: {other}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        let host = self.host.ok_or_else(|| ModelError::Validation {
            message: String::from("Host is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if host.is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Host cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let port = self.port.ok_or_else(|| ModelError::Validation {
            message: String::from("Port is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if port == 0 {
            return Err(ModelError::Validation {
                message: String::from("Port must be non-zero"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(ServerOrigin { scheme, host, port })
    }
}
