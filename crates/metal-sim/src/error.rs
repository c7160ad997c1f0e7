//! Error types returned by engine operations.

use std::path::PathBuf;

use thiserror::Error;

/// Kind of resource an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A server.
    Server,
    /// An installable OS image.
    OsImage,
    /// A port channel.
    PortChannel,
    /// An interface port.
    Port,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::OsImage => write!(f, "os-image"),
            Self::PortChannel => write!(f, "port-channel"),
            Self::Port => write!(f, "port"),
        }
    }
}

/// Errors that can occur during engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The resource does not exist.
    #[error("{resource} not found: {id}{}", scope_suffix(.scope.as_deref()))]
    NotFound {
        resource: ResourceKind,
        id: String,
        /// Parent resource the lookup was scoped to, e.g. `server[srv-1]`.
        scope: Option<String>,
    },

    /// The resource is busy with another provisioning action.
    #[error("{resource} {id} is locked by another action")]
    Conflict { resource: ResourceKind, id: String },

    /// Caller-supplied data failed validation.
    #[error("invalid request for {resource} {id}: {message}")]
    InvalidRequest {
        resource: ResourceKind,
        id: String,
        message: String,
    },
}

fn scope_suffix(scope: Option<&str>) -> String {
    scope.map(|s| format!(" in {s}")).unwrap_or_default()
}

impl EngineError {
    /// Resource not found.
    pub fn not_found(resource: ResourceKind, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
            scope: None,
        }
    }

    /// Resource not found within a parent resource.
    pub fn not_found_in(
        resource: ResourceKind,
        id: impl ToString,
        scope: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
            scope: Some(scope.into()),
        }
    }

    /// Resource busy.
    pub fn conflict(resource: ResourceKind, id: impl ToString) -> Self {
        Self::Conflict {
            resource,
            id: id.to_string(),
        }
    }

    /// Validation failure.
    pub fn invalid(resource: ResourceKind, id: impl ToString, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            resource,
            id: id.to_string(),
            message: message.into(),
        }
    }

    /// Stable machine-readable kind of the error.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::InvalidRequest { .. } => "invalid_request",
        }
    }
}

/// Errors raised while loading or validating seed data.
#[derive(Error, Debug)]
pub enum SeedError {
    /// Seed file could not be read.
    #[error("failed to read seed file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Seed data could not be parsed.
    #[error("failed to parse seed data: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Two servers share an identifier.
    #[error("duplicate server id: {0}")]
    DuplicateServer(String),

    /// Two ports of one server share an identifier.
    #[error("duplicate port id {port_id} on server {server_id}")]
    DuplicatePort { server_id: String, port_id: i64 },

    /// A port channel lists a port the server does not have.
    #[error(
        "port channel {port_channel_id} on server {server_id} references unknown port {port_id}"
    )]
    DanglingPortReference {
        server_id: String,
        port_channel_id: i64,
        port_id: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::not_found(ResourceKind::Server, "srv-9");
        assert_eq!(err.to_string(), "server not found: srv-9");
        assert_eq!(err.kind(), "not_found");

        let err = EngineError::not_found_in(ResourceKind::OsImage, "debian", "server[srv-1]");
        assert_eq!(err.to_string(), "os-image not found: debian in server[srv-1]");

        let err = EngineError::conflict(ResourceKind::Server, "srv-1");
        assert_eq!(err.to_string(), "server srv-1 is locked by another action");
        assert_eq!(err.kind(), "conflict");

        let err = EngineError::invalid(ResourceKind::PortChannel, 3, "invalid port_nicknames");
        assert_eq!(
            err.to_string(),
            "invalid request for port-channel 3: invalid port_nicknames"
        );
        assert_eq!(err.kind(), "invalid_request");
    }
}
