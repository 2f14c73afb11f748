// src/platform/error.rs

use thiserror::Error;

/// Construction-time failures of a windowing backend.
///
/// Steady-state failures never surface as `PlatformError`: they are logged
/// and the operation becomes a no-op.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Failed to open {server} display connection")]
    DisplayOpen { server: &'static str },
    #[error("Wayland compositor does not advertise required global '{0}'")]
    MissingGlobal(&'static str),
    #[error("Shared-memory framebuffer failure: {0}")]
    Shm(String),
    #[error("Symbol '{symbol}' not found in {library} (requires {since} or newer)")]
    MissingSymbol {
        symbol: String,
        library: String,
        since: &'static str,
    },
    #[error("None of the libraries {0:?} could be loaded")]
    LibraryNotFound(Vec<&'static str>),
    #[error("Protocol error: {0}")]
    Protocol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_name_the_symbol_and_minimum_version() {
        let err = PlatformError::MissingSymbol {
            symbol: "wl_proxy_marshal_flags".into(),
            library: "libwayland-client.so.0".into(),
            since: "1.20",
        };
        assert_eq!(
            err.to_string(),
            "Symbol 'wl_proxy_marshal_flags' not found in libwayland-client.so.0 (requires 1.20 or newer)"
        );
    }
}
