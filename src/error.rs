//! Unified error type surfaced to the embedding layer.
//!
//! `EnforcementError` is the single error type returned across the crate
//! boundary. It serializes as `{ "kind": "...", "message": "..." }` so an
//! embedding layer can programmatically distinguish error categories.

use serde::ser::SerializeStruct;

/// Crate-level error returned by coordinator and store entry points.
///
/// Each variant maps to a distinct failure domain.
#[derive(Debug, thiserror::Error)]
pub enum EnforcementError {
    /// Errors originating from the persistence layer (SQLite).
    #[error("{0}")]
    Store(String),

    /// Errors from the packet filter engine (device handle, worker startup).
    #[error("{0}")]
    Tunnel(String),

    /// I/O and OS-level errors.
    #[error("{0}")]
    Io(String),

    /// Invalid or missing caller input.
    #[error("{0}")]
    InvalidInput(String),
}

impl EnforcementError {
    /// Returns the error kind as a string matching the variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            EnforcementError::Store(_) => "Store",
            EnforcementError::Tunnel(_) => "Tunnel",
            EnforcementError::Io(_) => "Io",
            EnforcementError::InvalidInput(_) => "InvalidInput",
        }
    }
}

/// Custom Serialize: produces `{ "kind": "Variant", "message": "..." }`.
impl serde::Serialize for EnforcementError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut s = serializer.serialize_struct("EnforcementError", 2)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

// ---- From implementations for ergonomic error conversion ----

impl From<anyhow::Error> for EnforcementError {
    fn from(err: anyhow::Error) -> Self {
        EnforcementError::Store(err.to_string())
    }
}

impl From<std::io::Error> for EnforcementError {
    fn from(err: std::io::Error) -> Self {
        EnforcementError::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for EnforcementError {
    fn from(err: rusqlite::Error) -> Self {
        EnforcementError::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_returns_correct_variant_name() {
        assert_eq!(EnforcementError::Store("db fail".into()).kind(), "Store");
        assert_eq!(EnforcementError::Tunnel("tun fail".into()).kind(), "Tunnel");
        assert_eq!(EnforcementError::Io("io fail".into()).kind(), "Io");
        assert_eq!(
            EnforcementError::InvalidInput("bad input".into()).kind(),
            "InvalidInput"
        );
    }

    #[test]
    fn test_error_display_shows_message() {
        let err = EnforcementError::Store("connection lost".into());
        assert_eq!(err.to_string(), "connection lost");
    }

    #[test]
    fn test_error_serializes_as_kind_and_message() {
        let err = EnforcementError::Tunnel("interface unavailable".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "Tunnel");
        assert_eq!(json["message"], "interface unavailable");
    }

    #[test]
    fn test_from_io_error_produces_io_variant() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "fd missing");
        let err: EnforcementError = io_err.into();
        assert_eq!(err.kind(), "Io");
        assert!(err.to_string().contains("fd missing"));
    }

    #[test]
    fn test_from_anyhow_produces_store_variant() {
        let anyhow_err = anyhow::anyhow!("sqlite busy");
        let err: EnforcementError = anyhow_err.into();
        assert_eq!(err.kind(), "Store");
        assert!(err.to_string().contains("sqlite busy"));
    }

    #[test]
    fn test_all_variants_serialize_with_two_fields() {
        let variants: Vec<EnforcementError> = vec![
            EnforcementError::Store("a".into()),
            EnforcementError::Tunnel("b".into()),
            EnforcementError::Io("c".into()),
            EnforcementError::InvalidInput("d".into()),
        ];
        for err in variants {
            let json = serde_json::to_value(&err).unwrap();
            let obj = json.as_object().unwrap();
            assert_eq!(obj.len(), 2, "Expected exactly 2 fields for {err:?}");
            assert!(obj.contains_key("kind"));
            assert!(obj.contains_key("message"));
        }
    }
}
