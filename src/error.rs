//! Error types for the read, decode and write paths.
//!
//! Every fatal error that points at a specific part of an asset carries a
//! JSON-pointer-like location (e.g. `/meshes/3/primitives/0/attributes/POSITION`)
//! so callers can report exactly which object was at fault.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// GLB framing is broken: magic/version mismatch, truncation, or a
    /// chunk layout the container spec forbids.
    #[error("bad container: {reason}")]
    BadContainer { reason: String },

    /// The JSON chunk/document failed to parse, or contained non-finite
    /// numeric constants.
    #[error("bad JSON at {pointer}: {reason}")]
    BadJson { pointer: String, reason: String },

    /// A cross-reference index points outside its table.
    #[error("index {index} out of range (table length {len}) at {pointer}")]
    BadReference {
        pointer: String,
        index: usize,
        len: usize,
    },

    /// An accessor or buffer-view offset violates component alignment.
    #[error("offset {offset} is not aligned to {alignment} at {pointer}")]
    BadAlignment {
        pointer: String,
        offset: usize,
        alignment: usize,
    },

    /// A buffer or image URI could not be resolved to bytes.
    #[error("unresolved resource: {uri}")]
    MissingResource { uri: String },

    /// A name in `extensionsRequired` has no registered handler.
    #[error("required extension is not supported: {name}")]
    UnsupportedRequiredExtension { name: String },

    /// Animation sampler output length is inconsistent with its input
    /// (accounting for the CUBICSPLINE tangent stride).
    #[error("malformed animation sampler at {pointer}: {reason}")]
    MalformedSampler { pointer: String, reason: String },

    /// The registered Draco plug-in failed to decode a primitive.
    #[error("Draco decode failed at {pointer}: {reason}")]
    DracoDecode { pointer: String, reason: String },

    /// The registered Meshopt plug-in failed to decode a buffer view.
    #[error("Meshopt decode failed at {pointer}: {reason}")]
    MeshoptDecode { pointer: String, reason: String },

    /// A validator diagnostic promoted to a hard error.
    #[error("invariant violated at {pointer}: {reason}")]
    InvariantViolated { pointer: String, reason: String },

    /// Filesystem failure while emitting writer output.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn bad_container(reason: impl Into<String>) -> Self {
        Error::BadContainer {
            reason: reason.into(),
        }
    }

    pub(crate) fn bad_json(pointer: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::BadJson {
            pointer: pointer.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invariant(pointer: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvariantViolated {
            pointer: pointer.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_pointer() {
        let err = Error::BadReference {
            pointer: "/meshes/3/primitives/0/attributes/POSITION".to_string(),
            index: 9,
            len: 4,
        };
        let text = err.to_string();
        assert!(text.contains("/meshes/3/primitives/0/attributes/POSITION"));
        assert!(text.contains('9'));
    }
}
