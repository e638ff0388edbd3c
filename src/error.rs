/// Crate-level error types for redliner diagnostics.
use std::path::PathBuf;

/// Fatal errors only. A stale block reference, a degenerate range or an
/// overlapping edit is never an `Error`: those are logged and excluded so the
/// rest of the export still renders.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The analysis result could not be parsed into the expected shape at all.
    #[error("analysis result malformed: {reason}")]
    AnalysisMalformed {
        /// The unparsed text, kept for diagnostics.
        raw: String,
        /// What was wrong with it.
        reason: String,
    },

    /// An explicitly requested config file does not exist on disk.
    #[error("config not found: {}", path.display())]
    ConfigNotFound {
        /// Path to the missing config file.
        path: PathBuf,
    },

    /// An inbound block list violates the block model invariants.
    #[error("document invalid: {reason}")]
    DocumentInvalid {
        /// Which invariant was broken, naming the offending block.
        reason: String,
    },

    /// A referenced input file does not exist on disk.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON (de)serialization failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// Writing package XML failed.
    #[error("xml: {0}")]
    Xml(
        /// The wrapped XML writer error.
        #[from]
        quick_xml::Error,
    ),

    /// Writing the zip container failed.
    #[error("zip: {0}")]
    Zip(
        /// The wrapped zip error.
        #[from]
        zip::result::ZipError,
    ),
}
