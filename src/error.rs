use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every error is fatal to the operation that raised it. Nothing is retried internally: a
/// paint history that silently skipped a failed write would corrupt every decode depending on
/// it, so the caller always gets to decide.
///
/// # Error Categories
///
/// ## Configuration Errors
/// - [`Error::BitFieldSpan`] - A context variable does not fit in a single word
/// - [`Error::RegistrationFrozen`] - A variable was registered after values were painted
/// - [`Error::InvalidCacheConfig`] - Decode cache sizes are unusable
///
/// ## Lookup Errors
/// - [`Error::UnknownVariable`] - No context variable with the requested name
///
/// ## Range Errors
/// - [`Error::InvalidRange`] - End address precedes the start, or spans two spaces
/// - [`Error::OffsetOutOfRange`] - Offset beyond the highest offset of its space
/// - [`Error::WordOutOfRange`] - Raw context word index beyond the blob
///
/// ## Format Errors
/// - [`Error::Malformed`] - Persisted stream is structurally invalid
/// - [`Error::XmlError`] - The tagged stream is not well-formed XML
/// - [`Error::FileError`] - I/O failure while writing a stream
///
/// # Examples
///
/// ```rust
/// use ctxscope::{context::ContextStore, Error};
///
/// let store = ContextStore::new();
/// match store.get_variable_default("mode") {
///     Err(Error::UnknownVariable(name)) => assert_eq!(name, "mode"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Configuration Errors
    /// A context variable definition is unusable.
    ///
    /// Raised when the bit span of a variable crosses a word boundary, or when its end bit
    /// precedes its start bit.
    #[error("Context variable '{name}' with bits [{start},{end}] does not fit in one word")]
    BitFieldSpan {
        /// Name of the offending variable
        name: String,
        /// First bit of the requested span
        start: u32,
        /// Last bit of the requested span
        end: u32,
    },

    /// A context variable was registered after the store started holding painted values.
    ///
    /// The blob layout is fixed once the first split point exists.
    #[error("Cannot register context variable '{0}' after values have been painted")]
    RegistrationFrozen(String),

    /// The decode cache configuration is unusable.
    #[error("Invalid decode cache configuration - {0}")]
    InvalidCacheConfig(String),

    // Lookup Errors
    /// No context variable with this name has been registered.
    #[error("Unknown context variable - {0}")]
    UnknownVariable(String),

    // Range Errors
    /// The end of an address range precedes its start, or the bounds live in different spaces.
    #[error("Invalid address range {first} - {last}")]
    InvalidRange {
        /// Printable start of the range
        first: String,
        /// Printable end of the range
        last: String,
    },

    /// An offset exceeds the highest addressable offset of its space.
    #[error("Offset {offset:#x} is out of range for space '{space}'")]
    OffsetOutOfRange {
        /// Name of the owning space
        space: String,
        /// The rejected offset
        offset: u64,
    },

    /// A raw context paint addressed a word past the end of the blob.
    #[error("Context word {word} is out of range for a blob of {size} words")]
    WordOutOfRange {
        /// The rejected word index
        word: usize,
        /// Number of words in the blob
        size: usize,
    },

    // Format Errors
    /// The persisted stream is damaged and could not be loaded.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Error from the quick-xml crate while reading or writing the tagged stream form.
    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    /// I/O error while producing a stream.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}
