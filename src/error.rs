/// Error type for package, atom and dependency string handling.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// Invalid EAPI value.
    #[error("invalid EAPI: {0}")]
    InvalidEapi(String),

    /// Invalid keyword string.
    #[error("invalid keyword: {0}")]
    InvalidKeyword(String),

    /// Invalid IUSE flag entry.
    #[error("invalid IUSE entry: {0}")]
    InvalidIUse(String),

    /// Invalid phase function name.
    #[error("invalid phase: {0}")]
    InvalidPhase(String),

    /// Invalid REQUIRED_USE expression.
    #[error("invalid REQUIRED_USE: {0}")]
    InvalidRequiredUse(String),

    /// Error parsing a metadata cache entry.
    #[error("invalid cache entry: {0}")]
    InvalidCacheEntry(String),

    /// Missing mandatory field in a cache entry.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A name outside the fixed metadata key set.
    #[error("unknown metadata key: {0}")]
    UnknownMetadataKey(String),

    /// A `category/package-version` string that does not split.
    #[error("invalid cpv: {0}")]
    InvalidCpv(String),

    /// Text that does not match the atom grammar, or uses syntax the
    /// parsing context does not allow.
    #[error("invalid atom '{atom}': {reason}")]
    InvalidAtom {
        /// The offending atom text.
        atom: String,
        /// Why it was rejected.
        reason: String,
        /// QA category (`EAPI.incompatible`, `IUSE.missing`), if any.
        category: Option<String>,
    },

    /// Malformed dependency string.
    #[error("{message}")]
    InvalidDependString {
        /// Human readable description, including the token position.
        message: String,
        /// QA category of the underlying error, if any.
        category: Option<String>,
    },

    /// Malformed data that is not a dependency string (soname records).
    #[error("{message}")]
    InvalidData {
        /// Human readable description.
        message: String,
        /// QA category, if any.
        category: Option<String>,
    },
}

impl Error {
    pub(crate) fn atom(atom: &str, reason: impl Into<String>) -> Self {
        Error::InvalidAtom {
            atom: atom.to_string(),
            reason: reason.into(),
            category: None,
        }
    }

    pub(crate) fn dep_string(message: impl Into<String>) -> Self {
        Error::InvalidDependString {
            message: message.into(),
            category: None,
        }
    }

    pub(crate) fn data(message: impl Into<String>) -> Self {
        Error::InvalidData {
            message: message.into(),
            category: None,
        }
    }

    /// Attach a QA category to an atom, dependency string or data error.
    ///
    /// Other variants are returned unchanged.
    pub(crate) fn with_category(mut self, qa: &str) -> Self {
        match &mut self {
            Error::InvalidAtom { category, .. }
            | Error::InvalidDependString { category, .. }
            | Error::InvalidData { category, .. } => *category = Some(qa.to_string()),
            _ => {}
        }
        self
    }

    /// QA category of this error, e.g. `IUSE.missing` or `EAPI.incompatible`.
    ///
    /// Uncategorized errors are reported under the generic syntax category of
    /// the metadata key they came from.
    pub fn category(&self) -> Option<&str> {
        match self {
            Error::InvalidAtom { category, .. }
            | Error::InvalidDependString { category, .. }
            | Error::InvalidData { category, .. } => category.as_deref(),
            _ => None,
        }
    }
}

/// Result type for portage-package operations.
pub type Result<T> = std::result::Result<T, Error>;
