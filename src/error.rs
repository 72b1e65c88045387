/// Error types for catalog parsing and serialization
#[derive(Debug)]
pub enum CatalogError {
    /// Underlying I/O failure while reading or writing a stream
    Io(std::io::Error),
    /// Structural error in PO text input, with the 1-based line number
    PoParse {
        source: Option<String>,
        line: usize,
        reason: String,
    },
    /// Structural error in MO binary input (bad magic, truncated or
    /// out-of-bounds index tables)
    MoFormat {
        source: Option<String>,
        reason: String,
    },
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Io(e) => write!(f, "I/O error: {}", e),
            CatalogError::PoParse {
                source,
                line,
                reason,
            } => match source {
                Some(name) => write!(f, "{}:{}: {}", name, line, reason),
                None => write!(f, "line {}: {}", line, reason),
            },
            CatalogError::MoFormat { source, reason } => match source {
                Some(name) => write!(f, "{}: invalid MO data: {}", name, reason),
                None => write!(f, "invalid MO data: {}", reason),
            },
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(e: std::io::Error) -> Self {
        CatalogError::Io(e)
    }
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
