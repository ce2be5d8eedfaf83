use style::error::StyleError;
use tiling::error::IndexError;

/// Failures surfaced to callers of a layer worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerError {
    /// The style could not be compiled; the previous style stays in effect.
    StyleCompilation(StyleError),
    /// Remote fetch failure or malformed GeoJSON.
    DataSource { message: String },
    /// No data is indexed yet. Not a failure: the caller retries later.
    LoadingPending,
    /// The tile build failed without producing output.
    Build { message: String },
    Config { message: String },
    /// The worker actor is gone.
    Disconnected,
}

impl WorkerError {
    pub fn data_source(message: impl Into<String>) -> Self {
        WorkerError::DataSource {
            message: message.into(),
        }
    }

    pub fn build(message: impl Into<String>) -> Self {
        WorkerError::Build {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        WorkerError::Config {
            message: message.into(),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, WorkerError::LoadingPending)
    }
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerError::StyleCompilation(err) => write!(f, "style compilation failed: {err}"),
            WorkerError::DataSource { message } => write!(f, "data source error: {message}"),
            WorkerError::LoadingPending => write!(f, "data is still loading"),
            WorkerError::Build { message } => write!(f, "tile build failed: {message}"),
            WorkerError::Config { message } => write!(f, "invalid worker configuration: {message}"),
            WorkerError::Disconnected => write!(f, "worker is no longer running"),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkerError::StyleCompilation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StyleError> for WorkerError {
    fn from(err: StyleError) -> Self {
        WorkerError::StyleCompilation(err)
    }
}

impl From<IndexError> for WorkerError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::UnknownProjection(_) => WorkerError::config(err.to_string()),
            IndexError::Source(_) => WorkerError::data_source(err.to_string()),
        }
    }
}
