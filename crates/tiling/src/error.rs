use formats::geojson::GeoJsonError;

/// Failure to build a [`crate::GeoJsonIndex`].
#[derive(Debug, Clone, PartialEq)]
pub enum IndexError {
    UnknownProjection(String),
    Source(GeoJsonError),
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexError::UnknownProjection(code) => write!(f, "unsupported projection {code}"),
            IndexError::Source(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IndexError::Source(err) => Some(err),
            IndexError::UnknownProjection(_) => None,
        }
    }
}

impl From<GeoJsonError> for IndexError {
    fn from(err: GeoJsonError) -> Self {
        IndexError::Source(err)
    }
}
