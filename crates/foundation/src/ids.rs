use serde::{Deserialize, Serialize};

/// Stable feature identifier, either taken from the source data or assigned
/// during ingestion.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    Int(i64),
    Str(String),
}

impl std::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureId::Int(n) => write!(f, "{n}"),
            FeatureId::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Caller-assigned identifier of a layer hosted by a worker.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LayerId(pub u64);

#[cfg(test)]
mod tests {
    use super::FeatureId;

    #[test]
    fn feature_ids_deserialize_untagged() {
        let a: FeatureId = serde_json::from_str("42").unwrap();
        let b: FeatureId = serde_json::from_str("\"road-7\"").unwrap();
        assert_eq!(a, FeatureId::Int(42));
        assert_eq!(b, FeatureId::Str("road-7".to_string()));
        assert_eq!(b.to_string(), "road-7");
    }
}
