use thiserror::Error;

use super::path_network::NodeId;


#[derive(Error, Debug)]
pub enum PathChoiceError {
    #[error("{entity} {id} not found in network")]
    NotFound { entity: &'static str, id: String },
    #[error("no path from node {origin} to node {destination}")]
    DestinationNotFound { origin: NodeId, destination: NodeId },
    #[error("no path alternatives available from node {origin} to node {destination}")]
    NoAlternativeAvailable { origin: NodeId, destination: NodeId },
    #[error("invalid path from node {origin} to node {destination}: {reason}")]
    InvalidPath { origin: NodeId, destination: NodeId, reason: String },
    #[error("invalid network: {0}")]
    InvalidNetwork(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("could not parse {field} value {value:?}")]
    Parse { field: String, value: String },
    #[error("batch run failed: {0}")]
    Batch(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] yaml_rust::ScanError),
}

impl PathChoiceError {
    /// Errors that are an expected consequence of network topology for a single OD pair.
    pub fn is_recoverable(&self) -> bool {
        match self {
            PathChoiceError::DestinationNotFound { .. } => true,
            PathChoiceError::NoAlternativeAvailable { .. } => true,
            _ => false,
        }
    }

    pub fn not_found<II: ToString>(entity: &'static str, id: II) -> PathChoiceError {
        return PathChoiceError::NotFound { entity, id: id.to_string() };
    }
}

pub type Result<T> = std::result::Result<T, PathChoiceError>;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable() {
        let err = PathChoiceError::DestinationNotFound { origin: 1, destination: 2 };
        assert!(err.is_recoverable());
        let err = PathChoiceError::NoAlternativeAvailable { origin: 1, destination: 2 };
        assert!(err.is_recoverable());
        let err = PathChoiceError::InvalidPath {
            origin: 1, destination: 2, reason: String::from("path size is NaN")
        };
        assert!(!err.is_recoverable());
        assert!(!PathChoiceError::not_found("node", 5).is_recoverable());
    }

    #[test]
    fn test_messages_name_entities() {
        let msg = PathChoiceError::not_found("edge", "(3, 4)").to_string();
        assert_eq!(msg, "edge (3, 4) not found in network");
        let msg = PathChoiceError::DestinationNotFound { origin: 1, destination: 5 }.to_string();
        assert!(msg.contains("node 1") && msg.contains("node 5"));
    }
}
