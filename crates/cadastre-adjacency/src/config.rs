//! Adjacency query configuration.

use crate::relation::Contiguity;
use serde::{Deserialize, Serialize};

/// Options for [`AdjacencyEngine`](crate::AdjacencyEngine).
///
/// Every value is valid, so unlike the other configs there is no
/// `validate` step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjacencyConfig {
    /// Which boundary contacts count. Default: [`Contiguity::Rook`].
    pub contiguity: Contiguity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: AdjacencyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.contiguity, Contiguity::Rook);
        let cfg: AdjacencyConfig = serde_json::from_str(r#"{"contiguity":"queen"}"#).unwrap();
        assert_eq!(cfg.contiguity, Contiguity::Queen);
    }
}
