//! Clustering of zone feature vectors.

mod features;
mod kmeans;
mod ward;

use std::{fmt, str::FromStr};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{error::{Result, RsmError}, graph::Graph};

pub use features::{build_features, zone_coordinates, FeatureSpec};
pub use kmeans::kmeans;
pub use ward::{ward, ward_constrained};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ClusterMethod {
    KMeans,
    Agglom,
    /// Ward linkage restricted to adjacent clusters.
    #[default]
    AgglomAdj,
}

impl FromStr for ClusterMethod {
    type Err = RsmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kmeans" => Ok(ClusterMethod::KMeans),
            "agglom" => Ok(ClusterMethod::Agglom),
            "agglom_adj" => Ok(ClusterMethod::AgglomAdj),
            other => Err(RsmError::NotImplemented(format!("clustering method '{other}'"))),
        }
    }
}

impl TryFrom<String> for ClusterMethod {
    type Error = RsmError;
    fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<ClusterMethod> for String {
    fn from(method: ClusterMethod) -> Self { method.to_string() }
}

impl fmt::Display for ClusterMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClusterMethod::KMeans => "kmeans",
            ClusterMethod::Agglom => "agglom",
            ClusterMethod::AgglomAdj => "agglom_adj",
        })
    }
}

/// What constrained clustering does when the adjacency graph has more
/// connected components than requested clusters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectedPolicy {
    /// Warn, then merge the leftover components by unconstrained Ward.
    #[default]
    Bridge,
    Error,
}

/// Partition the rows of `data` into `k` clusters, labelled 0..k.
pub fn cluster_rows(
    data: &Array2<f64>,
    k: usize,
    method: ClusterMethod,
    adjacency: Option<&Graph>,
    seed: u64,
    policy: DisconnectedPolicy,
) -> Result<Vec<usize>> {
    let n = data.nrows();
    if k == 0 || k > n {
        return Err(RsmError::Config(format!("cannot cluster {n} zones into {k} clusters")));
    }

    match method {
        ClusterMethod::KMeans => Ok(kmeans(data, k, seed)),
        ClusterMethod::Agglom => Ok(ward(data, k)),
        ClusterMethod::AgglomAdj => {
            let graph = adjacency
                .ok_or_else(|| RsmError::Config("agglom_adj requires an adjacency graph".into()))?;
            ward_constrained(data, graph, k, policy)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn method_names_parse() {
        assert_eq!("kmeans".parse::<ClusterMethod>().unwrap(), ClusterMethod::KMeans);
        assert_eq!(" Agglom_Adj ".parse::<ClusterMethod>().unwrap(), ClusterMethod::AgglomAdj);
        assert!(matches!("spectral".parse::<ClusterMethod>(), Err(RsmError::NotImplemented(_))));
        assert_eq!(ClusterMethod::Agglom.to_string(), "agglom");
    }

    #[test]
    fn infeasible_cluster_counts_are_rejected() {
        let data = array![[0.0], [1.0]];
        assert!(cluster_rows(&data, 3, ClusterMethod::Agglom, None, 0, DisconnectedPolicy::Bridge).is_err());
        assert!(cluster_rows(&data, 0, ClusterMethod::Agglom, None, 0, DisconnectedPolicy::Bridge).is_err());
        assert!(cluster_rows(&data, 1, ClusterMethod::AgglomAdj, None, 0, DisconnectedPolicy::Bridge).is_err());
    }
}
