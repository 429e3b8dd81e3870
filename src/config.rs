//! Run configuration, loaded from a TOML file.
//!
//! Every section is optional. A missing `[aggregation.rules]` table means the
//! standard land-use rule set.

use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    assembler::AssemblyMode,
    error::{Result, RsmError},
    sampler::SamplerParams,
    zones::{AggregationOptions, AggregationRules, ZoneAggregatorParams},
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub zones: ZonesConfig,
    pub aggregation: AggregationConfig,
    pub sampler: SamplerParams,
    pub assembler: AssemblyMode,
}

/// Zone aggregation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZonesConfig {
    /// Id column of the zone attribute table.
    pub id_column: String,
    /// Id attribute of the zone shapefile.
    pub shape_id_field: String,
    /// Cluster within each value of this column instead of globally.
    pub district_column: Option<String>,
    /// Share multiplier per district id; districts not listed get 1.
    pub district_focus: BTreeMap<String, f64>,
    #[serde(flatten)]
    pub params: ZoneAggregatorParams,
}

impl Default for ZonesConfig {
    fn default() -> Self {
        Self {
            id_column: "mgra".into(),
            shape_id_field: "MGRA".into(),
            district_column: None,
            district_focus: BTreeMap::new(),
            params: ZoneAggregatorParams::default(),
        }
    }
}

impl ZonesConfig {
    /// Aggregator parameters; `use_xy = 0.0` turns coordinate features off.
    pub fn aggregator_params(&self) -> ZoneAggregatorParams {
        let mut params = self.params.clone();
        params.use_xy = params.use_xy.filter(|scale| *scale != 0.0);
        params
    }

    /// `district_focus` keyed by district id.
    pub fn district_focus(&self) -> Result<BTreeMap<i64, f64>> {
        self.district_focus.iter()
            .map(|(key, &weight)| key.trim().parse::<i64>()
                .map(|district| (district, weight))
                .map_err(|_| RsmError::Config(format!("zones.district_focus key '{key}' is not a district id"))))
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub rules: Option<AggregationRules>,
    #[serde(flatten)]
    pub options: AggregationOptions,
}

impl AggregationConfig {
    pub fn rules(&self) -> AggregationRules {
        self.rules.clone().unwrap_or_else(AggregationRules::land_use)
    }
}

impl RunConfig {
    /// Parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|source| RsmError::Io { path: path.to_path_buf(), source })?;
        let config = Self::from_toml(&text)
            .map_err(|e| match e {
                RsmError::Toml { message, .. } => RsmError::Toml { path: path.to_path_buf(), message },
                other => other,
            })?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: RunConfig = toml::from_str(text)
            .map_err(|e| RsmError::Toml { path: "<string>".into(), message: e.to_string() })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.sampler.validate()?;
        if let AssemblyMode::RescaleOnly { sample_rate } = self.assembler {
            crate::assembler::rescale_factor(sample_rate)?;
        }
        if self.zones.params.n_zones == 0 {
            return Err(RsmError::Config("zones.n_zones must be positive".into()));
        }
        self.zones.district_focus()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cluster::ClusterMethod, zones::{AggRule, ExplicitGroup, ModeTieBreak}};

    #[test]
    fn empty_file_gives_defaults() {
        let config = RunConfig::from_toml("").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.zones.params.n_zones, 2000);
        assert_eq!(config.aggregation.rules(), AggregationRules::land_use());
        assert_eq!(config.assembler, AssemblyMode::Reassemble);
    }

    #[test]
    fn full_file_parses() {
        let config = RunConfig::from_toml(r#"
            [zones]
            id_column = "taz"
            n_zones = 150
            method = "kmeans"
            use_xy = 0.0
            start_cluster_id = 100
            explicit_groups = [5, [7, 8]]
            district_column = "district"

            [zones.cluster_factors]
            popden = 1.0

            [zones.district_focus]
            4 = 2.5

            [aggregation]
            mode_tie_break = "smallest"

            [aggregation.rules]
            pop = { rule = "sum" }
            density = { rule = "weighted_mean", anchor = "acres" }

            [sampler]
            default_rate = 0.5
            lower_bound = 0.2
            study_area = [13, 14]

            [assembler]
            mode = "rescale_only"
            sample_rate = 0.25
        "#).unwrap();

        let zones = &config.zones;
        assert_eq!(zones.id_column, "taz");
        assert_eq!(zones.district_column.as_deref(), Some("district"));
        assert_eq!(zones.params.method, ClusterMethod::KMeans);
        assert_eq!(zones.params.explicit_groups, vec![ExplicitGroup::Single(5), ExplicitGroup::Group(vec![7, 8])]);
        assert_eq!(zones.aggregator_params().use_xy, None);
        assert_eq!(zones.params.cluster_factors["popden"], 1.0);
        assert_eq!(zones.district_focus().unwrap(), BTreeMap::from([(4, 2.5)]));

        assert_eq!(config.aggregation.options.mode_tie_break, ModeTieBreak::Smallest);
        assert_eq!(config.aggregation.rules().get("density"), Some(&AggRule::weighted_mean("acres")));
        assert!(config.sampler.study_area.contains(&14));
        assert_eq!(config.assembler, AssemblyMode::RescaleOnly { sample_rate: 0.25 });
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(RunConfig::from_toml("[sampler]\nlower_bound = 0.9\nupper_bound = 0.5"), Err(RsmError::Config(_))));
        assert!(matches!(RunConfig::from_toml("[assembler]\nmode = \"rescale_only\"\nsample_rate = 0.3"), Err(RsmError::Config(_))));
        assert!(matches!(RunConfig::from_toml("[zones]\nn_zones = \"many\""), Err(RsmError::Toml { .. })));
        assert!(matches!(RunConfig::from_toml("[zones.district_focus]\nnorth = 2.0"), Err(RsmError::Config(_))));
    }

    #[test]
    fn load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rsm.toml");
        std::fs::write(&path, "[zones\n").unwrap();
        match RunConfig::load(&path) {
            Err(RsmError::Toml { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected Toml error, got {other:?}"),
        }
    }
}
