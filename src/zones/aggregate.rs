use std::collections::BTreeMap;

use ahash::AHashMap;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{error::{Result, RsmError}, zones::ZoneTable};

/// How one attribute column collapses from zones to clusters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum AggRule {
    Sum,
    /// Mean weighted by `anchor`, which may sum several columns (`emp_total+pop`).
    WeightedMean { anchor: String },
    Max,
    Mode,
}

impl AggRule {
    pub fn weighted_mean(anchor: &str) -> Self { AggRule::WeightedMean { anchor: anchor.to_string() } }
}

/// Which value wins when a categorical column has several most common values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeTieBreak {
    /// The tied value encountered first in row order.
    #[default]
    FirstSeen,
    Smallest,
    Largest,
    /// Fail on any tie.
    Error,
}

/// Three-tier ordinal bin recomputed from an aggregated column:
/// 1 below `lower`, 2 below `upper`, 3 otherwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinRule {
    pub column: String,
    pub source: String,
    pub lower: f64,
    pub upper: f64,
}

impl BinRule {
    pub fn new(column: &str, source: &str, lower: f64, upper: f64) -> Self {
        Self { column: column.to_string(), source: source.to_string(), lower, upper }
    }

    #[inline]
    pub fn bin(&self, value: f64) -> f64 {
        if value < self.lower { 1.0 } else if value < self.upper { 2.0 } else { 3.0 }
    }
}

/// Column name to aggregation rule. Columns without a rule are dropped.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregationRules {
    rules: BTreeMap<String, AggRule>,
}

impl AggregationRules {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, column: &str, rule: AggRule) -> Self {
        self.rules.insert(column.to_string(), rule);
        self
    }

    pub fn insert(&mut self, column: &str, rule: AggRule) {
        self.rules.insert(column.to_string(), rule);
    }

    #[inline] pub fn get(&self, column: &str) -> Option<&AggRule> { self.rules.get(column) }

    #[inline] pub fn len(&self) -> usize { self.rules.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.rules.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AggRule)> { self.rules.iter() }

    /// Rule table for the regional land-use file: counts summed, densities
    /// and costs weighted by the matching base quantity, district codes by mode.
    pub fn land_use() -> Self {
        const SUMMED: &[&str] = &[
            "hs", "hs_sf", "hs_mf", "hs_mh", "hh", "hh_sf", "hh_mf", "hh_mh", "gq_civ", "gq_mil",
            "i1", "i2", "i3", "i4", "i5", "i6", "i7", "i8", "i9", "i10", "pop", "hhp",
            "emp_ag", "emp_const_non_bldg_prod", "emp_const_non_bldg_office", "emp_utilities_prod",
            "emp_utilities_office", "emp_const_bldg_prod", "emp_const_bldg_office", "emp_mfg_prod",
            "emp_mfg_office", "emp_whsle_whs", "emp_trans", "emp_retail", "emp_prof_bus_svcs",
            "emp_prof_bus_svcs_bldg_maint", "emp_pvt_ed_k12", "emp_pvt_ed_post_k12_oth", "emp_health",
            "emp_personal_svcs_office", "emp_amusement", "emp_hotel", "emp_restaurant_bar",
            "emp_personal_svcs_retail", "emp_religious", "emp_pvt_hh", "emp_state_local_gov_ent",
            "emp_fed_non_mil", "emp_fed_mil", "emp_state_local_gov_blue", "emp_state_local_gov_white",
            "emp_public_ed", "emp_own_occ_dwell_mgmt", "emp_fed_gov_accts", "emp_st_lcl_gov_accts",
            "emp_cap_accts", "emp_total", "enrollgradekto8", "enrollgrade9to12", "collegeenroll",
            "othercollegeenroll", "adultschenrl", "hstallsoth", "hstallssam", "dstallsoth", "dstallssam",
            "mstallsoth", "mstallssam", "parkactive", "openspaceparkpreserve", "beachactive",
            "budgetroom", "economyroom", "luxuryroom", "midpriceroom", "upscaleroom", "hotelroomtotal",
            "truckregiontype", "land_acres", "refueling_stations", "totint",
        ];
        const WEIGHTED: &[(&str, &str)] = &[
            ("hhs", "hh"), ("hparkcost", "hstallssam"), ("numfreehrs", "hstallssam"),
            ("dparkcost", "dstallssam"), ("mparkcost", "mstallssam"), ("milestocoast", "pop"),
            ("microaccesstime", "pop"), ("duden", "hh"), ("empden", "emp_total"), ("popden", "pop"),
            ("retempden", "emp_retail"), ("popempdenpermi", "emp_total+pop"),
        ];

        let mut rules = Self::new();
        SUMMED.iter().for_each(|c| rules.insert(c, AggRule::Sum));
        WEIGHTED.iter().for_each(|(c, anchor)| rules.insert(c, AggRule::weighted_mean(anchor)));
        ["parkarea", "luz_id", "remoteavparking"].iter().for_each(|c| rules.insert(c, AggRule::Max));
        ["ech_dist", "hch_dist", "district27"].iter().for_each(|c| rules.insert(c, AggRule::Mode));
        rules
    }
}

/// Options shared by every aggregation call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationOptions {
    pub mode_tie_break: ModeTieBreak,
    pub bins: Vec<BinRule>,
}

impl Default for AggregationOptions {
    fn default() -> Self {
        Self {
            mode_tie_break: ModeTieBreak::default(),
            bins: vec![
                BinRule::new("totintbin", "totint", 80.0, 130.0),
                BinRule::new("empdenbin", "empden", 10.0, 30.0),
                BinRule::new("dudenbin", "duden", 5.0, 10.0),
            ],
        }
    }
}

/// Mean of `values` weighted by `weights`, or the plain mean when the
/// weights sum to zero.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> f64 {
    let total = weights.iter().sum::<f64>();
    if total == 0.0 {
        return values.iter().sum::<f64>() / values.len() as f64;
    }
    values.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / total
}

/// Per-zone weights for an anchor; `a+b` sums the named columns.
pub fn anchor_weights(table: &ZoneTable, anchor: &str) -> Result<Vec<f64>> {
    let mut weights = vec![0.0; table.len()];
    for part in anchor.split('+').map(str::trim) {
        let column = table.column(part)?;
        weights.iter_mut().zip(column.iter()).for_each(|(w, v)| *w += v);
    }
    Ok(weights)
}

/// Most common value of `values` under the given tie-break.
pub fn mode(values: &[f64], tie_break: ModeTieBreak) -> Result<f64> {
    let mut counts: AHashMap<u64, (usize, usize)> = AHashMap::new(); // bits -> (count, first row)
    for (i, v) in values.iter().enumerate() {
        counts.entry(v.to_bits()).or_insert((0, i)).0 += 1;
    }
    let best = counts.values().map(|&(count, _)| count).max()
        .ok_or_else(|| RsmError::InvalidData("mode of an empty group".into()))?;

    let mut tied = counts.iter()
        .filter(|(_, (count, _))| *count == best)
        .map(|(&bits, &(_, first))| (f64::from_bits(bits), first))
        .collect::<Vec<_>>();

    Ok(match tie_break {
        ModeTieBreak::FirstSeen => tied.iter().min_by_key(|(_, first)| *first).map(|(v, _)| *v).unwrap_or(f64::NAN),
        ModeTieBreak::Smallest => tied.iter().map(|(v, _)| *v).fold(f64::INFINITY, f64::min),
        ModeTieBreak::Largest => tied.iter().map(|(v, _)| *v).fold(f64::NEG_INFINITY, f64::max),
        ModeTieBreak::Error => {
            if tied.len() > 1 {
                tied.sort_by(|a, b| a.0.total_cmp(&b.0));
                return Err(RsmError::InvalidData(format!(
                    "no unique mode: values {:?} each occur {best} times",
                    tied.iter().map(|(v, _)| *v).collect::<Vec<_>>()
                )));
            }
            tied[0].0
        }
    })
}

/// Collapse zone rows into one row per cluster. `cluster_of_row[i]` is the
/// cluster id of row i. Output rows are ordered by cluster id; geometry, when
/// present, is dissolved; bins are recomputed from the aggregated values.
pub fn aggregate_attributes(
    table: &ZoneTable,
    cluster_of_row: &[i64],
    rules: &AggregationRules,
    options: &AggregationOptions,
) -> Result<ZoneTable> {
    if cluster_of_row.len() != table.len() {
        return Err(RsmError::InvalidData(format!(
            "{} cluster labels for {} zones", cluster_of_row.len(), table.len()
        )));
    }

    // Every rule must name a column the table has, as must every anchor.
    for (column, rule) in rules.iter() {
        table.column(column)?;
        if let AggRule::WeightedMean { anchor } = rule { anchor_weights(table, anchor)?; }
    }

    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    cluster_of_row.iter().enumerate().for_each(|(row, &c)| groups.entry(c).or_default().push(row));

    let columns = table.columns().iter()
        .filter(|c| rules.get(c).is_some())
        .cloned()
        .collect::<Vec<_>>();

    let mut values = Array2::<f64>::zeros((groups.len(), columns.len()));
    for (j, column) in columns.iter().enumerate() {
        let source = table.column(column)?;
        let rule = rules.get(column).ok_or_else(|| RsmError::missing_column(column))?;
        let weights = match rule {
            AggRule::WeightedMean { anchor } => Some(anchor_weights(table, anchor)?),
            _ => None,
        };

        for (i, (cluster, rows)) in groups.iter().enumerate() {
            let group = rows.iter().map(|&r| source[r]).collect::<Vec<_>>();
            values[[i, j]] = match rule {
                AggRule::Sum => group.iter().sum(),
                AggRule::Max => group.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                AggRule::Mode => mode(&group, options.mode_tie_break)
                    .map_err(|e| RsmError::InvalidData(format!("cluster {cluster}, column '{column}': {e}")))?,
                AggRule::WeightedMean { .. } => {
                    let w = weights.as_deref().unwrap_or_default();
                    weighted_mean(&group, &rows.iter().map(|&r| w[r]).collect::<Vec<_>>())
                }
            };
        }
    }

    let mut out = ZoneTable::new(groups.keys().copied().collect(), columns, values)?;
    if let Some(geometry) = table.geometry() {
        out = out.with_geometry(geometry.dissolve(&groups.values().cloned().collect::<Vec<_>>()))?;
    }

    for bin in &options.bins {
        if !out.has_column(&bin.source) { continue }
        let binned = out.column(&bin.source)?.iter().map(|&v| bin.bin(v)).collect();
        out.set_column(&bin.column, binned)?;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn make_test_table() -> ZoneTable {
        ZoneTable::new(
            vec![1, 2, 3, 4],
            ["hh", "pop", "duden", "district", "parkarea", "totintbin"].map(String::from).to_vec(),
            array![
                [10.0, 30.0, 2.0, 5.0, 0.0, 3.0],
                [30.0, 70.0, 6.0, 5.0, 1.0, 3.0],
                [0.0, 0.0, 4.0, 7.0, 0.0, 3.0],
                [0.0, 0.0, 8.0, 8.0, 2.0, 3.0],
            ],
        ).unwrap()
    }

    fn make_rules() -> AggregationRules {
        AggregationRules::new()
            .with("hh", AggRule::Sum)
            .with("pop", AggRule::Sum)
            .with("duden", AggRule::weighted_mean("hh"))
            .with("district", AggRule::Mode)
            .with("parkarea", AggRule::Max)
    }

    #[test]
    fn aggregates_each_rule() {
        let out = aggregate_attributes(&make_test_table(), &[20, 20, 10, 10], &make_rules(), &AggregationOptions::default()).unwrap();

        assert_eq!(out.ids(), &[10, 20]);
        assert_eq!(out.column("hh").unwrap().to_vec(), vec![0.0, 40.0]);
        assert_eq!(out.column("parkarea").unwrap().to_vec(), vec![2.0, 1.0]);
        // zero weights in cluster 10 fall back to the plain mean
        assert_eq!(out.column("duden").unwrap().to_vec(), vec![6.0, 5.0]);
        assert_eq!(out.column("district").unwrap().to_vec(), vec![7.0, 5.0]);
        // bins recomputed, never carried over
        assert_eq!(out.column("dudenbin").unwrap().to_vec(), vec![2.0, 2.0]);
        assert!(!out.has_column("totintbin"));
    }

    #[test]
    fn singleton_clusters_reproduce_the_input() {
        let table = make_test_table();
        let options = AggregationOptions { bins: vec![], ..Default::default() };
        let out = aggregate_attributes(&table, table.ids(), &make_rules(), &options).unwrap();
        for column in out.columns() {
            assert_eq!(out.column(column).unwrap(), table.column(column).unwrap(), "column {column}");
        }
    }

    #[test]
    fn combined_anchor_sums_columns() {
        let table = make_test_table();
        let weights = anchor_weights(&table, "hh+pop").unwrap();
        assert_eq!(weights, vec![40.0, 100.0, 0.0, 0.0]);
        assert!(matches!(anchor_weights(&table, "hh+jobs"), Err(RsmError::MissingColumn { .. })));
    }

    #[test]
    fn missing_rule_column_is_an_error() {
        let rules = make_rules().with("emp_total", AggRule::Sum);
        let err = aggregate_attributes(&make_test_table(), &[1, 1, 1, 1], &rules, &AggregationOptions::default());
        assert!(matches!(err, Err(RsmError::MissingColumn { .. })));
    }

    #[test]
    fn mode_tie_breaks() {
        let values = [3.0, 1.0, 1.0, 3.0, 2.0];
        assert_eq!(mode(&values, ModeTieBreak::FirstSeen).unwrap(), 3.0);
        assert_eq!(mode(&values, ModeTieBreak::Smallest).unwrap(), 1.0);
        assert_eq!(mode(&values, ModeTieBreak::Largest).unwrap(), 3.0);
        assert!(mode(&values, ModeTieBreak::Error).is_err());
        assert_eq!(mode(&[4.0, 4.0, 1.0], ModeTieBreak::Error).unwrap(), 4.0);
    }

    #[test]
    fn rules_deserialize_from_toml() {
        let rules: AggregationRules = toml::from_str(r#"
            hh = { rule = "sum" }
            duden = { rule = "weighted_mean", anchor = "hh" }
            district = { rule = "mode" }
        "#).unwrap();
        assert_eq!(rules.get("duden"), Some(&AggRule::weighted_mean("hh")));
        assert_eq!(rules.len(), 3);
    }
}
