use ahash::AHashSet;
use log::info;
use polars::{frame::DataFrame, prelude::{BooleanChunked, Column, IdxCa, IdxSize}};
use serde::{Deserialize, Serialize};

use crate::{
    assembler::{roster::HH_ID, DriftReport, TripRoster},
    common::{column_i64, require_column},
    crosswalk::Crosswalk,
    error::{Result, RsmError},
};

/// Tolerance when checking that `1 / sample_rate` is a whole number.
const FACTOR_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AssemblyMode {
    /// Merge resimulated households into the archived full run.
    #[default]
    Reassemble,
    /// Expand the sampled trips by `1 / sample_rate`.
    RescaleOnly { sample_rate: f64 },
}

/// The individual and joint trip tables of one model run.
#[derive(Clone, Debug)]
pub struct TripTables {
    pub individual: DataFrame,
    pub joint: DataFrame,
}

impl TripTables {
    pub fn roster(&self) -> Result<TripRoster> {
        TripRoster::canonical(&self.individual, &self.joint)
    }
}

#[derive(Clone, Debug)]
pub struct Reassembly {
    pub roster: TripRoster,
    pub tables: TripTables,
    pub drift: DriftReport,
    /// Households taken from the resimulated run.
    pub resimulated_households: usize,
}

/// Map every `*_mgra` column (case-insensitive) through the crosswalk.
/// Sentinel zones pass through; other unmapped zones are an error.
pub fn remap_zone_columns(df: &DataFrame, crosswalk: &Crosswalk) -> Result<DataFrame> {
    let mut out = df.clone();
    let targets = df.get_column_names().iter()
        .filter(|name| name.to_lowercase().ends_with("_mgra"))
        .map(|name| name.to_string())
        .collect::<Vec<_>>();

    for name in targets {
        let mapped = column_i64(df, &name)?.into_iter()
            .map(|zone| crosswalk.map_zone_or_sentinel(zone, &format!("trip column '{name}'")))
            .collect::<Result<Vec<_>>>()?;
        out.with_column(Column::new(name.as_str().into(), mapped))?;
    }
    Ok(out)
}

/// Select `target`'s columns from `df`, cast to `target`'s dtypes.
pub fn align_columns(df: &DataFrame, target: &DataFrame) -> Result<DataFrame> {
    let columns = target.get_columns().iter()
        .map(|column| {
            let name = column.name().as_str();
            require_column(df, name)?;
            Ok(df.column(name)?.cast(column.dtype())?)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(DataFrame::new(columns)?)
}

/// Rows of `df` whose `hh_id` is not in `households`.
fn drop_households(df: &DataFrame, households: &AHashSet<i64>) -> Result<DataFrame> {
    let mask = column_i64(df, HH_ID)?.iter()
        .map(|id| !households.contains(id))
        .collect::<BooleanChunked>();
    Ok(df.filter(&mask)?)
}

/// Replace the archived trips of every resimulated household with its
/// resimulated trips, keeping individual and joint tables apart.
///
/// H is the set of households in the resimulated roster. No household in H
/// keeps an archived row; every archived row of a household outside H is
/// kept unchanged.
pub fn reassemble(
    archived: &TripTables,
    resimulated: &TripTables,
    households: &DataFrame,
    crosswalk: Option<&Crosswalk>,
) -> Result<Reassembly> {
    let archived = match crosswalk {
        Some(crosswalk) => {
            info!("applying the zone crosswalk to archived trips");
            TripTables {
                individual: remap_zone_columns(&archived.individual, crosswalk)?,
                joint: remap_zone_columns(&archived.joint, crosswalk)?,
            }
        }
        None => archived.clone(),
    };

    let archived_roster = archived.roster()?;
    let resimulated_roster = resimulated.roster()?;
    let resimulated_ids = resimulated_roster.household_ids();

    let kept_roster = archived_roster.filter_households(&resimulated_ids, false);
    let replaced_roster = archived_roster.filter_households(&resimulated_ids, true);
    let drift = DriftReport::build(&replaced_roster, &resimulated_roster, households)?;

    let individual = resimulated.individual.vstack(&align_columns(
        &drop_households(&archived.individual, &resimulated_ids)?, &resimulated.individual,
    )?)?;
    let joint = resimulated.joint.vstack(&align_columns(
        &drop_households(&archived.joint, &resimulated_ids)?, &resimulated.joint,
    )?)?;

    info!(
        "reassembled {} resimulated households: {} resimulated + {} archived trips",
        resimulated_ids.len(), resimulated_roster.len(), kept_roster.len()
    );

    Ok(Reassembly {
        roster: resimulated_roster.union(&kept_roster),
        tables: TripTables { individual, joint },
        drift,
        resimulated_households: resimulated_ids.len(),
    })
}

/// Integer expansion factor for a sample rate; `1 / rate` must be whole.
pub fn rescale_factor(sample_rate: f64) -> Result<usize> {
    if !(sample_rate > 0.0 && sample_rate <= 1.0) {
        return Err(RsmError::Config(format!("sample rate {sample_rate} must lie in (0, 1]")));
    }
    let factor = 1.0 / sample_rate;
    if (factor - factor.round()).abs() > FACTOR_TOLERANCE {
        return Err(RsmError::Config(format!(
            "rescale-only mode needs 1 / sample_rate to be a whole number (sample rate {sample_rate})"
        )));
    }
    Ok(factor.round() as usize)
}

/// Repeat every row `factor` times, consecutively.
pub fn repeat_rows(df: &DataFrame, factor: usize) -> Result<DataFrame> {
    let index = (0..df.height() as IdxSize)
        .flat_map(|i| std::iter::repeat_n(i, factor))
        .collect::<Vec<_>>();
    Ok(df.take(&IdxCa::from_vec("idx".into(), index))?)
}

/// Approximate full-population trips from the sample alone.
pub fn rescale_only(resimulated: &TripTables, sample_rate: f64) -> Result<TripTables> {
    let factor = rescale_factor(sample_rate)?;
    info!("rescaling sampled trips by {factor}");
    Ok(TripTables {
        individual: repeat_rows(&resimulated.individual, factor)?,
        joint: repeat_rows(&resimulated.joint, factor)?,
    })
}
