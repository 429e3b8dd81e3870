use std::collections::BTreeMap;

use ahash::AHashSet;
use polars::{frame::DataFrame, prelude::Column};

use crate::{common::column_i64, error::{Result, RsmError}};

pub const HH_ID: &str = "hh_id";
pub const TOUR_ID: &str = "tour_id";
pub const TRIP_MODE: &str = "trip_mode";
pub const NUM_PARTICIPANTS: &str = "num_participants";

/// One trip by one trip-maker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Trip {
    pub hh_id: i64,
    pub tour_id: i64,
    pub trip_mode: i64,
}

/// Canonical multiset of trips: joint trips expanded to one row per
/// participant, followed by the individual trips.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TripRoster {
    trips: Vec<Trip>,
}

impl TripRoster {
    pub fn new(trips: Vec<Trip>) -> Self { Self { trips } }

    /// Build from individual and joint trip tables. A joint row is repeated
    /// `num_participants` times.
    pub fn canonical(individual: &DataFrame, joint: &DataFrame) -> Result<Self> {
        let participants = column_i64(joint, NUM_PARTICIPANTS)?;
        if let Some((row, n)) = participants.iter().enumerate().find(|(_, n)| **n < 0) {
            return Err(RsmError::InvalidData(format!("joint trip row {row} has {n} participants")));
        }

        let mut trips = Vec::with_capacity(individual.height() + participants.iter().sum::<i64>() as usize);
        for (trip, &n) in read_trips(joint)?.into_iter().zip(&participants) {
            trips.extend(std::iter::repeat_n(trip, n as usize));
        }
        trips.extend(read_trips(individual)?);
        Ok(Self { trips })
    }

    #[inline] pub fn len(&self) -> usize { self.trips.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.trips.is_empty() }

    #[inline] pub fn trips(&self) -> &[Trip] { &self.trips }

    pub fn household_ids(&self) -> AHashSet<i64> {
        self.trips.iter().map(|t| t.hh_id).collect()
    }

    /// Trips whose household is (`keep = true`) or is not in `households`.
    pub fn filter_households(&self, households: &AHashSet<i64>, keep: bool) -> Self {
        Self { trips: self.trips.iter().filter(|t| households.contains(&t.hh_id) == keep).copied().collect() }
    }

    /// Append the trips of `other`.
    pub fn union(mut self, other: &TripRoster) -> Self {
        self.trips.extend_from_slice(&other.trips);
        self
    }

    /// Trip counts per (household, mode).
    pub fn counts_by_household_mode(&self) -> BTreeMap<(i64, i64), usize> {
        let mut counts = BTreeMap::new();
        self.trips.iter().for_each(|t| *counts.entry((t.hh_id, t.trip_mode)).or_default() += 1);
        counts
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            Column::new(HH_ID.into(), self.trips.iter().map(|t| t.hh_id).collect::<Vec<_>>()),
            Column::new(TOUR_ID.into(), self.trips.iter().map(|t| t.tour_id).collect::<Vec<_>>()),
            Column::new(TRIP_MODE.into(), self.trips.iter().map(|t| t.trip_mode).collect::<Vec<_>>()),
        ])?)
    }
}

fn read_trips(df: &DataFrame) -> Result<Vec<Trip>> {
    let (hh, tour, mode) = (column_i64(df, HH_ID)?, column_i64(df, TOUR_ID)?, column_i64(df, TRIP_MODE)?);
    Ok(hh.into_iter().zip(tour).zip(mode)
        .map(|((hh_id, tour_id), trip_mode)| Trip { hh_id, tour_id, trip_mode })
        .collect())
}
