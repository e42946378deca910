//! Per-cluster sowing and harvest dates.

use sim_common::{LatLon, RelativeDate};

use crate::error::{PhenologyError, Result};

/// Relative year of dates falling in the sowing year.
const SOWING_YEAR: i32 = 0;

/// Perennial clover-alfalfa is harvested two years after sowing.
const PERENNIAL_CROP: &str = "CLALF";

// Column layout of the seed/harvest table
const COL_CLUSTER_ID: usize = 0;
const COL_LAT: usize = 1;
const COL_LON: usize = 2;
const COL_WINTER_CROP: usize = 4;
const COL_SOWING: usize = 6;
const COL_EARLIEST_SOWING: usize = 8;
const COL_LATEST_SOWING: usize = 9;
const COL_HARVEST: usize = 11;
const COL_EARLIEST_HARVEST: usize = 13;
const COL_LATEST_HARVEST: usize = 14;

/// Observed sowing and harvest dates of one spatial cluster.
///
/// Sowing dates carry relative year `0000`. Harvest dates carry `0001` for
/// winter crops, `0002` for perennial clover-alfalfa and `0000` otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct PhenologyRecord {
    pub cluster_id: i64,
    pub position: LatLon,
    pub is_winter_crop: bool,
    pub sowing_date: RelativeDate,
    pub earliest_sowing_date: RelativeDate,
    pub latest_sowing_date: RelativeDate,
    pub harvest_date: RelativeDate,
    pub earliest_harvest_date: RelativeDate,
    pub latest_harvest_date: RelativeDate,
}

impl PhenologyRecord {
    /// Parse one table row.
    ///
    /// Returns `Ok(None)` for rows missing a latest sowing, harvest or
    /// latest harvest day.
    pub fn from_fields(fields: &[&str], line: usize, crop_id: &str) -> Result<Option<Self>> {
        let cell = |idx: usize| fields.get(idx).map(|f| f.trim()).unwrap_or("");

        if [COL_LATEST_HARVEST, COL_HARVEST, COL_LATEST_SOWING]
            .iter()
            .any(|&idx| cell(idx).is_empty())
        {
            return Ok(None);
        }

        let malformed = |message: String| PhenologyError::MalformedRecord { line, message };
        let number = |idx: usize| -> Result<f64> {
            cell(idx)
                .parse::<f64>()
                .map_err(|_| malformed(format!("column {} is not a number: '{}'", idx, cell(idx))))
        };
        let doy = |idx: usize| -> Result<i64> { number(idx).map(|v| v.trunc() as i64) };

        let is_winter_crop = cell(COL_WINTER_CROP) == "1";
        let harvest_year = if crop_id == PERENNIAL_CROP {
            2
        } else if is_winter_crop {
            1
        } else {
            SOWING_YEAR
        };

        let date = |idx: usize, year: i32| -> Result<RelativeDate> {
            let day = doy(idx)?;
            if !(1..=365).contains(&day) {
                return Err(malformed(format!("day of year {} out of range", day)));
            }
            // Day 1 is January 1st
            Ok(RelativeDate::from_reference_offset(year, day)?)
        };

        Ok(Some(Self {
            cluster_id: doy(COL_CLUSTER_ID)?,
            position: LatLon::new(number(COL_LAT)?, number(COL_LON)?),
            is_winter_crop,
            sowing_date: date(COL_SOWING, SOWING_YEAR)?,
            earliest_sowing_date: date(COL_EARLIEST_SOWING, SOWING_YEAR)?,
            latest_sowing_date: date(COL_LATEST_SOWING, SOWING_YEAR)?,
            harvest_date: date(COL_HARVEST, harvest_year)?,
            earliest_harvest_date: date(COL_EARLIEST_HARVEST, harvest_year)?,
            latest_harvest_date: date(COL_LATEST_HARVEST, harvest_year)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(winter: &str) -> Vec<&str> {
        // id, lat, lon, crop, winter, _, sow, _, esow, lsow, _, harv, _, eharv, lharv
        vec![
            "17", "52.1", "12.3", "WW", winter, "", "100.0", "", "90", "110", "", "263", "", "250", "270",
        ]
    }

    #[test]
    fn test_summer_crop_row() {
        let rec = PhenologyRecord::from_fields(&row("0"), 2, "SM").unwrap().unwrap();
        assert_eq!(rec.cluster_id, 17);
        assert!(!rec.is_winter_crop);
        assert_eq!(rec.sowing_date.to_string(), "0000-04-10");
        assert_eq!(rec.earliest_sowing_date.to_string(), "0000-03-31");
        assert_eq!(rec.latest_sowing_date.to_string(), "0000-04-20");
        assert_eq!(rec.harvest_date.to_string(), "0000-09-20");
        assert_eq!(rec.latest_harvest_date.to_string(), "0000-09-27");
    }

    #[test]
    fn test_winter_and_perennial_harvest_years() {
        let rec = PhenologyRecord::from_fields(&row("1"), 2, "WW").unwrap().unwrap();
        assert!(rec.is_winter_crop);
        assert_eq!(rec.sowing_date.year, 0);
        assert_eq!(rec.harvest_date.year, 1);

        let rec = PhenologyRecord::from_fields(&row("0"), 2, "CLALF").unwrap().unwrap();
        assert_eq!(rec.harvest_date.year, 2);
        assert_eq!(rec.earliest_harvest_date.year, 2);
    }

    #[test]
    fn test_incomplete_row_skipped() {
        let mut fields = row("0");
        fields[11] = "";
        assert!(PhenologyRecord::from_fields(&fields, 3, "SM").unwrap().is_none());
    }

    #[test]
    fn test_bad_number_reported_with_line() {
        let mut fields = row("0");
        fields[6] = "soon";
        let err = PhenologyRecord::from_fields(&fields, 9, "SM").unwrap_err();
        assert!(matches!(err, PhenologyError::MalformedRecord { line: 9, .. }));
    }
}
