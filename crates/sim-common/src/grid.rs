//! ESRI ASCII raster grids.
//!
//! Soil, elevation, slope, land-use and crop-mask layers all share this
//! layout: a six line header followed by `nrows` lines of `ncols` values.
//! Row 0 is the northernmost row.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::coord::Coordinate;
use crate::error::{SimError, SimResult};

/// Header of an ASCII grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridHeader {
    /// Number of columns (x direction)
    pub ncols: usize,
    /// Number of rows (y direction)
    pub nrows: usize,
    /// X of the lower left corner of the lower left cell
    pub xllcorner: f64,
    /// Y of the lower left corner of the lower left cell
    pub yllcorner: f64,
    /// Cell edge length in CRS units
    pub cellsize: f64,
    /// Value marking cells without data
    pub nodata_value: f64,
}

impl GridHeader {
    /// Center of the cell at (row, col).
    pub fn cell_center(&self, row: usize, col: usize) -> Coordinate {
        let half = self.cellsize / 2.0;
        Coordinate {
            x: self.xllcorner + half + col as f64 * self.cellsize,
            y: self.yllcorner + half + (self.nrows - row - 1) as f64 * self.cellsize,
        }
    }

    /// The (row, col) of the cell containing a coordinate.
    pub fn cell_at(&self, coord: &Coordinate) -> Option<(usize, usize)> {
        let col_f = ((coord.x - self.xllcorner) / self.cellsize).floor();
        let row_from_bottom = ((coord.y - self.yllcorner) / self.cellsize).floor();

        if col_f < 0.0 || row_from_bottom < 0.0 {
            return None;
        }

        let col = col_f as usize;
        let row_from_bottom = row_from_bottom as usize;
        if col >= self.ncols || row_from_bottom >= self.nrows {
            return None;
        }

        Some((self.nrows - 1 - row_from_bottom, col))
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.ncols * self.nrows
    }

    /// Check if the grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.ncols == 0 || self.nrows == 0
    }
}

/// An in-memory ASCII grid.
#[derive(Debug, Clone)]
pub struct AsciiGrid {
    header: GridHeader,
    values: Vec<f64>,
}

impl AsciiGrid {
    /// Create a grid from a header and row-major values.
    pub fn new(header: GridHeader, values: Vec<f64>) -> SimResult<Self> {
        if values.len() != header.len() {
            return Err(SimError::InvalidGrid(format!(
                "expected {} values, found {}",
                header.len(),
                values.len()
            )));
        }
        Ok(Self { header, values })
    }

    /// Read and parse a grid file.
    pub fn read(path: impl AsRef<Path>) -> SimResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
            .map_err(|e| SimError::InvalidGrid(format!("{}: {}", path.as_ref().display(), e)))
    }

    /// Parse grid text.
    pub fn parse(content: &str) -> SimResult<Self> {
        let mut lines = content.lines();

        let mut ncols = None;
        let mut nrows = None;
        let mut xllcorner = None;
        let mut yllcorner = None;
        let mut xllcenter = None;
        let mut yllcenter = None;
        let mut cellsize = None;
        let mut nodata_value = None;

        for _ in 0..6 {
            let line = lines
                .next()
                .ok_or_else(|| SimError::InvalidGrid("truncated header".to_string()))?;
            let mut parts = line.split_whitespace();
            let key = parts.next().unwrap_or_default().to_lowercase();
            let value: f64 = parts
                .next()
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| SimError::InvalidGrid(format!("bad header line '{}'", line)))?;

            match key.as_str() {
                "ncols" => ncols = Some(value as usize),
                "nrows" => nrows = Some(value as usize),
                "xllcorner" => xllcorner = Some(value),
                "yllcorner" => yllcorner = Some(value),
                "xllcenter" => xllcenter = Some(value),
                "yllcenter" => yllcenter = Some(value),
                "cellsize" => cellsize = Some(value),
                "nodata_value" => nodata_value = Some(value),
                other => {
                    return Err(SimError::InvalidGrid(format!(
                        "unknown header key '{}'",
                        other
                    )))
                }
            }
        }

        let missing = |name: &str| SimError::InvalidGrid(format!("missing header '{}'", name));
        let cellsize = cellsize.ok_or_else(|| missing("cellsize"))?;
        let xllcorner = xllcorner
            .or(xllcenter.map(|c| c - cellsize / 2.0))
            .ok_or_else(|| missing("xllcorner"))?;
        let yllcorner = yllcorner
            .or(yllcenter.map(|c| c - cellsize / 2.0))
            .ok_or_else(|| missing("yllcorner"))?;

        let header = GridHeader {
            ncols: ncols.ok_or_else(|| missing("ncols"))?,
            nrows: nrows.ok_or_else(|| missing("nrows"))?,
            xllcorner,
            yllcorner,
            cellsize,
            nodata_value: nodata_value.unwrap_or(-9999.0),
        };

        let values = lines
            .flat_map(str::split_whitespace)
            .map(|v| {
                v.parse::<f64>()
                    .map_err(|_| SimError::InvalidGrid(format!("bad value '{}'", v)))
            })
            .collect::<SimResult<Vec<_>>>()?;

        Self::new(header, values)
    }

    pub fn header(&self) -> &GridHeader {
        &self.header
    }

    /// Raw value at (row, col), including the no-data sentinel.
    pub fn value_at(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.header.nrows || col >= self.header.ncols {
            return None;
        }
        self.values.get(row * self.header.ncols + col).copied()
    }

    /// Value of the cell containing `coord`.
    ///
    /// Returns `None` outside the grid and for no-data cells.
    pub fn nearest_value(&self, coord: &Coordinate) -> Option<f64> {
        let (row, col) = self.header.cell_at(coord)?;
        self.value_at(row, col).filter(|v| !self.is_nodata(*v))
    }

    /// Check a value against the declared no-data sentinel.
    pub fn is_nodata(&self, value: f64) -> bool {
        (value - self.header.nodata_value).abs() < f64::EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "ncols 3\nnrows 2\nxllcorner 1000\nyllcorner 2000\ncellsize 100\nNODATA_value -9999\n1 2 3\n4 -9999 6\n";

    #[test]
    fn test_parse_header_and_values() {
        let grid = AsciiGrid::parse(SAMPLE).unwrap();
        let header = grid.header();
        assert_eq!(header.ncols, 3);
        assert_eq!(header.nrows, 2);
        assert_eq!(header.nodata_value, -9999.0);
        assert_eq!(grid.value_at(0, 2), Some(3.0));
        assert_eq!(grid.value_at(1, 0), Some(4.0));
        assert_eq!(grid.value_at(2, 0), None);
    }

    #[test]
    fn test_cell_center_row_zero_is_north() {
        let grid = AsciiGrid::parse(SAMPLE).unwrap();
        let top_left = grid.header().cell_center(0, 0);
        assert_eq!(top_left, Coordinate::new(1050.0, 2150.0));
        let bottom_right = grid.header().cell_center(1, 2);
        assert_eq!(bottom_right, Coordinate::new(1250.0, 2050.0));
    }

    #[test]
    fn test_nearest_value_roundtrip_through_centers() {
        let grid = AsciiGrid::parse(SAMPLE).unwrap();
        for row in 0..2 {
            for col in 0..3 {
                let center = grid.header().cell_center(row, col);
                assert_eq!(grid.header().cell_at(&center), Some((row, col)));
            }
        }
        assert_eq!(grid.nearest_value(&grid.header().cell_center(0, 1)), Some(2.0));
    }

    #[test]
    fn test_nearest_value_nodata_and_outside() {
        let grid = AsciiGrid::parse(SAMPLE).unwrap();
        assert_eq!(grid.nearest_value(&grid.header().cell_center(1, 1)), None);
        assert_eq!(grid.nearest_value(&Coordinate::new(0.0, 0.0)), None);
    }

    #[test]
    fn test_value_count_mismatch() {
        let broken = "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\nnodata_value -1\n1 2 3\n";
        assert!(matches!(
            AsciiGrid::parse(broken),
            Err(SimError::InvalidGrid(_))
        ));
    }
}
