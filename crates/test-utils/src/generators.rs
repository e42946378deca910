//! Generators for synthetic ESRI ASCII raster layers.
//!
//! The default layout is a small 3 x 4 grid in ETRS89 / UTM 32N covering
//! the area around 52.45 N, 13.3 E, where the phenology and climate
//! fixtures place their points.

/// Header values of a generated grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AsciiGridSpec {
    pub ncols: usize,
    pub nrows: usize,
    pub xllcorner: f64,
    pub yllcorner: f64,
    pub cellsize: f64,
    pub nodata_value: f64,
}

impl AsciiGridSpec {
    /// Center of the cell at (row, col), row 0 being the northernmost.
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        let half = self.cellsize / 2.0;
        (
            self.xllcorner + half + col as f64 * self.cellsize,
            self.yllcorner + half + (self.nrows - row - 1) as f64 * self.cellsize,
        )
    }
}

/// 3 rows x 4 columns of 1 km cells south-west of Berlin.
pub const BERLIN_3X4: AsciiGridSpec = AsciiGridSpec {
    ncols: 4,
    nrows: 3,
    xllcorner: 790_000.0,
    yllcorner: 5_817_000.0,
    cellsize: 1000.0,
    nodata_value: -9999.0,
};

/// Renders a grid file from row-major values.
///
/// # Panics
///
/// Panics if `values` does not hold `ncols * nrows` entries.
pub fn ascii_grid(spec: &AsciiGridSpec, values: &[f64]) -> String {
    assert_eq!(
        values.len(),
        spec.ncols * spec.nrows,
        "value count does not match grid size"
    );

    let mut out = format!(
        "ncols {}\nnrows {}\nxllcorner {}\nyllcorner {}\ncellsize {}\nNODATA_value {}\n",
        spec.ncols, spec.nrows, spec.xllcorner, spec.yllcorner, spec.cellsize, spec.nodata_value
    );
    for row in values.chunks(spec.ncols) {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

/// Renders a grid whose cells are computed from (row, col).
pub fn ascii_grid_from_fn(spec: &AsciiGridSpec, value: impl Fn(usize, usize) -> f64) -> String {
    let mut values = Vec::with_capacity(spec.ncols * spec.nrows);
    for row in 0..spec.nrows {
        for col in 0..spec.ncols {
            values.push(value(row, col));
        }
    }
    ascii_grid(spec, &values)
}

/// Renders a grid with every cell set to `value`.
pub fn uniform_ascii_grid(spec: &AsciiGridSpec, value: f64) -> String {
    ascii_grid_from_fn(spec, |_, _| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_grid_layout() {
        let text = ascii_grid_from_fn(&BERLIN_3X4, |row, col| (col * 1000 + row) as f64);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 9);
        assert_eq!(lines[0], "ncols 4");
        assert_eq!(lines[5], "NODATA_value -9999");
        assert_eq!(lines[6], "0 1000 2000 3000");
        assert_eq!(lines[8], "2 1002 2002 3002");
    }

    #[test]
    fn test_uniform_grid() {
        let text = uniform_ascii_grid(&BERLIN_3X4, 1.0);
        assert!(text.lines().skip(6).all(|line| line == "1 1 1 1"));
    }

    #[test]
    fn test_cell_center() {
        assert_eq!(BERLIN_3X4.cell_center(0, 0), (790_500.0, 5_819_500.0));
        assert_eq!(BERLIN_3X4.cell_center(2, 3), (793_500.0, 5_817_500.0));
    }
}
