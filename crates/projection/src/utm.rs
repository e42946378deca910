//! Transverse Mercator projection on an ellipsoid.
//!
//! Uses the series expansions from Snyder, "Map Projections: A Working
//! Manual" (USGS PP 1395), pp. 61-64. Accuracy is well below a meter within
//! a UTM zone, which is far finer than the 1 km rasters this is used for.

use sim_common::{Coordinate, LatLon};

use crate::{Projection, ProjectionError, Result};

/// GRS80 semi-major axis (meters)
const GRS80_A: f64 = 6_378_137.0;
/// GRS80 inverse flattening
const GRS80_INV_F: f64 = 298.257_222_101;

/// UTM scale factor on the central meridian
const UTM_K0: f64 = 0.9996;
/// UTM false easting (meters)
const UTM_FALSE_EASTING: f64 = 500_000.0;

/// Transverse Mercator projection parameters.
#[derive(Debug, Clone)]
pub struct TransverseMercator {
    /// Semi-major axis (meters)
    pub a: f64,
    /// First eccentricity squared
    pub e2: f64,
    /// Central meridian in radians
    pub lon0: f64,
    /// Latitude of origin in radians
    pub lat0: f64,
    /// Scale factor on the central meridian
    pub k0: f64,
    pub false_easting: f64,
    pub false_northing: f64,
    /// Second eccentricity squared
    ep2: f64,
    /// Meridian arc length at lat0
    m0: f64,
}

impl TransverseMercator {
    /// Create a projection on the GRS80 ellipsoid.
    pub fn new(
        lon0_deg: f64,
        lat0_deg: f64,
        k0: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let f = 1.0 / GRS80_INV_F;
        let e2 = f * (2.0 - f);
        let mut tm = Self {
            a: GRS80_A,
            e2,
            lon0: lon0_deg.to_radians(),
            lat0: lat0_deg.to_radians(),
            k0,
            false_easting,
            false_northing,
            ep2: e2 / (1.0 - e2),
            m0: 0.0,
        };
        tm.m0 = tm.meridian_arc(tm.lat0);
        tm
    }

    /// UTM zone on the northern hemisphere (ETRS89 / UTM `zone`N).
    pub fn utm_north(zone: u8) -> Self {
        let lon0 = -183.0 + 6.0 * f64::from(zone);
        Self::new(lon0, 0.0, UTM_K0, UTM_FALSE_EASTING, 0.0)
    }

    /// ETRS89 / UTM zone 32N, EPSG:25832.
    pub fn etrs89_utm32n() -> Self {
        Self::utm_north(32)
    }

    /// Meridian arc length from the equator to `phi`.
    fn meridian_arc(&self, phi: f64) -> f64 {
        let e2 = self.e2;
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        self.a
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
    }
}

impl Projection for TransverseMercator {
    fn forward(&self, position: LatLon) -> Result<Coordinate> {
        if !position.lat.is_finite() || !position.lon.is_finite() {
            return Err(ProjectionError::NotFinite);
        }
        if position.lat.abs() >= 90.0 {
            return Err(ProjectionError::LatitudeOutOfRange(position.lat));
        }

        let phi = position.lat.to_radians();
        let lambda = position.lon.to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();

        let n = self.a / (1.0 - self.e2 * sin_phi * sin_phi).sqrt();
        let t = phi.tan().powi(2);
        let c = self.ep2 * cos_phi * cos_phi;
        let a = (lambda - self.lon0) * cos_phi;
        let m = self.meridian_arc(phi);

        let a2 = a * a;
        let a3 = a2 * a;
        let a4 = a3 * a;
        let a5 = a4 * a;
        let a6 = a5 * a;

        let x = self.k0
            * n
            * (a + (1.0 - t + c) * a3 / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * self.ep2) * a5 / 120.0);
        let y = self.k0
            * (m - self.m0
                + n * phi.tan()
                    * (a2 / 2.0
                        + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                        + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * self.ep2) * a6 / 720.0));

        Ok(Coordinate::new(
            x + self.false_easting,
            y + self.false_northing,
        ))
    }

    fn inverse(&self, coord: Coordinate) -> Result<LatLon> {
        if !coord.x.is_finite() || !coord.y.is_finite() {
            return Err(ProjectionError::NotFinite);
        }

        let e2 = self.e2;
        let e4 = e2 * e2;
        let e6 = e4 * e2;

        let m = self.m0 + (coord.y - self.false_northing) / self.k0;
        let mu = m / (self.a * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

        let sqrt_1_e2 = (1.0 - e2).sqrt();
        let e1 = (1.0 - sqrt_1_e2) / (1.0 + sqrt_1_e2);
        let e1_2 = e1 * e1;
        let e1_3 = e1_2 * e1;
        let e1_4 = e1_3 * e1;

        // Footpoint latitude
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

        let (sin_phi1, cos_phi1) = phi1.sin_cos();
        let tan_phi1 = phi1.tan();
        let c1 = self.ep2 * cos_phi1 * cos_phi1;
        let t1 = tan_phi1 * tan_phi1;
        let w = 1.0 - e2 * sin_phi1 * sin_phi1;
        let n1 = self.a / w.sqrt();
        let r1 = self.a * (1.0 - e2) / w.powf(1.5);
        let d = (coord.x - self.false_easting) / (n1 * self.k0);

        let d2 = d * d;
        let d3 = d2 * d;
        let d4 = d3 * d;
        let d5 = d4 * d;
        let d6 = d5 * d;

        let phi = phi1
            - (n1 * tan_phi1 / r1)
                * (d2 / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * self.ep2) * d4 / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                        - 252.0 * self.ep2
                        - 3.0 * c1 * c1)
                        * d6
                        / 720.0);
        let lambda = self.lon0
            + (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * self.ep2 + 24.0 * t1 * t1)
                    * d5
                    / 120.0)
                / cos_phi1;

        Ok(LatLon::new(phi.to_degrees(), lambda.to_degrees()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_central_meridian_at_equator() {
        let tm = TransverseMercator::etrs89_utm32n();
        let c = tm.forward(LatLon::new(0.0, 9.0)).unwrap();
        assert!((c.x - 500_000.0).abs() < 1e-6);
        assert!(c.y.abs() < 1e-6);
    }

    #[test]
    fn test_meridian_northing_at_50n() {
        // Meridian arc to 50 degrees on GRS80 is 5 540 847.04 m
        let tm = TransverseMercator::etrs89_utm32n();
        let c = tm.forward(LatLon::new(50.0, 9.0)).unwrap();
        assert!((c.x - 500_000.0).abs() < 1e-6);
        assert!((c.y - 5_540_847.04 * 0.9996).abs() < 1.0, "northing {}", c.y);
    }

    #[test]
    fn test_symmetric_about_central_meridian() {
        let tm = TransverseMercator::etrs89_utm32n();
        let east = tm.forward(LatLon::new(51.0, 11.5)).unwrap();
        let west = tm.forward(LatLon::new(51.0, 6.5)).unwrap();
        assert!(((east.x - 500_000.0) - (500_000.0 - west.x)).abs() < 1e-6);
        assert!((east.y - west.y).abs() < 1e-6);
    }

    #[test]
    fn test_round_trip_across_germany() {
        let tm = TransverseMercator::etrs89_utm32n();
        for lat in [47.3, 49.0, 51.5, 53.2, 55.0] {
            for lon in [6.0, 8.0, 10.4, 12.0] {
                let c = tm.forward(LatLon::new(lat, lon)).unwrap();
                let back = tm.inverse(c).unwrap();
                assert!((back.lat - lat).abs() < 1e-6, "lat {} -> {}", lat, back.lat);
                assert!((back.lon - lon).abs() < 1e-6, "lon {} -> {}", lon, back.lon);
            }
        }
    }

    #[test]
    fn test_rejects_poles_and_nan() {
        let tm = TransverseMercator::etrs89_utm32n();
        assert_eq!(
            tm.forward(LatLon::new(90.0, 0.0)).unwrap_err(),
            ProjectionError::LatitudeOutOfRange(90.0)
        );
        assert_eq!(
            tm.inverse(Coordinate::new(f64::NAN, 0.0)).unwrap_err(),
            ProjectionError::NotFinite
        );
    }
}
