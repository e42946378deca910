//! Nearest-neighbour lookup over scattered projected points.
//!
//! Points are hashed into square buckets. A query walks rings of buckets
//! outward from its own bucket and stops once no unvisited ring can hold a
//! closer point.

use std::collections::HashMap;

use crate::coord::Coordinate;

/// Bucketed nearest-neighbour index mapping points to values.
#[derive(Debug, Clone)]
pub struct NearestIndex<T> {
    points: Vec<(Coordinate, T)>,
    buckets: HashMap<(i64, i64), Vec<usize>>,
    bucket_size: f64,
    min_bucket: (i64, i64),
    max_bucket: (i64, i64),
}

impl<T> NearestIndex<T> {
    /// Build an index, choosing a bucket size from the point density.
    pub fn build(points: Vec<(Coordinate, T)>) -> Self {
        let bucket_size = Self::default_bucket_size(&points);
        Self::with_bucket_size(points, bucket_size)
    }

    /// Build an index with an explicit bucket edge length.
    pub fn with_bucket_size(points: Vec<(Coordinate, T)>, bucket_size: f64) -> Self {
        let bucket_size = if bucket_size.is_finite() && bucket_size > 0.0 {
            bucket_size
        } else {
            1.0
        };

        let mut buckets: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        let mut min_bucket = (i64::MAX, i64::MAX);
        let mut max_bucket = (i64::MIN, i64::MIN);

        for (i, (coord, _)) in points.iter().enumerate() {
            let key = Self::bucket_of(coord, bucket_size);
            min_bucket = (min_bucket.0.min(key.0), min_bucket.1.min(key.1));
            max_bucket = (max_bucket.0.max(key.0), max_bucket.1.max(key.1));
            buckets.entry(key).or_default().push(i);
        }

        Self {
            points,
            buckets,
            bucket_size,
            min_bucket,
            max_bucket,
        }
    }

    /// Value of the point closest to `query`, if the index is not empty.
    pub fn nearest(&self, query: &Coordinate) -> Option<&T> {
        self.nearest_entry(query).map(|(_, value)| value)
    }

    /// Closest point and its value.
    pub fn nearest_entry(&self, query: &Coordinate) -> Option<(&Coordinate, &T)> {
        if self.points.is_empty() {
            return None;
        }

        let (qx, qy) = Self::bucket_of(query, self.bucket_size);
        let max_ring = [
            (qx - self.min_bucket.0).abs(),
            (qx - self.max_bucket.0).abs(),
            (qy - self.min_bucket.1).abs(),
            (qy - self.max_bucket.1).abs(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0);

        let mut best: Option<(usize, f64)> = None;

        for ring in 0..=max_ring {
            for key in ring_keys(qx, qy, ring) {
                let Some(indices) = self.buckets.get(&key) else {
                    continue;
                };
                for &i in indices {
                    let d = self.points[i].0.distance_sq(query);
                    if best.map_or(true, |(_, best_d)| d < best_d) {
                        best = Some((i, d));
                    }
                }
            }

            // Anything in ring + 1 or further lies at least `ring` buckets away.
            if let Some((_, best_d)) = best {
                let bound = ring as f64 * self.bucket_size;
                if best_d <= bound * bound {
                    break;
                }
            }
        }

        best.map(|(i, _)| (&self.points[i].0, &self.points[i].1))
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the index holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn bucket_of(coord: &Coordinate, bucket_size: f64) -> (i64, i64) {
        (
            (coord.x / bucket_size).floor() as i64,
            (coord.y / bucket_size).floor() as i64,
        )
    }

    fn default_bucket_size(points: &[(Coordinate, T)]) -> f64 {
        if points.len() < 2 {
            return 1.0;
        }
        let (mut min_x, mut min_y) = (f64::MAX, f64::MAX);
        let (mut max_x, mut max_y) = (f64::MIN, f64::MIN);
        for (c, _) in points {
            min_x = min_x.min(c.x);
            min_y = min_y.min(c.y);
            max_x = max_x.max(c.x);
            max_y = max_y.max(c.y);
        }
        let extent = (max_x - min_x).max(max_y - min_y);
        extent / (points.len() as f64).sqrt()
    }
}

/// Bucket keys at Chebyshev distance `ring` from (cx, cy).
fn ring_keys(cx: i64, cy: i64, ring: i64) -> Vec<(i64, i64)> {
    if ring == 0 {
        return vec![(cx, cy)];
    }
    let mut keys = Vec::with_capacity((8 * ring) as usize);
    for dx in -ring..=ring {
        keys.push((cx + dx, cy - ring));
        keys.push((cx + dx, cy + ring));
    }
    for dy in (-ring + 1)..ring {
        keys.push((cx - ring, cy + dy));
        keys.push((cx + ring, cy + dy));
    }
    keys
}
