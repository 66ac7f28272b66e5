//! Obstacle point set and the nearest neighbour oracle the planner consumes.
//!
//! The planner only reads obstacles through [`ObstacleIndex`]. It is held as an
//! `Arc<dyn ObstacleIndex>` snapshot for the duration of a planning call and is queried
//! concurrently from the MPPI workers, so implementations must be immutable once built.
//! To update obstacles, build a new index and swap the `Arc` between planning calls.

use kdtree::KdTree;
use kdtree::distance::squared_euclidean;
use nalgebra::Point3;
use std::collections::HashMap;
use tracing::warn;

/// Read-only view of the obstacle field.
pub trait ObstacleIndex: Send + Sync {
    /// All obstacle points, used for frustum and box counting.
    fn points(&self) -> &[Point3<f64>];

    /// Euclidean distance from `query` to the closest obstacle point, None if there are
    /// no obstacle points.
    fn nearest_distance(&self, query: &Point3<f64>) -> Option<f64>;

    fn len(&self) -> usize {
        self.points().len()
    }

    fn is_empty(&self) -> bool {
        self.points().is_empty()
    }
}

/// Obstacle cloud indexed with a kd-tree.
pub struct KdObstacles {
    points: Vec<Point3<f64>>,
    tree: KdTree<f64, usize, [f64; 3]>,
}

impl KdObstacles {
    /// Builds the index. Points with non-finite coordinates cannot be indexed and are
    /// dropped.
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        let mut tree = KdTree::new(3);
        let mut kept = Vec::with_capacity(points.len());
        for p in points {
            if !p.coords.iter().all(|c| c.is_finite()) {
                warn!("Dropping non-finite obstacle point {:?}", p);
                continue;
            }
            match tree.add([p.x, p.y, p.z], kept.len()) {
                Ok(()) => kept.push(p),
                Err(e) => warn!("Obstacle point {:?} not indexed: {:?}", p, e),
            }
        }
        KdObstacles { points: kept, tree }
    }
}

impl ObstacleIndex for KdObstacles {
    fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    fn nearest_distance(&self, query: &Point3<f64>) -> Option<f64> {
        if self.points.is_empty() {
            return None;
        }
        let nearest = self
            .tree
            .nearest(&[query.x, query.y, query.z], 1, &squared_euclidean)
            .ok()?;
        nearest.first().map(|(d2, _)| d2.sqrt())
    }
}

impl std::fmt::Debug for KdObstacles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KdObstacles {{ {} points }}", self.points.len())
    }
}

/// Downsample points using a voxel grid filter, keeping the centroid of the points that
/// fall into every occupied voxel. Non-positive leaf size returns the input unchanged.
pub fn voxel_downsample(points: &[Point3<f64>], leaf_size: f64) -> Vec<Point3<f64>> {
    if points.is_empty() || !(leaf_size > 0.0) {
        return points.to_vec();
    }
    let inv_leaf = 1.0 / leaf_size;

    // Key is the integer voxel coordinate, value is (sum, count)
    let mut voxels: HashMap<(i64, i64, i64), (nalgebra::Vector3<f64>, usize)> = HashMap::new();
    let mut order = Vec::new();
    for p in points {
        let key = (
            (p.x * inv_leaf).floor() as i64,
            (p.y * inv_leaf).floor() as i64,
            (p.z * inv_leaf).floor() as i64,
        );
        let entry = voxels.entry(key).or_insert_with(|| {
            order.push(key);
            (nalgebra::Vector3::zeros(), 0)
        });
        entry.0 += p.coords;
        entry.1 += 1;
    }

    // Keep first-seen order so that the output is deterministic
    order
        .iter()
        .map(|key| {
            let (sum, count) = voxels[key];
            Point3::from(sum / count as f64)
        })
        .collect()
}
