//! End effector collision proxy: a downsampled point set and a bounding box, both in the
//! end effector frame.

use crate::obstacles::voxel_downsample;
use crate::planner_error::{PlannerError, PlannerResult};
use nalgebra::{Isometry3, Point3};
use parry3d::bounding_volume::{Aabb, BoundingVolume};
use parry3d::math::Point as ParryPoint;

/// Half size of the default collision box, used until a mesh is ingested.
pub const DEFAULT_BOX_HALF_EXTENT: f32 = 0.08;

/// Default voxel size for tool downsampling, suits a small hand tool surface.
pub const DEFAULT_VOXEL_LEAF_SIZE: f64 = 0.02;

/// Collision proxy of the end effector. Always replaced as a whole.
#[derive(Debug, Clone)]
pub struct ToolModel {
    /// Downsampled surface points in the end effector frame.
    pub points: Vec<Point3<f64>>,

    /// Axis aligned box in the end effector frame, margin already applied.
    pub bounds: Aabb,
}

impl Default for ToolModel {
    fn default() -> Self {
        let h = DEFAULT_BOX_HALF_EXTENT;
        Self {
            points: Vec::new(),
            bounds: Aabb::new(ParryPoint::new(-h, -h, -h), ParryPoint::new(h, h, h)),
        }
    }
}

/// How mesh points are brought into the end effector frame.
#[derive(Debug, Clone)]
pub struct ToolMounting {
    /// Fixed transform from the recentred mesh into the end effector frame.
    pub mounting: Isometry3<f64>,

    /// Scale applied around the mesh centroid before mounting.
    pub scale: f64,

    /// Additive margin that expands the bounding box on every side.
    pub margin: f64,

    /// Voxel grid leaf size for downsampling.
    pub leaf_size: f64,
}

impl Default for ToolMounting {
    fn default() -> Self {
        Self {
            mounting: Isometry3::identity(),
            scale: 1.0,
            margin: 0.0,
            leaf_size: DEFAULT_VOXEL_LEAF_SIZE,
        }
    }
}

impl ToolModel {
    /// Builds the collision proxy from mesh vertices that the caller already loaded.
    /// Points are recentred around their centroid and scaled, the box is computed from all
    /// mounted points, and the stored point set is the mounted, voxel downsampled cloud.
    pub fn from_mesh_points(mesh_points: &[Point3<f64>], mounting: &ToolMounting) -> PlannerResult<Self> {
        if mesh_points.is_empty() {
            return Err(PlannerError::IngestionFailure("mesh contains no points".into()));
        }
        if !(mounting.scale.is_finite() && mounting.scale > 0.0)
            || !(mounting.margin.is_finite() && mounting.margin >= 0.0)
        {
            return Err(PlannerError::IngestionFailure(format!(
                "invalid scale {} or margin {}", mounting.scale, mounting.margin
            )));
        }
        if !mesh_points.iter().all(|p| p.coords.iter().all(|c| c.is_finite())) {
            return Err(PlannerError::IngestionFailure("mesh contains non-finite points".into()));
        }

        let centroid = mesh_points
            .iter()
            .fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords)
            / mesh_points.len() as f64;
        let recentred: Vec<Point3<f64>> = mesh_points
            .iter()
            .map(|p| Point3::from((p.coords - centroid) * mounting.scale))
            .collect();

        let mut mins = Point3::new(f64::MAX, f64::MAX, f64::MAX);
        let mut maxs = Point3::new(f64::MIN, f64::MIN, f64::MIN);
        for p in recentred.iter() {
            let m = mounting.mounting.transform_point(p);
            mins = mins.inf(&m);
            maxs = maxs.sup(&m);
        }
        let bounds = Aabb::new(to_parry(&mins), to_parry(&maxs)).loosened(mounting.margin as f32);

        let points: Vec<Point3<f64>> = voxel_downsample(&recentred, mounting.leaf_size)
            .iter()
            .map(|p| mounting.mounting.transform_point(p))
            .collect();
        if points.is_empty() {
            return Err(PlannerError::IngestionFailure("downsampling produced no points".into()));
        }

        Ok(ToolModel { points, bounds })
    }
}

fn to_parry(p: &Point3<f64>) -> ParryPoint<f32> {
    ParryPoint::new(p.x as f32, p.y as f32, p.z as f32)
}
