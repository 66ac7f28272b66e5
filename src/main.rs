//! Demo planner: approaches an inspection pose above a synthetic planar obstacle patch
//! and prints the waypoints.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use nalgebra::Point3;
use rs_waypoint_mpc::config::PlannerConfig;
use rs_waypoint_mpc::planner::{Strategy, WaypointPlanner};
use rs_waypoint_mpc::tool_model::ToolMounting;
use rs_waypoint_mpc::utils::{dump_waypoints, path_length, pose_degrees};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, ValueEnum)]
enum Optimizer {
    /// Derivative-free pattern search
    Nlp,
    /// Sampling based MPPI
    Mppi,
}

/// Receding horizon waypoint planner demo
#[derive(Parser)]
#[command(name = "rs-waypoint-mpc")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML file with planner configuration overrides
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// End effector mesh (STL, PLY, OBJ or DAE) for the collision proxy
    #[arg(short, long)]
    tool_mesh: Option<String>,

    /// Goal position in meters
    #[arg(long, num_args = 3, default_values_t = [0.3, 0.0, 0.1])]
    goal: Vec<f64>,

    /// Goal roll, pitch and yaw in degrees
    #[arg(long, num_args = 3, default_values_t = [0.0, 0.0, 0.0])]
    goal_rpy: Vec<f64>,

    #[arg(short, long, value_enum, default_value = "nlp")]
    optimizer: Optimizer,

    /// Number of points per side of the synthetic obstacle patch
    #[arg(long, default_value = "15")]
    patch_resolution: usize,
}

/// Square patch of points parallel to XY, centered at `center`.
fn obstacle_patch(center: Point3<f64>, half_size: f64, resolution: usize) -> Vec<Point3<f64>> {
    let n = resolution.max(2);
    let step = 2.0 * half_size / (n - 1) as f64;
    let mut points = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            points.push(Point3::new(
                center.x - half_size + i as f64 * step,
                center.y - half_size + j as f64 * step,
                center.z,
            ));
        }
    }
    points
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => PlannerConfig::from_yaml_file(path)?,
        None => PlannerConfig::default(),
    };
    let mut planner = WaypointPlanner::new(config)?;

    if let Some(mesh) = &cli.tool_mesh {
        planner.update_end_effector_from_file(mesh, &ToolMounting::default())?;
    }

    let init = pose_degrees([0.0, 0.0, 0.0], [0.0, 0.0, 0.0]);
    let goal = pose_degrees(
        [cli.goal[0], cli.goal[1], cli.goal[2]],
        [cli.goal_rpy[0], cli.goal_rpy[1], cli.goal_rpy[2]],
    );

    // Inspected surface sits above the goal, along its camera axis
    let surface_center = goal * Point3::new(0.0, 0.0, 0.25);
    let patch = obstacle_patch(surface_center, 0.1, cli.patch_resolution);
    info!("Synthetic obstacle patch of {} points at {:?}", patch.len(), surface_center);
    planner.set_obstacle_points(patch);

    let strategy = match cli.optimizer {
        Optimizer::Nlp => Strategy::Nlp,
        Optimizer::Mppi => Strategy::Mppi,
    };
    let plan = planner.generate_waypoints(&init, &goal, strategy)?;

    dump_waypoints(&plan.waypoints);
    println!(
        "{:?} after {} iterations in {:?}, path length {:.3} m, {} of {} waypoints kept, {:.1} points visible on average",
        plan.diagnostics.termination,
        plan.diagnostics.iterations,
        plan.diagnostics.elapsed,
        path_length(&plan.waypoints),
        plan.diagnostics.fused_waypoints,
        plan.diagnostics.raw_waypoints,
        plan.diagnostics.average_visible_points
    );
    Ok(())
}
