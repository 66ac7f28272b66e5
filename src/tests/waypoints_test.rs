#[cfg(test)]
mod tests {
    use nalgebra::Point3;

    use crate::config::PlannerConfig;
    use crate::fusion::FusionPolicy;
    use crate::planner::{Strategy, Termination};
    use crate::pose::{pose_error_norms, Pose};
    use crate::tests::test_utils::{assert_steps_bounded, at, min_distance, patch, planner as new_planner};
    use crate::tool_model::ToolMounting;
    use crate::utils::assert_pose_eq;

    #[test]
    fn test_start_equals_goal() {
        let mut planner = new_planner(PlannerConfig::default());
        let pose = at(0.1, -0.2, 0.3);
        let plan = planner.generate_waypoints(&pose, &pose, Strategy::Nlp).unwrap();
        assert_eq!(plan.diagnostics.iterations, 1);
        assert_eq!(plan.diagnostics.termination, Termination::Converged);
        assert_eq!(plan.diagnostics.raw_waypoints, 1);
        assert_eq!(plan.waypoints.len(), 1);
        for waypoint in plan.waypoints.iter() {
            let (position_error, orientation_error) = pose_error_norms(waypoint, &pose);
            assert_eq!(position_error, 0.0);
            assert_eq!(orientation_error, 0.0);
        }
    }

    #[test]
    fn test_reused_planner_needs_reset_for_cold_start() {
        let mut planner = new_planner(PlannerConfig::default());
        planner
            .generate_waypoints(&at(0.0, 0.0, 0.0), &at(0.3, 0.0, 0.0), Strategy::Nlp)
            .unwrap();

        planner.reset_action();
        assert!(planner.action().iter().all(|u| *u == 0.0));
        let pose = at(0.1, -0.2, 0.3);
        let plan = planner.generate_waypoints(&pose, &pose, Strategy::Nlp).unwrap();
        assert_eq!(plan.diagnostics.iterations, 1);
        assert_eq!(plan.waypoints, vec![pose]);
    }

    #[test]
    fn test_straight_translation() {
        let mut planner = new_planner(PlannerConfig::default());
        let init = at(0.0, 0.0, 0.0);
        let goal = at(0.3, 0.0, 0.0);
        let plan = planner.generate_waypoints(&init, &goal, Strategy::Nlp).unwrap();
        let waypoints = &plan.waypoints;
        println!("{:?}", plan.diagnostics);

        // Steps are bounded by 0.1, so at least three cycles are needed. The last
        // recorded pose is replaced by the goal, leaving one waypoint per cycle
        assert!(plan.diagnostics.iterations >= 3, "Only {} iterations", plan.diagnostics.iterations);
        assert_eq!(plan.diagnostics.raw_waypoints, plan.diagnostics.iterations);
        assert!(waypoints.len() >= 3, "Only {} waypoints", waypoints.len());
        assert_eq!(waypoints[0], init);
        assert_eq!(*waypoints.last().unwrap(), goal);
        assert!(waypoints[1].translation.x > 0.05, "First step {:?}", waypoints[1].translation);
        assert_steps_bounded(waypoints, 0.1 + 1e-2 + 1e-9);
        assert!(plan.diagnostics.raw_waypoints >= plan.diagnostics.fused_waypoints);
        assert_eq!(plan.diagnostics.fused_waypoints, waypoints.len());
    }

    #[test]
    fn test_budget_exhausted_still_ends_at_goal() {
        let init = at(0.0, 0.0, 0.0);
        let goal = at(1.0, 0.5, 0.0);

        // The pose predicted in the second cycle is never recorded, the first one is
        // overwritten by the goal
        let mut short = new_planner(PlannerConfig { max_iterations: 2, ..Default::default() });
        let plan = short.generate_waypoints(&init, &goal, Strategy::Nlp).unwrap();
        assert_eq!(plan.diagnostics.termination, Termination::BudgetExhausted);
        assert_eq!(plan.diagnostics.iterations, 2);
        assert_eq!(plan.diagnostics.raw_waypoints, 2);
        assert_eq!(plan.waypoints, vec![init, goal]);

        let mut planner = new_planner(PlannerConfig { max_iterations: 3, ..Default::default() });
        let plan = planner.generate_waypoints(&init, &goal, Strategy::Nlp).unwrap();
        assert_eq!(plan.diagnostics.termination, Termination::BudgetExhausted);
        assert_eq!(plan.diagnostics.iterations, 3);
        assert_eq!(plan.diagnostics.raw_waypoints, 3);
        assert_eq!(plan.waypoints.len(), 3);
        assert_eq!(plan.waypoints[0], init);
        assert_eq!(plan.waypoints[2], goal);
        // The only interior waypoint is one bounded step from the start
        let first = plan.waypoints[1].translation.vector;
        assert!(first.x > 0.0 && first.x <= 0.1 + 1e-12);
        assert!(first.y.abs() <= 0.1 + 1e-12);
    }

    #[test]
    fn test_obstacle_keeps_path_away() {
        let obstacle = Point3::new(0.15, 0.0, 0.0);
        let init = at(0.0, 0.0, 0.0);
        let goal = at(0.3, 0.0, 0.0);

        // The straight line passes through the obstacle, its 0.1 m waypoints come
        // within 0.05 of it
        let straight = [init, at(0.1, 0.0, 0.0), at(0.2, 0.0, 0.0), goal];
        let straight_clearance = min_distance(&straight, &obstacle);
        assert!((straight_clearance - 0.05).abs() < 1e-12);

        let mut planner = new_planner(PlannerConfig {
            collision_margin: 0.1,
            use_point_collision: true,
            use_mesh_collision: false,
            ..Default::default()
        });
        planner.set_obstacle_points(vec![obstacle]);
        let plan = planner.generate_waypoints(&init, &goal, Strategy::Nlp).unwrap();
        // A single point and ratio 0.5 require no visible points
        assert_eq!(planner.min_visible_points(), 0);

        let clearance = min_distance(&plan.waypoints, &obstacle);
        assert!(
            clearance > straight_clearance,
            "Clearance with obstacle {:.4} not above straight line {:.4}",
            clearance,
            straight_clearance
        );
        assert_eq!(plan.waypoints[0], init);
        assert_eq!(*plan.waypoints.last().unwrap(), goal);
    }

    #[test]
    fn test_average_fusion_shortens_plan() {
        let config = PlannerConfig {
            fusion_policy: FusionPolicy::Average,
            fusion_position_tolerance: 0.25,
            // Above any rotation error, only the position decides
            fusion_orientation_tolerance: 4.0,
            ..Default::default()
        };
        let mut planner = new_planner(config);
        let init = at(0.0, 0.0, 0.0);
        let goal = at(0.5, 0.0, 0.0);
        let plan = planner.generate_waypoints(&init, &goal, Strategy::Nlp).unwrap();
        assert!(plan.diagnostics.fused_waypoints < plan.diagnostics.raw_waypoints);
        assert_eq!(plan.waypoints[0], init);
        assert_eq!(*plan.waypoints.last().unwrap(), goal);
    }

    #[test]
    fn test_visibility_diagnostics() {
        let mut planner = new_planner(PlannerConfig::default());
        let init = at(0.0, 0.0, 0.0);
        let goal = at(0.1, 0.0, 0.0);
        // Surface above the goal, inside the 0.5 m camera range
        planner.set_obstacle_points(patch(Point3::new(0.1, 0.0, 0.3), 0.05, 5));
        let plan = planner.generate_waypoints(&init, &goal, Strategy::Nlp).unwrap();
        assert_eq!(planner.min_visible_points(), 12);
        assert!(
            plan.diagnostics.average_visible_points > 0.0,
            "Diagnostics {:?}",
            plan.diagnostics
        );
        assert_pose_eq(plan.waypoints.last().unwrap(), &goal, 1e-12, 1e-12);

        let mut blind = new_planner(PlannerConfig::default());
        let plan = blind.generate_waypoints(&init, &goal, Strategy::Nlp).unwrap();
        assert_eq!(plan.diagnostics.average_visible_points, 0.0);
    }

    #[test]
    fn test_with_tool_model() {
        let mut planner = new_planner(PlannerConfig::default());
        let mut tool = Vec::new();
        for i in 0..10 {
            tool.push(Point3::new(0.0, 0.0, i as f64 * 0.01));
        }
        planner.update_end_effector(&tool, &ToolMounting::default()).unwrap();
        let tool_points = planner.tool_model().points.clone();
        let tool_clearance = |waypoints: &[Pose], obstacle: &Point3<f64>| {
            waypoints
                .iter()
                .flat_map(|w| tool_points.iter().map(move |p| (w * p - obstacle).norm()))
                .fold(f64::INFINITY, f64::min)
        };

        // Just above the straight line, within the collision margin of the tool there
        let obstacle = Point3::new(0.0, 0.15, 0.07);
        let init = at(0.0, 0.0, 0.0);
        let goal = at(0.0, 0.3, 0.0);
        let straight_clearance = tool_clearance(&[at(0.0, 0.15, 0.0)], &obstacle);
        assert!(straight_clearance < planner.config.collision_margin);

        planner.set_obstacle_points(vec![obstacle]);
        let plan = planner.generate_waypoints(&init, &goal, Strategy::Nlp).unwrap();
        assert_eq!(*plan.waypoints.last().unwrap(), goal);
        assert!(plan.diagnostics.iterations >= 3);
        assert!(plan.waypoints.len() >= 3);
        let clearance = tool_clearance(&plan.waypoints, &obstacle);
        assert!(
            clearance > straight_clearance,
            "Tool clearance {:.4} not above straight line {:.4}",
            clearance,
            straight_clearance
        );
    }
}
