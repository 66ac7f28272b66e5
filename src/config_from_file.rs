//! Supports reading the planner configuration from a YAML file (optional)

use std::path::Path;
use tracing::warn;
use yaml_rust2::{Yaml, YamlLoader};

use crate::config::PlannerConfig;
use crate::fusion::FusionPolicy;
use crate::planner_error::{PlannerError, PlannerResult};

fn number(key: &str, value: &Yaml) -> PlannerResult<f64> {
    match value {
        Yaml::Integer(i) => Ok(*i as f64),
        Yaml::Real(_) => value
            .as_f64()
            .ok_or_else(|| PlannerError::ParseError(format!("{}: not a number", key))),
        other => Err(PlannerError::ParseError(format!("{}: expected a number, got {:?}", key, other))),
    }
}

fn count(key: &str, value: &Yaml) -> PlannerResult<usize> {
    match value {
        Yaml::Integer(i) if *i >= 0 => Ok(*i as usize),
        other => Err(PlannerError::ParseError(format!(
            "{}: expected a non-negative integer, got {:?}",
            key, other
        ))),
    }
}

fn flag(key: &str, value: &Yaml) -> PlannerResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| PlannerError::ParseError(format!("{}: expected true or false, got {:?}", key, value)))
}

impl PlannerConfig {
    /// Read the planner configuration from YAML file. Any subset of keys can be given,
    /// the rest keeps the defaults:
    /// ```yaml
    /// horizon: 5
    /// w_p: 100.0
    /// w_q: 10
    /// collision_margin: 0.05
    /// use_box_collision: true
    /// mppi_seed: 42
    /// fusion_policy: average
    /// ```
    /// Angles (`dtheta_*`) are in radians, fields of view in degrees.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> PlannerResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Same as [`Self::from_yaml_file`] but from a string.
    pub fn from_yaml_str(contents: &str) -> PlannerResult<Self> {
        let docs = YamlLoader::load_from_str(contents)
            .map_err(|e| PlannerError::ParseError(format!("{}", e)))?;
        let mut config = PlannerConfig::default();
        let Some(doc) = docs.first() else {
            return Ok(config);
        };
        if doc.is_null() {
            return Ok(config);
        }
        let hash = doc
            .as_hash()
            .ok_or_else(|| PlannerError::ParseError("top level must be a mapping".into()))?;

        for (key, value) in hash {
            let Some(key) = key.as_str() else {
                return Err(PlannerError::ParseError(format!("key {:?} is not a string", key)));
            };
            match key {
                "horizon" => config.horizon = count(key, value)?,
                "action_dim" => config.action_dim = count(key, value)?,
                "w_p" => config.w_p = number(key, value)?,
                "w_q" => config.w_q = number(key, value)?,
                "w_p_term" => config.w_p_term = number(key, value)?,
                "w_q_term" => config.w_q_term = number(key, value)?,
                "w_look_at_goal" => config.w_look_at_goal = number(key, value)?,
                "look_at_goal_distance" => config.look_at_goal_distance = number(key, value)?,
                "w_obs" => config.w_obs = number(key, value)?,
                "collision_margin" => config.collision_margin = number(key, value)?,
                "use_mesh_collision" => config.use_mesh_collision = flag(key, value)?,
                "use_point_collision" => config.use_point_collision = flag(key, value)?,
                "use_box_collision" => config.use_box_collision = flag(key, value)?,
                "alpha_visibility" => config.alpha_visibility = number(key, value)?,
                "visibility_fov" => {
                    let fov = number(key, value)?;
                    config.visibility_fov_h = fov;
                    config.visibility_fov_v = fov;
                }
                "visibility_fov_h" => config.visibility_fov_h = number(key, value)?,
                "visibility_fov_v" => config.visibility_fov_v = number(key, value)?,
                "visibility_min_range" => config.visibility_min_range = number(key, value)?,
                "visibility_max_range" => config.visibility_max_range = number(key, value)?,
                "min_visible_ratio" => config.min_visible_ratio = number(key, value)?,
                "dp_min" => config.dp_min = number(key, value)?,
                "dp_max" => config.dp_max = number(key, value)?,
                "dtheta_min" => config.dtheta_min = number(key, value)?,
                "dtheta_max" => config.dtheta_max = number(key, value)?,
                "xtol_rel" => config.xtol_rel = number(key, value)?,
                "max_evaluations" => config.max_evaluations = count(key, value)?,
                "num_samples" => config.num_samples = count(key, value)?,
                "mppi_lambda" => config.mppi_lambda = number(key, value)?,
                "noise_std_pos" => config.noise_std_pos = number(key, value)?,
                "noise_std_ori" => config.noise_std_ori = number(key, value)?,
                "mppi_seed" => {
                    config.mppi_seed = match value {
                        Yaml::Null => None,
                        Yaml::Integer(i) => Some(*i as u64),
                        other => {
                            return Err(PlannerError::ParseError(format!(
                                "mppi_seed: expected an integer or null, got {:?}",
                                other
                            )));
                        }
                    }
                }
                "position_tolerance" => config.position_tolerance = number(key, value)?,
                "orientation_tolerance" => config.orientation_tolerance = number(key, value)?,
                "max_iterations" => config.max_iterations = count(key, value)?,
                "fusion_position_tolerance" => config.fusion_position_tolerance = number(key, value)?,
                "fusion_orientation_tolerance" => config.fusion_orientation_tolerance = number(key, value)?,
                "fusion_policy" => {
                    config.fusion_policy = match value.as_str() {
                        Some("drop") => FusionPolicy::Drop,
                        Some("average") => FusionPolicy::Average,
                        _ => {
                            return Err(PlannerError::ParseError(format!(
                                "fusion_policy: expected drop or average, got {:?}",
                                value
                            )));
                        }
                    }
                }
                _ => warn!("Unknown configuration key '{}' ignored", key),
            }
        }
        config.validate()?;
        Ok(config)
    }
}
