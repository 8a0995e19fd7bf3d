use std::sync::OnceLock;

use crate::problem::units::Cost;

static ENGINE_CONFIG: OnceLock<EngineConfig> = OnceLock::new();

/// Process-wide engine constants with documented defaults. The configuration
/// can be installed once, before the first solve, and is immutable afterwards.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Weight applied to each unit of unassigned priority in the objective.
    /// Large enough that dropping any task with priority > 0 never beats
    /// serving it on realistic cost scales.
    pub priority_weight: Cost,

    /// Profile assumed when a vehicle does not name one.
    pub default_profile: String,

    /// Average speed used by the great-circle fallback oracle, in m/s.
    pub fallback_speed_mps: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            priority_weight: 1 << 42,
            default_profile: "car".to_owned(),
            fallback_speed_mps: porter_matrix::great_circle::DEFAULT_SPEED_MPS,
        }
    }
}

impl EngineConfig {
    /// Installs `config` as the process-wide configuration. Returns `false`
    /// when a configuration was already installed.
    pub fn install(config: EngineConfig) -> bool {
        ENGINE_CONFIG.set(config).is_ok()
    }

    /// The installed configuration, or the defaults.
    pub fn global() -> &'static EngineConfig {
        ENGINE_CONFIG.get_or_init(EngineConfig::default)
    }
}
