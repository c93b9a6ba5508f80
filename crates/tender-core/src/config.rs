//! Core configuration shared by validators, guards and the ACL.

use serde::{Deserialize, Serialize};

use crate::calendar::WorkingDays;

fn default_disabled_brokers() -> Vec<String> {
    vec!["broker05".to_string()]
}

fn default_working_days() -> WorkingDays {
    WorkingDays::bundled()
}

/// Settings the domain layer reads.
///
/// ## Fields
/// - `sandbox_mode`: test deployment; "quick" tenders skip shouldStartAfter rounding
/// - `disabled_brokers`: principals denied creation rights in the root ACL
/// - `working_days`: holiday and worked-weekend overrides
/// - `server_id`: suffix appended to generated tenderIDs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub sandbox_mode: bool,
    #[serde(default = "default_disabled_brokers")]
    pub disabled_brokers: Vec<String>,
    #[serde(default = "default_working_days")]
    pub working_days: WorkingDays,
    pub server_id: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            sandbox_mode: false,
            disabled_brokers: default_disabled_brokers(),
            working_days: default_working_days(),
            server_id: None,
        }
    }
}

impl CoreConfig {
    /// Sandbox configuration with the bundled calendar.
    pub fn sandbox() -> Self {
        CoreConfig {
            sandbox_mode: true,
            ..Self::default()
        }
    }
}
