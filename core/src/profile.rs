//! Experiment profiles: named knob sets for baselines and ablations.
//!
//! A profile only switches features off or retunes penalties; it never
//! changes the algorithm. Apply it to a base [`OptimizeConfig`] and validate
//! the result like any other configuration.

use crate::config::OptimizeConfig;
use crate::error::ConfigurationError;
use crate::execution::JudgeKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named experiment arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentProfile {
    /// Everything enabled
    FullSystem,
    /// Fixed dataset, single judge, prompt mutations only, no penalties
    BaselineStaticPromptOnly,
    /// Dynamic dataset, single judge, prompt mutations only
    DynamicPromptOnly,
    /// Dynamic dataset, single judge, prompt and tool mutations
    DynamicPromptTool,
    /// Select on train, stronger uncertainty penalty
    AblationNoHoldout,
    /// One judge instead of the ensemble
    AblationSingleJudge,
    /// No hard-negative cases
    AblationNoHardNegative,
    /// No historical tool gain
    AblationNoToolGain,
    /// No topology mutations
    AblationNoTopologyMutation,
}

impl ExperimentProfile {
    /// All profiles.
    pub const ALL: [Self; 9] = [
        Self::FullSystem,
        Self::BaselineStaticPromptOnly,
        Self::DynamicPromptOnly,
        Self::DynamicPromptTool,
        Self::AblationNoHoldout,
        Self::AblationSingleJudge,
        Self::AblationNoHardNegative,
        Self::AblationNoToolGain,
        Self::AblationNoTopologyMutation,
    ];

    /// Stable snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FullSystem => "full_system",
            Self::BaselineStaticPromptOnly => "baseline_static_prompt_only",
            Self::DynamicPromptOnly => "dynamic_prompt_only",
            Self::DynamicPromptTool => "dynamic_prompt_tool",
            Self::AblationNoHoldout => "ablation_no_holdout",
            Self::AblationSingleJudge => "ablation_single_judge",
            Self::AblationNoHardNegative => "ablation_no_hard_negative",
            Self::AblationNoToolGain => "ablation_no_tool_gain",
            Self::AblationNoTopologyMutation => "ablation_no_topology_mutation",
        }
    }

    /// Apply this profile's knobs on top of `config`.
    pub fn apply(self, config: &mut OptimizeConfig) {
        let search = &mut config.search;
        match self {
            Self::FullSystem => {}
            Self::BaselineStaticPromptOnly
            | Self::DynamicPromptOnly
            | Self::DynamicPromptTool => {
                let dynamic = self != Self::BaselineStaticPromptOnly;
                config.dataset.paraphrase = dynamic;
                config.dataset.hard_negatives = dynamic;
                search.evaluation.judges = vec![JudgeKind::Heuristic];
                search.enable_prompt_mutation = true;
                search.enable_tool_mutation = self == Self::DynamicPromptTool;
                search.enable_topology_mutation = false;
                search.enable_tool_historical_gain = self == Self::DynamicPromptTool;
                search.failure_aware_scheduling = false;
                search.use_holdout = true;
                search.objective.uncertainty = 0.0;
                search.objective.generalization = 0.0;
            }
            Self::AblationNoHoldout => {
                search.use_holdout = false;
                search.objective.uncertainty = 0.12;
                search.objective.generalization = 0.0;
            }
            Self::AblationSingleJudge => {
                search.evaluation.judges = vec![JudgeKind::Heuristic];
            }
            Self::AblationNoHardNegative => {
                config.dataset.hard_negatives = false;
            }
            Self::AblationNoToolGain => {
                search.enable_tool_historical_gain = false;
            }
            Self::AblationNoTopologyMutation => {
                search.enable_topology_mutation = false;
            }
        }
        config.profile = Some(self.as_str().to_string());
    }
}

impl FromStr for ExperimentProfile {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|profile| profile.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownName {
                kind: "experiment profile",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for ExperimentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OptimizeConfig {
    /// Apply the profile named in `self.profile`, if any, and revalidate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownName`] for an unknown profile, or a
    /// validation error for the resulting configuration.
    pub fn resolve_profile(&mut self) -> Result<Option<ExperimentProfile>, ConfigurationError> {
        let Some(name) = self.profile.clone() else {
            return Ok(None);
        };
        let profile: ExperimentProfile = name.parse()?;
        profile.apply(self);
        self.validate()?;
        Ok(Some(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_profile_yields_valid_config() {
        for profile in ExperimentProfile::ALL {
            let mut config = OptimizeConfig::default();
            profile.apply(&mut config);
            assert!(config.validate().is_ok(), "{profile} produced an invalid config");
            assert_eq!(profile.as_str().parse::<ExperimentProfile>().unwrap(), profile);
        }
    }

    #[test]
    fn test_baseline_disables_structure_search() {
        let mut config = OptimizeConfig::default();
        ExperimentProfile::BaselineStaticPromptOnly.apply(&mut config);
        assert!(!config.dataset.hard_negatives);
        assert!(!config.search.enable_tool_mutation);
        assert!(!config.search.enable_topology_mutation);
        assert_eq!(config.search.evaluation.judges, vec![JudgeKind::Heuristic]);
    }

    #[test]
    fn test_resolve_profile_by_name() {
        let mut config = OptimizeConfig {
            profile: Some("ablation_no_holdout".into()),
            ..OptimizeConfig::default()
        };
        let resolved = config.resolve_profile().unwrap();
        assert_eq!(resolved, Some(ExperimentProfile::AblationNoHoldout));
        assert!(!config.search.use_holdout);

        config.profile = Some("nonsense".into());
        assert!(config.resolve_profile().is_err());
    }
}
