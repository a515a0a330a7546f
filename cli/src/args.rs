//! Command-line arguments.

use clap::Parser;
use flowforge_core::config::OptimizeConfig;
use std::path::PathBuf;

/// Search for an agent workflow that solves a task.
#[derive(Debug, Parser)]
#[command(name = "flowforge", version, about)]
pub struct Cli {
    /// Natural-language description of the task.
    pub task: String,

    /// Seed for synthesis, scheduling, and tie-breaking.
    #[arg(long, env = "FLOWFORGE_SEED", default_value_t = 0)]
    pub seed: u64,

    /// Experiment profile (e.g. `ablation_no_holdout`).
    #[arg(long)]
    pub profile: Option<String>,

    /// Override the number of search rounds.
    #[arg(long)]
    pub rounds: Option<usize>,

    /// Directory to materialize the best workflow into.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Print the result as a single JSON line.
    #[arg(long)]
    pub compact: bool,
}

impl Cli {
    /// Apply command-line overrides on top of a loaded configuration.
    ///
    /// Validation happens when the run starts.
    pub fn apply(&self, config: &mut OptimizeConfig) {
        if let Some(profile) = &self.profile {
            config.profile = Some(profile.clone());
        }
        if let Some(rounds) = self.rounds {
            config.search.rounds = rounds;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_and_flags() {
        let cli = Cli::try_parse_from([
            "flowforge",
            "rank risky accounts",
            "--seed",
            "7",
            "--rounds",
            "2",
            "-o",
            "out",
        ])
        .unwrap();
        assert_eq!(cli.task, "rank risky accounts");
        assert_eq!(cli.seed, 7);
        assert_eq!(cli.output, Some(PathBuf::from("out")));

        let mut config = OptimizeConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.search.rounds, 2);
        assert!(config.profile.is_none());
    }

    #[test]
    fn test_task_is_required() {
        assert!(Cli::try_parse_from(["flowforge"]).is_err());
    }

    #[test]
    fn test_profile_override() {
        let cli =
            Cli::try_parse_from(["flowforge", "t", "--profile", "ablation_single_judge"]).unwrap();
        let mut config = OptimizeConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.profile.as_deref(), Some("ablation_single_judge"));
    }
}
