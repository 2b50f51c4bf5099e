use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use policykit::PolicyType;

#[derive(Parser)]
#[command(name = "polsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Reconcile identity policies against a declared configuration", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Policies file (default: ~/.config/polsync/policies.toml)
    #[arg(short, long, global = true, env = "POLSYNC_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan,

    /// Create, update and delete policies to match the configuration
    Apply(ApplyArgs),

    /// Discover and show the system default policy of a type
    Default {
        /// Policy type, e.g. PASSWORD or ACCESS_POLICY
        policy_type: PolicyType,
    },

    /// Find a policy by type and exact name
    Find {
        /// Policy type, e.g. PASSWORD
        policy_type: PolicyType,
        /// Exact policy name
        name: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ApplyArgs {
    /// Show changes without applying them
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of parallel jobs
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Attempts per policy for transient failures
    #[arg(long, default_value = "3")]
    pub retries: u32,

    /// Stop scheduling work after the first failure
    #[arg(long)]
    pub fail_fast: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from([
            "polsync",
            "-vv",
            "apply",
            "--dry-run",
            "--jobs",
            "2",
            "--fail-fast",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Apply(args) => {
                assert!(args.dry_run);
                assert!(!args.yes);
                assert_eq!(args.jobs, 2);
                assert_eq!(args.retries, 3);
                assert!(args.fail_fast);
            }
            _ => panic!("Expected apply"),
        }
    }

    #[test]
    fn test_parse_policy_type_argument() {
        let cli = Cli::try_parse_from(["polsync", "find", "password", "MFA-Strict"]).unwrap();
        match cli.command {
            Command::Find { policy_type, name } => {
                assert_eq!(policy_type, PolicyType::Password);
                assert_eq!(name, "MFA-Strict");
            }
            _ => panic!("Expected find"),
        }

        assert!(Cli::try_parse_from(["polsync", "default", "NOPE"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli =
            Cli::try_parse_from(["polsync", "plan", "--config", "~/p.toml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("~/p.toml"));
    }
}
