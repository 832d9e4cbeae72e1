//! Flags shared by every command that iterates records

use crate::core::runner::RunConfig;
use clap::Args;

/// Run-mode flags, flattened into each iterating command
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct BeltFlags {
    /// Print the query with its bindings substituted and exit
    #[arg(long)]
    pub dump_sql: bool,

    /// Show the SQL executed for each record (implies --step)
    #[arg(long)]
    pub log_sql: bool,

    /// Pause for confirmation after each record
    #[arg(long)]
    pub step: bool,

    /// Show the fields each record changed
    #[arg(long)]
    pub diff: bool,

    /// Show full error chains for collected failures
    #[arg(short, long)]
    pub verbose: bool,
}

impl BeltFlags {
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            step_mode: self.step,
            diff_mode: self.diff,
            sql_log_mode: self.log_sql,
            dump_query_only: self.dump_sql,
            verbose: self.verbose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        flags: BeltFlags,
    }

    #[test]
    fn test_flags_map_to_run_config() {
        let harness = Harness::parse_from(["test", "--log-sql", "--diff"]);
        let config = harness.flags.run_config();
        assert!(config.sql_log_mode);
        assert!(config.diff_mode);
        assert!(!config.step_mode);
        assert!(!config.dump_query_only);
    }

    #[test]
    fn test_defaults_are_off() {
        let harness = Harness::parse_from(["test"]);
        assert_eq!(harness.flags, BeltFlags::default());
        assert_eq!(harness.flags.run_config(), RunConfig::default());
    }
}
