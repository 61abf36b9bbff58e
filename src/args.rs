//! Command-line surface. A single optional positional argument plays two
//! roles depending on its shape, mirroring the original tool's `argv[1]`
//! dispatch: an all-digit string overrides the configured `TestCase`, any
//! other string overrides the configuration file path.

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Multi-tenant object-storage benchmark load generator")]
pub struct Args {
    /// Either a numeric TestCase code (overrides the config file's
    /// TestCase) or a path to the configuration file (defaults to
    /// `config.dat`)
    #[clap(value_name = "TESTCASE_OR_CONFIG_PATH")]
    pub positional: Option<String>,

    /// Output details about requests and responses; specify multiple
    /// times for more detail
    #[clap(
        short = 'v',
        long,
        conflicts_with = "quiet",
        action = clap::ArgAction::Count,
    )]
    pub verbose: u8,

    /// Keep quiet and only log errors
    #[clap(short, long, conflicts_with = "verbose", default_value_t = false)]
    pub quiet: bool,
}

impl Args {
    /// The config file path to load, honoring a non-numeric positional
    /// argument.
    pub fn config_path(&self) -> &str {
        match &self.positional {
            Some(s) if !is_all_digits(s) => s.as_str(),
            _ => "config.dat",
        }
    }

    /// A TestCase override, when the positional argument is all digits.
    pub fn test_case_override(&self) -> Option<i32> {
        match &self.positional {
            Some(s) if is_all_digits(s) => s.parse().ok(),
            _ => None,
        }
    }
}

fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_positional_overrides_test_case() {
        let args = Args::parse_from(["obs-bench", "202"]);
        assert_eq!(args.test_case_override(), Some(202));
        assert_eq!(args.config_path(), "config.dat");
    }

    #[test]
    fn non_numeric_positional_overrides_config_path() {
        let args = Args::parse_from(["obs-bench", "custom.dat"]);
        assert_eq!(args.test_case_override(), None);
        assert_eq!(args.config_path(), "custom.dat");
    }

    #[test]
    fn no_positional_uses_defaults() {
        let args = Args::parse_from(["obs-bench"]);
        assert_eq!(args.test_case_override(), None);
        assert_eq!(args.config_path(), "config.dat");
    }

    #[test]
    fn verbose_and_quiet_are_mutually_exclusive() {
        let result = Args::try_parse_from(["obs-bench", "-v", "-q"]);
        assert!(result.is_err());
    }

    #[test]
    fn verbose_counts_repetitions() {
        let args = Args::parse_from(["obs-bench", "-vvv"]);
        assert_eq!(args.verbose, 3);
    }
}
