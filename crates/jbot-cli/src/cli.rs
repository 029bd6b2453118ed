//! Argv parsing (spec §6): `jbot [-DVhv] [-c configFile]`, matching
//! `original_source/jbot.go::getopts`'s exact flag set and exit codes
//! rather than clap's defaults (clap exits 2 on a parse error; spec wants
//! 1, and `-h`/`-V` must print to stdout and exit 0 rather than clap's
//! auto-generated `--help`/`--version` long-flag behavior).

use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/jbot.conf";

const USAGE: &str = "\
Usage: jbot [-DVhv] [-c configFile]
\t-D             enable debugging output
\t-V             print version information and exit
\t-c configFile  read configuration from configFile
\t-h             print this help and exit
\t-v             be verbose
";

#[derive(Parser, Debug)]
#[command(
    name = "jbot",
    disable_help_flag = true,
    disable_version_flag = true,
    disable_help_subcommand = true
)]
struct RawArgs {
    #[arg(short = 'D')]
    debug: bool,
    #[arg(short = 'V')]
    print_version: bool,
    #[arg(short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,
    #[arg(short = 'h')]
    help: bool,
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone)]
pub struct Args {
    pub debug: bool,
    pub verbosity: u8,
    pub config_path: PathBuf,
}

/// What the caller should do before the rest of startup proceeds.
pub enum Outcome {
    Run(Args),
    /// Already handled (usage/version printed); exit with this code.
    Exit(i32),
}

/// Parses `argv` (excluding the program name) per spec §6. Unknown flags
/// print usage to stderr and signal exit 1; `-h` prints to stdout and
/// signals exit 0; `-V` prints the version and signals exit 0.
pub fn parse(argv: &[String]) -> Outcome {
    let mut full = vec!["jbot".to_string()];
    full.extend_from_slice(argv);

    let raw = match RawArgs::try_parse_from(full) {
        Ok(raw) => raw,
        Err(_) => {
            eprint!("{USAGE}");
            return Outcome::Exit(1);
        }
    };

    if raw.help {
        print!("{USAGE}");
        return Outcome::Exit(0);
    }
    if raw.print_version {
        println!("jbot {}", env!("CARGO_PKG_VERSION"));
        return Outcome::Exit(0);
    }

    let verbosity = if raw.debug { 10 } else { raw.verbose };
    Outcome::Run(Args {
        debug: raw.debug,
        verbosity,
        config_path: raw.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_config_path_when_no_c_flag() {
        match parse(&argv(&[])) {
            Outcome::Run(args) => assert_eq!(args.config_path, PathBuf::from(DEFAULT_CONFIG_PATH)),
            Outcome::Exit(_) => panic!("expected Run"),
        }
    }

    #[test]
    fn dash_c_overrides_config_path() {
        match parse(&argv(&["-c", "/tmp/custom.conf"])) {
            Outcome::Run(args) => assert_eq!(args.config_path, PathBuf::from("/tmp/custom.conf")),
            Outcome::Exit(_) => panic!("expected Run"),
        }
    }

    #[test]
    fn dash_d_sets_debug_and_verbosity_ten() {
        match parse(&argv(&["-D"])) {
            Outcome::Run(args) => {
                assert!(args.debug);
                assert_eq!(args.verbosity, 10);
            }
            Outcome::Exit(_) => panic!("expected Run"),
        }
    }

    #[test]
    fn repeated_dash_v_accumulates() {
        match parse(&argv(&["-v", "-v", "-v"])) {
            Outcome::Run(args) => assert_eq!(args.verbosity, 3),
            Outcome::Exit(_) => panic!("expected Run"),
        }
    }

    #[test]
    fn dash_h_exits_zero() {
        match parse(&argv(&["-h"])) {
            Outcome::Exit(0) => {}
            other => panic!("expected Exit(0), got {other:?}"),
        }
    }

    #[test]
    fn dash_capital_v_exits_zero() {
        match parse(&argv(&["-V"])) {
            Outcome::Exit(0) => {}
            other => panic!("expected Exit(0), got {other:?}"),
        }
    }

    #[test]
    fn unknown_flag_exits_one() {
        match parse(&argv(&["-z"])) {
            Outcome::Exit(1) => {}
            other => panic!("expected Exit(1), got {other:?}"),
        }
    }
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Run(a) => write!(f, "Run({a:?})"),
            Outcome::Exit(code) => write!(f, "Exit({code})"),
        }
    }
}
