use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use hvac_sched::config::MAX_TICKS;

pub const DEFAULT_PRESET: &str = "cool_test";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug)]
pub struct CliOptions {
    pub scenario: Option<PathBuf>,
    pub preset: Option<String>,
    pub seed: Option<u64>,
    pub ticks: Option<u64>,
    pub telemetry_out: Option<PathBuf>,
    pub ledger_out: Option<PathBuf>,
    pub serve: bool,
    pub port: u16,
}

pub fn parse_args() -> Result<CliOptions, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

fn parse_args_from(args: Vec<String>) -> Result<CliOptions, String> {
    if args.len() == 1 && (args[0] == "--help" || args[0] == "-h") {
        print_usage();
        std::process::exit(0);
    }
    parse_options(&args)
}

fn parse_options(args: &[String]) -> Result<CliOptions, String> {
    let mut i = 0usize;
    let mut scenario = None;
    let mut preset = None;
    let mut seed = None;
    let mut ticks = None;
    let mut telemetry_out = None;
    let mut ledger_out = None;
    let mut serve = false;
    let mut port = None;

    while i < args.len() {
        match args[i].as_str() {
            "--scenario" => {
                i += 1;
                let path =
                    args.next_or_err(i, "missing value for --scenario (expected a TOML file path)")?;
                if scenario.replace(PathBuf::from(path)).is_some() {
                    return Err("--scenario provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                if preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--seed" => {
                i += 1;
                let value: u64 = parse_value(args, i, "--seed", "an unsigned integer")?;
                if seed.replace(value).is_some() {
                    return Err("--seed provided more than once".to_string());
                }
            }
            "--ticks" => {
                i += 1;
                let value: u64 = parse_value(args, i, "--ticks", "a positive integer")?;
                if value == 0 {
                    return Err("--ticks must be greater than zero".to_string());
                }
                if value > MAX_TICKS {
                    return Err(format!("--ticks must be at most {MAX_TICKS}"));
                }
                if ticks.replace(value).is_some() {
                    return Err("--ticks provided more than once".to_string());
                }
            }
            "--telemetry-out" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    "missing value for --telemetry-out (expected a file path)",
                )?;
                if telemetry_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--telemetry-out provided more than once".to_string());
                }
            }
            "--ledger-out" => {
                i += 1;
                let path =
                    args.next_or_err(i, "missing value for --ledger-out (expected a file path)")?;
                if ledger_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--ledger-out provided more than once".to_string());
                }
            }
            "--serve" => {
                if serve {
                    return Err("--serve provided more than once".to_string());
                }
                serve = true;
            }
            "--port" => {
                i += 1;
                let value: u16 = parse_value(args, i, "--port", "a port number")?;
                if port.replace(value).is_some() {
                    return Err("--port provided more than once".to_string());
                }
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if scenario.is_some() && preset.is_some() {
        return Err(
            "arguments `--scenario` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    if port.is_some() && !serve {
        return Err("--port requires --serve".to_string());
    }

    if scenario.is_none() && preset.is_none() {
        preset = Some(DEFAULT_PRESET.to_string());
    }

    Ok(CliOptions {
        scenario,
        preset,
        seed,
        ticks,
        telemetry_out,
        ledger_out,
        serve,
        port: port.unwrap_or(DEFAULT_PORT),
    })
}

fn parse_value<T: FromStr>(args: &[String], index: usize, flag: &str, expected: &str) -> Result<T, String> {
    let raw = args.next_or_err(index, &format!("missing value for {flag} (expected {expected})"))?;
    raw.parse()
        .map_err(|_| format!("invalid value for {flag}: `{raw}` (expected {expected})"))
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  hvac-sched [--scenario <path> | --preset <name>] [--seed <u64>] [--ticks <n>] \
         [--telemetry-out <path>] [--ledger-out <path>] [--serve [--port <u16>]]"
    );
    eprintln!("Presets: cool_test, heat_test, contention, random");
}

#[cfg(test)]
mod tests {
    use super::parse_args_from;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn supports_scenario_cli() {
        let opts = parse_args_from(args(&["--scenario", "scenarios/cool_test.toml"]))
            .expect("parse should succeed");
        assert_eq!(
            opts.scenario.as_deref().and_then(|p| p.to_str()),
            Some("scenarios/cool_test.toml")
        );
        assert!(opts.preset.is_none());
    }

    #[test]
    fn supports_preset_cli() {
        let opts = parse_args_from(args(&["--preset", "heat_test"])).expect("parse should succeed");
        assert_eq!(opts.preset.as_deref(), Some("heat_test"));
        assert!(opts.scenario.is_none());
    }

    #[test]
    fn defaults_to_cool_preset() {
        let opts = parse_args_from(Vec::new()).expect("parse should succeed");
        assert_eq!(opts.preset.as_deref(), Some("cool_test"));
        assert!(!opts.serve);
        assert_eq!(opts.port, 3000);
    }

    #[test]
    fn parses_numeric_overrides() {
        let opts = parse_args_from(args(&["--seed", "7", "--ticks", "50"])).expect("parse");
        assert_eq!(opts.seed, Some(7));
        assert_eq!(opts.ticks, Some(50));
    }

    #[test]
    fn rejects_conflicting_sources() {
        let err = parse_args_from(args(&["--preset", "cool_test", "--scenario", "x.toml"]))
            .expect_err("should fail");
        assert!(err.contains("mutually exclusive"));
    }

    #[test]
    fn rejects_duplicate_and_bad_values() {
        assert!(parse_args_from(args(&["--seed", "1", "--seed", "2"])).is_err());
        assert!(parse_args_from(args(&["--ticks", "zero"])).is_err());
        assert!(parse_args_from(args(&["--ticks", "0"])).is_err());
        assert!(parse_args_from(args(&["--ticks", "18446744073709551615"])).is_err());
        assert!(parse_args_from(args(&["--bogus"])).is_err());
    }

    #[test]
    fn port_needs_serve() {
        assert!(parse_args_from(args(&["--port", "8080"])).is_err());
        let opts = parse_args_from(args(&["--serve", "--port", "8080"])).expect("parse");
        assert!(opts.serve);
        assert_eq!(opts.port, 8080);
    }
}
