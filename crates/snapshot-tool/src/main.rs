//! CLI entry point for the `coresnap` snapshot tool.

use std::env;
use std::ffi::OsString;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use env_logger::Env;
use log::{debug, info};
use snapshot_core::{
    ControllerConfig, Delivery, SimulatedCore, SnapshotController, SnapshotDocument,
};
#[cfg(test)]
use tempfile as _;

const USAGE_TEXT: &str = "\
Usage: coresnap <command> [options]

Commands:
  check  <snapshot> [--config <file>]                Validate a snapshot and print a summary
  replay <snapshot> [-o <output>] [--config <file>]  Import into a simulated core and export again
  blank  -o <output> [--config <file>]               Write the snapshot of a freshly reset core

Options:
  -o, --output <file>  Output file path (replay default: input stem + .replay.json)
  -c, --config <file>  Controller configuration in JSON (default: hardware build)
  -h, --help           Show this help message

Environment:
  CORESNAP_LOG         Log filter (default: info)

Examples:
  coresnap check state.json
  coresnap replay state.json -o replayed.json --config small.json
  coresnap blank -o template.json
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Check(CheckArgs),
    Replay(ReplayArgs),
    Blank(BlankArgs),
}

#[derive(Debug, PartialEq, Eq)]
struct CheckArgs {
    input: PathBuf,
    config: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
struct ReplayArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
struct BlankArgs {
    output: PathBuf,
    config: Option<PathBuf>,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

/// Options shared by every command.
#[derive(Debug, Default)]
struct RawArgs {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();
    let raw = parse_options(args)?;

    let command = match command_str.as_str() {
        "check" => {
            if raw.output.is_some() {
                return Err("check does not write output".to_string());
            }
            Command::Check(CheckArgs {
                input: raw.input.ok_or_else(|| "missing snapshot path".to_string())?,
                config: raw.config,
            })
        }
        "replay" => Command::Replay(ReplayArgs {
            input: raw.input.ok_or_else(|| "missing snapshot path".to_string())?,
            output: raw.output,
            config: raw.config,
        }),
        "blank" => {
            if raw.input.is_some() {
                return Err("blank takes no snapshot path".to_string());
            }
            Command::Blank(BlankArgs {
                output: raw.output.ok_or_else(|| "missing value for -o".to_string())?,
                config: raw.config,
            })
        }
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(ParseResult::Command(command))
}

#[allow(clippy::while_let_on_iterator)]
fn parse_options(mut args: impl Iterator<Item = OsString>) -> Result<RawArgs, String> {
    let mut raw = RawArgs::default();

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "-o" || arg == "--output" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for -o".to_string())?;
            raw.output = Some(PathBuf::from(value));
            continue;
        }

        if arg == "-c" || arg == "--config" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --config".to_string())?;
            raw.config = Some(PathBuf::from(value));
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if raw.input.is_some() {
            return Err("multiple snapshot paths provided".to_string());
        }
        raw.input = Some(PathBuf::from(arg));
    }

    Ok(raw)
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("snapshot");

    let parent = input.parent().unwrap_or_else(|| Path::new(""));

    parent.join(format!("{stem}.replay.json"))
}

fn load_config(path: Option<&Path>) -> Result<ControllerConfig, i32> {
    let Some(path) = path else {
        return Ok(ControllerConfig::default());
    };

    let file = File::open(path).map_err(|e| {
        eprintln!("error: failed to open config {}: {e}", path.display());
        1
    })?;
    let config: ControllerConfig = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        eprintln!("error: invalid config {}: {e}", path.display());
        1
    })?;
    config.parameters.validate().map_err(|e| {
        eprintln!("error: invalid config {}: {e}", path.display());
        1
    })?;

    debug!("configuration: {config:?}");
    Ok(config)
}

fn load_document(path: &Path) -> Result<SnapshotDocument, i32> {
    SnapshotDocument::load(path).map_err(|e| {
        eprintln!("{}: error: {e}", path.display());
        1
    })
}

fn simulated_controller(
    config: ControllerConfig,
) -> Result<SnapshotController<SimulatedCore>, i32> {
    SnapshotController::connect(config, |sink| SimulatedCore::new(sink, Delivery::Worker))
        .map_err(|e| {
            eprintln!("error: invalid config: {e}");
            1
        })
}

fn run_check(args: &CheckArgs) -> Result<(), i32> {
    let config = load_config(args.config.as_deref())?;
    let document = load_document(&args.input)?;

    if let Err(e) = document.validate(&config.parameters) {
        eprintln!("{}: error: {e}", args.input.display());
        return Err(1);
    }

    println!("{}", document.summary());
    println!("{}: ok", args.input.display());
    Ok(())
}

fn differing_sections(left: &SnapshotDocument, right: &SnapshotDocument) -> Vec<&'static str> {
    [
        ("PC", left.pc == right.pc),
        ("RegisterFile", left.register_file == right.register_file),
        ("MainMem", left.main_mem == right.main_mem),
        ("L1i", left.l1i == right.l1i),
        ("L1d", left.l1d == right.l1d),
        ("L2", left.l2 == right.l2),
    ]
    .into_iter()
    .filter_map(|(section, same)| (!same).then_some(section))
    .collect()
}

fn run_replay(args: ReplayArgs) -> Result<(), i32> {
    let config = load_config(args.config.as_deref())?;
    let document = load_document(&args.input)?;
    let mut controller = simulated_controller(config)?;

    info!("replaying {}", args.input.display());
    let exported = controller
        .import_snapshot(&document)
        .and_then(|()| controller.export_snapshot())
        .map_err(|e| {
            eprintln!("{}: error: {e}", args.input.display());
            1
        })?;

    let output_path = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input));

    if let Err(e) = exported.save(&output_path) {
        eprintln!("error: failed to write output: {e}");
        return Err(1);
    }

    let differing = differing_sections(&document, &exported);
    if differing.is_empty() {
        println!(
            "Replayed {} -> {} (identical)",
            args.input.display(),
            output_path.display()
        );
        Ok(())
    } else {
        println!(
            "Replayed {} -> {} (differs in {})",
            args.input.display(),
            output_path.display(),
            differing.join(", ")
        );
        Err(1)
    }
}

fn run_blank(args: &BlankArgs) -> Result<(), i32> {
    let config = load_config(args.config.as_deref())?;
    let mut controller = simulated_controller(config)?;

    let document = controller.export_snapshot().map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;

    if let Err(e) = document.save(&args.output) {
        eprintln!("error: failed to write output: {e}");
        return Err(1);
    }

    println!("Wrote blank snapshot -> {}", args.output.display());
    Ok(())
}

fn main() {
    let env = Env::default()
        .filter_or("CORESNAP_LOG", "info")
        .write_style("CORESNAP_LOG_STYLE");
    env_logger::init_from_env(env);

    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(command)) => {
            let result = match command {
                Command::Check(args) => run_check(&args),
                Command::Replay(args) => run_replay(args),
                Command::Blank(args) => run_blank(&args),
            };
            match result {
                Ok(()) => 0,
                Err(code) => code,
            }
        }
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::PathBuf;

    fn args(items: &[&str]) -> impl Iterator<Item = OsString> {
        items
            .iter()
            .map(OsString::from)
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn command(items: &[&str]) -> Command {
        match parse_args(args(items)).expect("valid args should parse") {
            ParseResult::Command(command) => command,
            ParseResult::Help => panic!("expected a command"),
        }
    }

    #[test]
    fn parses_replay_command() {
        assert_eq!(
            command(&["replay", "state.json", "-o", "out.json", "--config", "small.json"]),
            Command::Replay(ReplayArgs {
                input: PathBuf::from("state.json"),
                output: Some(PathBuf::from("out.json")),
                config: Some(PathBuf::from("small.json")),
            })
        );
    }

    #[test]
    fn parses_check_command() {
        assert_eq!(
            command(&["check", "state.json"]),
            Command::Check(CheckArgs {
                input: PathBuf::from("state.json"),
                config: None,
            })
        );
    }

    #[test]
    fn parses_blank_command_with_short_flags() {
        assert_eq!(
            command(&["blank", "-c", "small.json", "-o", "blank.json"]),
            Command::Blank(BlankArgs {
                output: PathBuf::from("blank.json"),
                config: Some(PathBuf::from("small.json")),
            })
        );
    }

    #[test]
    fn parses_help_flag() {
        let result = parse_args(args(&["-h"])).expect("help should parse without error");
        assert!(matches!(result, ParseResult::Help));
    }

    #[test]
    fn command_help_returns_usage() {
        let error = parse_args(args(&["replay", "--help"])).expect_err("usage is an error path");
        assert!(error.starts_with("Usage:"));
    }

    #[test]
    fn rejects_unknown_command() {
        let error = parse_args(args(&["save"])).expect_err("unknown command should fail parse");
        assert!(error.contains("unknown command"));
    }

    #[test]
    fn rejects_missing_paths() {
        let error = parse_args(args(&["check"])).expect_err("missing input should fail");
        assert!(error.contains("missing snapshot path"));

        let error = parse_args(args(&["blank"])).expect_err("missing output should fail");
        assert!(error.contains("missing value for -o"));

        let error = parse_args(args(&["replay", "a.json", "--config"]))
            .expect_err("dangling option should fail");
        assert!(error.contains("missing value for --config"));
    }

    #[test]
    fn rejects_misplaced_arguments() {
        let error = parse_args(args(&["check", "a.json", "-o", "b.json"]))
            .expect_err("check has no output");
        assert!(error.contains("does not write output"));

        let error = parse_args(args(&["replay", "a.json", "b.json"]))
            .expect_err("two inputs should fail");
        assert!(error.contains("multiple snapshot paths"));

        let error =
            parse_args(args(&["check", "a.json", "--verbose"])).expect_err("unknown flag");
        assert!(error.contains("unknown option"));
    }

    #[test]
    fn default_output_path_simple() {
        assert_eq!(
            default_output_path(&PathBuf::from("state.json")),
            PathBuf::from("state.replay.json")
        );
    }

    #[test]
    fn default_output_path_with_dir() {
        assert_eq!(
            default_output_path(&PathBuf::from("runs/boot.json")),
            PathBuf::from("runs/boot.replay.json")
        );
    }

    #[test]
    fn default_output_path_no_extension() {
        assert_eq!(
            default_output_path(&PathBuf::from("state")),
            PathBuf::from("state.replay.json")
        );
    }

    #[test]
    fn identical_documents_have_no_differing_sections() {
        let config = ControllerConfig {
            parameters: snapshot_core::CoreParameters {
                rf_size: 2,
                main_mem_size: 1,
                l1i: snapshot_core::CacheGeometry::new(0, 0),
                l1d: snapshot_core::CacheGeometry::new(0, 0),
                l2: snapshot_core::CacheGeometry::new(0, 0),
            },
            ..ControllerConfig::default()
        };
        let document = simulated_controller(config)
            .expect("valid parameters")
            .export_snapshot()
            .expect("export succeeds");
        assert!(differing_sections(&document, &document).is_empty());

        let mut changed = document.clone();
        changed.pc = 4;
        changed.main_mem[0][7] = 1;
        assert_eq!(differing_sections(&document, &changed), vec!["PC", "MainMem"]);
    }
}
