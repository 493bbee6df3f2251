mod script;

mod session;

use clap::{Parser, Subcommand, ValueEnum};
use form_model::{FormConfig, FormSnapshot, ValidationResult, validate};
use script::{StepReport, apply_step, parse_script};
use serde_json::json;
use session::{Session, SessionCommand, SessionPresenter, parse_command};
use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Form model driver",
    long_about = "Loads a form definition, keeps values, validity and visibility consistent, and reports every change"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Print the state of a form right after it has been opened.
    Inspect {
        /// Path to the form config JSON.
        #[arg(long, value_name = "CONFIG")]
        config: PathBuf,
        /// Optional JSON object of previously stored field values.
        #[arg(long, value_name = "PRESETS")]
        presets: Option<PathBuf>,
        /// Also list buttons, labels and layout elements.
        #[arg(long)]
        verbose: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Replay a JSON script of edits and dialog results, printing every notification.
    Run {
        #[arg(long, value_name = "CONFIG")]
        config: PathBuf,
        /// JSON array of steps such as {"set": {"id": "A", "value": "x"}}.
        #[arg(long, value_name = "SCRIPT")]
        script: PathBuf,
        #[arg(long, value_name = "PRESETS")]
        presets: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Edit a form interactively: `id=value`, `:dialog NAME k=v ...`, `:state`, `:quit`.
    Edit {
        #[arg(long, value_name = "CONFIG")]
        config: PathBuf,
        #[arg(long, value_name = "PRESETS")]
        presets: Option<PathBuf>,
        #[arg(long, alias = "debug")]
        verbose: bool,
    },
    /// Check every PLAUSI; fails if a visible field is invalid.
    Validate {
        #[arg(long, value_name = "CONFIG")]
        config: PathBuf,
        #[arg(long, value_name = "PRESETS")]
        presets: Option<PathBuf>,
    },
    /// Write the form state to a file.
    Export {
        #[arg(long, value_name = "CONFIG")]
        config: PathBuf,
        #[arg(long, value_name = "PRESETS")]
        presets: Option<PathBuf>,
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
        /// Encode as CBOR instead of pretty JSON.
        #[arg(long)]
        cbor: bool,
    },
    /// Print the JSON Schema of the form config format.
    Schema,
}

fn main() -> CliResult<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Inspect {
            config,
            presets,
            verbose,
            format,
        } => run_inspect(&config, presets.as_deref(), verbose, format),
        Command::Run {
            config,
            script,
            presets,
            format,
        } => run_script(&config, &script, presets.as_deref(), format),
        Command::Edit {
            config,
            presets,
            verbose,
        } => run_edit(&config, presets.as_deref(), verbose),
        Command::Validate { config, presets } => run_validate(&config, presets.as_deref()),
        Command::Export {
            config,
            presets,
            out,
            cbor,
        } => run_export(&config, presets.as_deref(), &out, cbor),
        Command::Schema => {
            println!(
                "{}",
                serde_json::to_string_pretty(&FormConfig::json_schema())?
            );
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FORM_MODEL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}

fn load_presets(path: Option<&Path>) -> CliResult<HashMap<String, String>> {
    match path {
        Some(path) => {
            let contents = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        }
        None => Ok(HashMap::new()),
    }
}

fn open_session(config_path: &Path, presets: Option<&Path>) -> CliResult<(FormConfig, Session)> {
    let config = FormConfig::from_path(config_path)?;
    let presets = load_presets(presets)?;
    let session = Session::open(&config, &presets);
    Ok((config, session))
}

fn run_inspect(
    config_path: &Path,
    presets: Option<&Path>,
    verbose: bool,
    format: OutputFormat,
) -> CliResult<()> {
    let (config, session) = open_session(config_path, presets)?;
    let snapshot = session.snapshot();
    match format {
        OutputFormat::Text => SessionPresenter::new(verbose).show_state(&config.title, &snapshot),
        OutputFormat::Json => println!("{}", snapshot.to_json_pretty()?),
    }
    Ok(())
}

fn run_script(
    config_path: &Path,
    script_path: &Path,
    presets: Option<&Path>,
    format: OutputFormat,
) -> CliResult<()> {
    let (config, mut session) = open_session(config_path, presets)?;
    let steps = parse_script(&fs::read_to_string(script_path)?)?;
    let presenter = SessionPresenter::new(false);

    let mut reports = Vec::new();
    for (index, step) in steps.into_iter().enumerate() {
        let events = apply_step(&mut session, &step)
            .map_err(|err| format!("step {} failed: {}", index + 1, err))?;
        match format {
            OutputFormat::Text => {
                println!("# step {}", index + 1);
                presenter.show_events(&events);
            }
            OutputFormat::Json => reports.push(StepReport { step, events }),
        }
    }

    let snapshot = session.snapshot();
    match format {
        OutputFormat::Text => presenter.show_state(&config.title, &snapshot),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "steps": reports,
                "state": snapshot,
            }))?
        ),
    }
    Ok(())
}

fn run_edit(config_path: &Path, presets: Option<&Path>, verbose: bool) -> CliResult<()> {
    let (config, mut session) = open_session(config_path, presets)?;
    let presenter = SessionPresenter::new(verbose);
    presenter.show_state(&config.title, &session.snapshot());

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let result = match parse_command(&line) {
            Ok(SessionCommand::Quit) => break,
            Ok(SessionCommand::State) => {
                presenter.show_state(&config.title, &session.snapshot());
                continue;
            }
            Ok(SessionCommand::Set { id, value }) => session.set(&id, &value),
            Ok(SessionCommand::Dialog { name, data }) => session.complete_dialog(&name, &data),
            Err(err) => {
                presenter.show_input_error(&err);
                continue;
            }
        };
        match result {
            Ok(events) => presenter.show_events(&events),
            Err(err) => presenter.show_input_error(&err),
        }
    }
    Ok(())
}

fn run_validate(config_path: &Path, presets: Option<&Path>) -> CliResult<()> {
    let (_, session) = open_session(config_path, presets)?;
    let result = validate(session.model());
    println!(
        "Validation result: {}",
        if result.valid { "valid" } else { "invalid" }
    );
    describe_validation(&result);

    if result.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(result: &ValidationResult) {
    if !result.invalid.is_empty() {
        println!("Invalid fields: {}", result.invalid.join(", "));
    }
    if !result.hidden_invalid.is_empty() {
        println!(
            "Invalid but hidden (ignored): {}",
            result.hidden_invalid.join(", ")
        );
    }
}

fn run_export(
    config_path: &Path,
    presets: Option<&Path>,
    out: &Path,
    cbor: bool,
) -> CliResult<()> {
    let (_, session) = open_session(config_path, presets)?;
    let snapshot: FormSnapshot = session.snapshot();
    if cbor {
        fs::write(out, snapshot.to_cbor()?)?;
    } else {
        fs::write(out, snapshot.to_json_pretty()?)?;
    }
    println!("Wrote {}", out.display());
    Ok(())
}
