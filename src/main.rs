use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use wakeword_handoff::engine::simulated::{
    Microphone, SimulatedRecognizerFactory, SimulatedWakeFactory,
};
use wakeword_handoff::{
    Config, DirAssetSource, HandoffBuilder, HandoffEvent, ModelPaths, RecognitionErrorKind,
};

/// Handoff - wake phrase to dictation coordinator
#[derive(Parser)]
#[command(name = "handoff", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/wakeword-handoff/config.toml)
    #[arg(short, long, env = "HANDOFF_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drive the handoff with simulated engines, one utterance per stdin line
    ///
    /// Lines are spoken into a shared microphone. `:dictate` requests
    /// dictation directly, `:fail` makes the recognizer fail, `:mumble`
    /// gives it nothing intelligible, `:prepare` retries preparation and
    /// `:quit` tears down.
    Simulate {
        /// Directory holding the bundled acoustic model
        #[arg(long)]
        bundled: Option<PathBuf>,
    },
    /// Show the resolved model paths
    Paths,
    /// Print the keyphrase dictionary
    Dict {
        /// Write it to the model dictionary path
        #[arg(long)]
        write: bool,
    },
    /// Remove generated model files (everything when no target is given)
    Clean {
        /// Files to remove
        #[arg(value_enum)]
        targets: Vec<CleanTarget>,
    },
}

/// Generated file that `clean` can remove
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CleanTarget {
    /// Pronunciation dictionary
    Dict,
    /// Engine log file
    Log,
    /// Legacy grammar file
    Grammar,
    /// Raw audio captures
    Raw,
}

const ALL_CLEAN_TARGETS: [CleanTarget; 4] = [
    CleanTarget::Dict,
    CleanTarget::Log,
    CleanTarget::Grammar,
    CleanTarget::Raw,
];

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,wakeword_handoff=info",
        1 => "info,wakeword_handoff=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Simulate { bundled } => simulate(config, bundled).await,
        Command::Paths => {
            print_paths(&config.model_paths());
            Ok(())
        }
        Command::Dict { write } => dict(&config, write),
        Command::Clean { targets } => {
            let targets = if targets.is_empty() {
                ALL_CLEAN_TARGETS.to_vec()
            } else {
                targets
            };
            clean(&config.model_paths(), &targets)
        }
    }
}

async fn simulate(config: Config, bundled: Option<PathBuf>) -> anyhow::Result<()> {
    let mic = Microphone::new();
    let bundled = bundled.unwrap_or_else(|| config.models.bundled_dir.clone());
    let phrase = config.wake.phrase.clone();

    let (handle, mut events) = HandoffBuilder::new(
        config,
        Arc::new(SimulatedWakeFactory::new(mic.clone())),
        Arc::new(SimulatedRecognizerFactory::new(mic.clone())),
    )
    .assets(Arc::new(DirAssetSource::new(bundled)))
    .spawn();

    handle.bind()?;
    println!("say \"{phrase}\" to start dictation, :quit to stop");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                print_event(&event);
            }
            line = lines.next_line(), if input_open => {
                match line?.as_deref().map(str::trim) {
                    None | Some(":quit") => {
                        input_open = false;
                        handle.unbind()?;
                    }
                    Some(":dictate") => handle.request_dictation()?,
                    Some(":prepare") => handle.prepare()?,
                    Some(":fail") => {
                        if !mic.fail(RecognitionErrorKind::Network) {
                            println!("(dictation is not listening)");
                        }
                    }
                    Some(":mumble") => {
                        if !mic.mumble() {
                            println!("(dictation is not listening)");
                        }
                    }
                    Some(":state") => println!("{:?}", handle.snapshot()),
                    Some(text) => {
                        if mic.say(text).is_none() {
                            println!("(nobody is listening)");
                        }
                    }
                }
            }
        }
    }

    let overlaps = mic.overlaps();
    if overlaps > 0 {
        anyhow::bail!("engines listened simultaneously {overlaps} time(s)");
    }
    Ok(())
}

fn print_event(event: &HandoffEvent) {
    match event {
        HandoffEvent::Status(status) => println!("[status] {status}"),
        HandoffEvent::ReadyForSpeech => println!("[dictation] ready"),
        HandoffEvent::BeginningOfSpeech => println!("[dictation] speech started"),
        HandoffEvent::EndOfSpeech => println!("[dictation] speech ended"),
        HandoffEvent::Result(Some(text)) if text.is_empty() => println!("[result] (nothing recognized)"),
        HandoffEvent::Result(Some(text)) => println!("[result] {text}"),
        HandoffEvent::Result(None) => println!("[result] (failed)"),
    }
}

fn print_paths(paths: &ModelPaths) {
    println!("base:           {}", paths.base_dir().display());
    println!("acoustic model: {}", paths.acoustic_model().display());
    println!("dictionary:     {}", paths.dictionary().display());
    println!("grammar:        {}", paths.grammar().display());
    println!("log file:       {}", paths.log_file().display());
    println!("raw log dir:    {}", paths.raw_log_dir().display());
    match paths.verify_readable() {
        Ok(()) => println!("status:         ready"),
        Err(e) => println!("status:         {e}"),
    }
}

fn dict(config: &Config, write: bool) -> anyhow::Result<()> {
    if !write {
        print!("{}", config.keyphrases);
        return Ok(());
    }

    let path = config.model_paths().dictionary().to_path_buf();
    if config.keyphrases.write_to(&path)? {
        println!("wrote {}", path.display());
    } else {
        println!("{} is up to date", path.display());
    }
    Ok(())
}

fn clean(paths: &ModelPaths, targets: &[CleanTarget]) -> anyhow::Result<()> {
    for target in targets {
        match target {
            CleanTarget::Dict => {
                if paths.delete_dictionary()? {
                    println!("removed {}", paths.dictionary().display());
                }
            }
            CleanTarget::Log => {
                if paths.delete_log_file()? {
                    println!("removed {}", paths.log_file().display());
                }
            }
            CleanTarget::Grammar => {
                if paths.delete_grammar()? {
                    println!("removed {}", paths.grammar().display());
                }
            }
            CleanTarget::Raw => {
                let removed = paths.clean_raw_log_dir()?;
                println!("removed {removed} raw capture(s) from {}", paths.raw_log_dir().display());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_targets(args: &[&str]) -> Vec<CleanTarget> {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Clean { targets } => targets,
            _ => panic!("expected clean"),
        }
    }

    #[test]
    fn test_clean_targets_parse() {
        assert_eq!(
            clean_targets(&["handoff", "clean", "dict", "raw"]),
            vec![CleanTarget::Dict, CleanTarget::Raw]
        );
        assert!(clean_targets(&["handoff", "clean"]).is_empty());
        assert!(Cli::try_parse_from(["handoff", "clean", "models"]).is_err());
    }

    #[test]
    fn test_clean_only_selected_targets() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ModelPaths::new(dir.path(), "dev.omni.handoff", "ru", 16_000);
        std::fs::create_dir_all(paths.dictionary().parent().unwrap()).unwrap();
        std::fs::write(paths.dictionary(), "дом\td oo m\n").unwrap();
        std::fs::write(paths.grammar(), "#JSGF V1.0;\n").unwrap();

        clean(&paths, &[CleanTarget::Grammar]).unwrap();
        assert!(paths.dictionary().exists());
        assert!(!paths.grammar().exists());

        clean(&paths, &ALL_CLEAN_TARGETS).unwrap();
        assert!(!paths.dictionary().exists());
    }
}
