use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use petricore::Token;
use petriruntime::{NetConfig, PlaceTypeTag, RuntimeController};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "petriflow")]
#[command(about = "Behavior-net workflow runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a net from a configuration file
    Run {
        /// Path to the net configuration JSON
        #[arg(short, long)]
        file: PathBuf,

        /// Entrypoint place to inject into (defaults to the first
        /// entrypoint in the configuration)
        #[arg(short, long)]
        entry: Option<String>,

        /// Token data as a JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Number of tokens to inject
        #[arg(short = 'n', long, default_value_t = 1)]
        tokens: u32,

        /// Run for this many milliseconds before stopping
        #[arg(long, default_value_t = 1000)]
        for_ms: u64,

        /// Tick interval in milliseconds
        #[arg(long, default_value_t = 10)]
        tick_ms: u64,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the net configuration JSON
        file: PathBuf,
    },

    /// List built-in actions
    Actions,

    /// Write an example configuration
    Init {
        /// Output file path
        #[arg(short, long, default_value = "net.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            entry,
            input,
            tokens,
            for_ms,
            tick_ms,
            verbose,
        } => {
            let level = if verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::INFO
            };
            tracing_subscriber::fmt().with_max_level(level).init();

            run_net(file, entry, input, tokens, for_ms, tick_ms)?;
        }

        Commands::Validate { file } => {
            validate_net(file)?;
        }

        Commands::Actions => {
            list_actions();
        }

        Commands::Init { output } => {
            write_example(output)?;
        }
    }

    Ok(())
}

fn run_net(
    file: PathBuf,
    entry: Option<String>,
    input: Option<String>,
    tokens: u32,
    for_ms: u64,
    tick_ms: u64,
) -> Result<()> {
    let config =
        NetConfig::from_path(&file).with_context(|| format!("loading {}", file.display()))?;

    let entry = match entry {
        Some(entry) => entry,
        None => config
            .places
            .iter()
            .find(|p| p.place_type == PlaceTypeTag::Entrypoint)
            .map(|p| p.id.clone())
            .context("configuration has no entrypoint place; use --entry")?,
    };

    let data: serde_json::Value = match input {
        Some(raw) => serde_json::from_str(&raw).context("parsing --input")?,
        None => serde_json::json!({}),
    };

    let mut controller = RuntimeController::new();
    controller.set_tick_interval(Duration::from_millis(tick_ms));
    for (name, invoker) in petriactions::builtins() {
        controller.register_action(name, invoker);
    }
    controller
        .load_config(config.clone())
        .context("loading configuration")?;

    controller.set_on_transition_fired(|transition_id, epoch| {
        tracing::info!(transition = transition_id, epoch, "fired");
    });
    controller.set_on_token_exit(|place_id, token| {
        tracing::info!(place = place_id, data = %token.data(), "token exited");
    });

    controller.start();

    for _ in 0..tokens {
        let mut token = Token::new();
        if let Some(map) = data.as_object() {
            for (key, value) in map {
                token.set_data(key.clone(), value.clone());
            }
        }
        match controller.inject_token(&entry, token) {
            Some(id) => tracing::info!(place = %entry, token = id, "injected"),
            None => tracing::warn!(place = %entry, "injection rejected"),
        }
    }

    std::thread::sleep(Duration::from_millis(for_ms));
    controller.stop();

    let stats = controller.stats();
    println!("epoch:              {}", stats.epoch);
    println!("transitions fired:  {}", stats.transitions_fired);
    println!("tokens processed:   {}", stats.tokens_processed);
    println!("active tokens:      {}", stats.active_tokens);

    for place in &config.places {
        let tokens = controller.get_place_tokens(&place.id);
        if !tokens.is_empty() {
            println!("  {}: {} token(s)", place.id, tokens.len());
        }
        if let Some(exits) = controller.exit_count(&place.id) {
            println!("  {}: {} exited", place.id, exits);
        }
    }

    Ok(())
}

fn validate_net(file: PathBuf) -> Result<()> {
    let config =
        NetConfig::from_path(&file).with_context(|| format!("loading {}", file.display()))?;
    let report = config.validate();

    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    if !report.is_ok() {
        for error in &report.errors {
            println!("error: {error}");
        }
        bail!("{} error(s) in {}", report.errors.len(), file.display());
    }

    println!(
        "{} is valid ({} places, {} transitions)",
        file.display(),
        config.places.len(),
        config.transitions.len()
    );
    Ok(())
}

fn list_actions() {
    println!("Built-in actions:");
    for (name, _) in petriactions::builtins() {
        println!("  {name}");
    }
}

fn write_example(output: PathBuf) -> Result<()> {
    let example = serde_json::json!({
        "actions": [
            {"id": "delay", "required_actors": []}
        ],
        "places": [
            {"id": "entry", "type": "entrypoint"},
            {"id": "work", "type": "action",
             "params": {"action_id": "delay", "retries": 1, "timeout_per_try_s": 10}},
            {"id": "done", "type": "exit_logger"},
            {"id": "dead_letter", "type": "exit_logger"}
        ],
        "transitions": [
            {"from": ["entry"], "to": ["work"]},
            {"from": ["work::success"], "to": ["done"]},
            {"from": ["work::failure"], "to": ["dead_letter"]},
            {"from": ["work::error"], "to": ["dead_letter"]}
        ]
    });

    std::fs::write(&output, serde_json::to_string_pretty(&example)?)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("wrote example net to {}", output.display());
    Ok(())
}
