//! Plays the game in the terminal.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::pin::pin;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use jungle_quest::Scenario;
use jungle_quest::config::Config;
use jungle_quest::core::{Error, Session, TurnOutcome};
use jungle_quest_openai_model::OpenAIProvider;
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

type Input = Lines<BufReader<Stdin>>;

const BAR_CHAR: &str = "▎";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let scenario = match env::args().nth(1) {
        None => Scenario::default(),
        Some(name) => match Scenario::by_name(&name) {
            Some(scenario) => scenario,
            None => {
                let names: Vec<_> =
                    Scenario::all().iter().map(|s| s.name).collect();
                eprintln!(
                    "unknown scenario `{name}`, choose one of: {}",
                    names.join(", ")
                );
                return;
            }
        },
    };

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };

    let mut input = BufReader::new(io::stdin()).lines();

    println!("{}\n", scenario.title.bright_green().bold());

    if config.api_key().is_none() {
        println!("{}", "Step 1: Your OpenAI API key".bold());
        println!("The key is only kept for this session.");
        println!("Using the OpenAI API costs money, monitor your account fees.");
        prompt("Enter your OpenAI API key: ");
        let Some(key) = read_line(&mut input).await else {
            return;
        };
        config = config.with_api_key(key.trim());
        println!();
    }
    let provider_config = match config.provider_config() {
        Ok(provider_config) => provider_config,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };
    debug!("using {provider_config:?}");

    let (delta_tx, mut delta_rx) = mpsc::unbounded_channel::<String>();
    let session = scenario
        .session_builder(OpenAIProvider::new(provider_config))
        .with_timeout(REQUEST_TIMEOUT)
        .on_delta(move |delta| {
            delta_tx.send(delta.to_owned()).ok();
        })
        .build();

    println!(
        "{}🤖 {}\n",
        BAR_CHAR.bright_cyan(),
        scenario.welcome_message.trim().bright_white()
    );

    let mut next_input = scenario.opening_move.map(str::to_owned);
    loop {
        let line = match next_input.take() {
            Some(line) => {
                println!("> {line}");
                line
            }
            None => {
                prompt("> ");
                let Some(line) = read_line(&mut input).await else {
                    break;
                };
                let line = line.trim().to_owned();
                if line.is_empty() {
                    continue;
                }
                line
            }
        };

        match play_turn(&session, line, &mut delta_rx).await {
            Ok(outcome) => {
                if let Some(closing) = outcome.closing() {
                    println!("\n{}", closing.bright_yellow().bold());
                    break;
                }
                println!();
            }
            Err(err) => {
                eprintln!("{}⚠️  {err}\n", BAR_CHAR.bright_red());
                if matches!(err, Error::Ended | Error::SessionClosed) {
                    break;
                }
            }
        }
    }
}

async fn play_turn(
    session: &Session,
    line: String,
    delta_rx: &mut mpsc::UnboundedReceiver<String>,
) -> Result<TurnOutcome, Error> {
    let mut turn = pin!(session.submit_turn(line));
    let mut progress_bar = Some(thinking_spinner());
    let mut streamed = false;

    let result = loop {
        select! {
            result = &mut turn => break result,
            Some(delta) = delta_rx.recv() => {
                // Finish the progress bar before printing anything else.
                if let Some(progress_bar) = progress_bar.take() {
                    progress_bar.finish_and_clear();
                    print!("{}🤖 ", BAR_CHAR.bright_cyan());
                }
                print!("{}", delta.bright_white());
                flush();
                streamed = true;
            }
            _ = sleep(Duration::from_millis(100)) => {
                if let Some(progress_bar) = &progress_bar {
                    progress_bar.inc(1);
                }
            }
        }
    };
    if let Some(progress_bar) = progress_bar.take() {
        progress_bar.finish_and_clear();
    }

    // Deltas sent right before the reply may still be queued.
    while let Ok(delta) = delta_rx.try_recv() {
        print!("{}", delta.bright_white());
        streamed = true;
    }
    if streamed {
        println!();
    } else if let Ok(outcome) = &result {
        println!("{}🤖 {}", BAR_CHAR.bright_cyan(), outcome.reply().bright_white());
    }

    result
}

fn thinking_spinner() -> ProgressBar {
    let style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(style);
    progress_bar.set_message("🌿 The guide is thinking...");
    progress_bar
}

fn prompt(text: &str) {
    print!("{text}");
    flush();
}

#[inline]
fn flush() {
    if let Err(err) = std::io::stdout().flush() {
        warn!("failed to flush stdout: {err}");
    }
}

async fn read_line(input: &mut Input) -> Option<String> {
    match input.next_line().await {
        Ok(line) => line,
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
