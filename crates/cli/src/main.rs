use anyhow::Context;
use clap::{Parser, Subcommand};
use cloud_speech_core::audio::resolve_audio;
use cloud_speech_core::config::{
    ClientConfig, StdEnv, DEFAULT_TIMEOUT_SECS, ENV_SPEECH_API_KEY, ENV_SPEECH_ENDPOINT,
};
use cloud_speech_core::util::{wait_until_done, RetryConfig};
use cloud_speech_core::{AudioEncoding, JobState, RecognitionConfig, RecognizeJob, Speech};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cloud-speech")]
#[command(about = "Submit and track asynchronous speech recognition jobs")]
struct Args {
    /// API key; falls back to $SPEECH_API_KEY
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Service base URL; falls back to $SPEECH_ENDPOINT
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start recognition of a local file or a gs:// URI
    Recognize {
        input: String,

        #[arg(long, default_value = "raw")]
        encoding: AudioEncoding,

        #[arg(long, default_value_t = 16_000)]
        sample_rate: u32,

        #[arg(long)]
        language: Option<String>,

        #[arg(long)]
        max_alternatives: Option<u32>,

        #[arg(long)]
        profanity_filter: bool,

        /// Hint phrase, may be repeated
        #[arg(long = "phrase")]
        phrases: Vec<String>,

        /// Poll until the job finishes and print the transcript
        #[arg(long)]
        wait: bool,

        #[arg(long, default_value_t = 30)]
        max_polls: u32,
    },
    /// Show the state of a previously submitted job
    Status { id: String },
    /// Print the transcript of a finished job
    Results { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let cfg = ClientConfig::resolve(
        args.api_key,
        args.endpoint,
        args.timeout_secs,
        &StdEnv,
    )
    .with_context(|| format!("check --api-key/${ENV_SPEECH_API_KEY} and --endpoint/${ENV_SPEECH_ENDPOINT}"))?;

    tracing::info!(endpoint = %cfg.endpoint.url(), has_api_key = cfg.api_key.is_some(), "config loaded");

    let speech = Speech::from_config(&cfg)?;

    match args.command {
        Command::Recognize {
            input,
            encoding,
            sample_rate,
            language,
            max_alternatives,
            profanity_filter,
            phrases,
            wait,
            max_polls,
        } => {
            let mut config = RecognitionConfig::new(encoding, sample_rate).with_phrases(phrases);
            if let Some(language) = language {
                config = config.with_language(language);
            }
            if let Some(max) = max_alternatives {
                config = config.with_max_alternatives(max);
            }
            if profanity_filter {
                config = config.with_profanity_filter(true);
            }

            let audio = resolve_audio(&input)
                .await
                .with_context(|| format!("failed to resolve audio input {input}"))?;
            let mut job = speech.recognize_job(audio, config).await?;
            println!("{}", job.id());

            if wait {
                let backoff = RetryConfig {
                    max_delay: Duration::from_secs(30),
                    ..RetryConfig::new(max_polls, Duration::from_secs(1))
                };
                wait_until_done(&mut job, &backoff).await?;
                print_results(&job)?;
            }
        }
        Command::Status { id } => {
            let job = speech.job(&id).await?;
            print_status(&job);
        }
        Command::Results { id } => {
            let job = speech.job(&id).await?;
            print_results(&job)?;
        }
    }

    Ok(())
}

fn print_status(job: &RecognizeJob) {
    let state = match job.state() {
        JobState::Pending => "pending",
        JobState::Succeeded => "succeeded",
        JobState::Failed => "failed",
    };
    match job.metadata() {
        Ok(Some(meta)) => println!("{} {state} {}%", job.id(), meta.progress_percent),
        Ok(None) => println!("{} {state}", job.id()),
        Err(e) => {
            tracing::warn!(error = %e, "could not decode job metadata");
            println!("{} {state}", job.id());
        }
    }
    if let Some(status) = job.error() {
        println!("error {}: {}", status.code, status.message);
    }
}

fn print_results(job: &RecognizeJob) -> anyhow::Result<()> {
    let transcript = job
        .results()
        .with_context(|| format!("no results for job {}", job.id()))?;
    for (segment, result) in transcript.results.iter().enumerate() {
        for alternative in &result.alternatives {
            println!(
                "{segment}\t{:.3}\t{}",
                alternative.confidence, alternative.transcript
            );
        }
    }
    Ok(())
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
