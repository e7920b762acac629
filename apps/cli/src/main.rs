use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Result;
use clap::{ArgGroup, Parser, ValueEnum};
use clipsage_core::{
    AgentConfig, AnalysisQuery, AnalysisRequest, Analyzer, Backoff, ClipsageError, GeminiAgent, GeminiClient,
    InputSelection, Pipeline, PollPolicy, ProviderConfig, ReadinessPoller, Stage, StageUpdate,
    UploadedVideo, VideoAcquirer, WebsiteExtractor, YtDlpDownloader, format_duration,
    format_result_readable, format_size, provider::DEFAULT_MODEL, save_result, upload_file_name,
};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Default, ValueEnum)]
enum CliBackoff {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Parser)]
#[command(name = "clipsage")]
#[command(
    about = "Ask a hosted multimodal model about a video, a YouTube link or a website",
    version
)]
#[command(group(ArgGroup::new("input").args(["video", "youtube", "website"])))]
struct Cli {
    /// Local video file (mp4, mov or avi)
    #[arg(long)]
    video: Option<PathBuf>,

    /// YouTube video URL
    #[arg(long)]
    youtube: Option<String>,

    /// Website URL to analyze instead of a video
    #[arg(long)]
    website: Option<String>,

    /// What insights are you seeking from the content?
    #[arg(short, long)]
    query: Option<String>,

    /// Save the result as a text file into this directory
    #[arg(short, long, num_args = 0..=1, default_missing_value = ".")]
    save: Option<PathBuf>,

    /// Gemini model identifier
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Do not let the model use web search
    #[arg(long)]
    no_web_search: bool,

    /// Ask for plain text instead of markdown
    #[arg(long)]
    no_markdown: bool,

    /// Seconds between processing status checks
    #[arg(long, default_value = "1", value_parser = parse_seconds)]
    poll_interval: Duration,

    /// Maximum number of processing status checks
    #[arg(long, default_value_t = 300)]
    poll_attempts: u32,

    /// Delay growth between status checks
    #[arg(long, value_enum, default_value_t = CliBackoff::Fixed)]
    backoff: CliBackoff,

    /// Downloader program used for YouTube links
    #[arg(long, default_value = "yt-dlp")]
    ytdlp: String,

    /// Gemini API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn poll_policy(&self) -> PollPolicy {
        let interval = self.poll_interval;
        let backoff = match self.backoff {
            CliBackoff::Fixed => Backoff::Fixed,
            CliBackoff::Exponential => Backoff::Exponential {
                factor: 2.0,
                max_interval: Duration::from_secs(30).max(interval),
            },
        };
        PollPolicy {
            interval,
            max_attempts: self.poll_attempts,
            backoff,
        }
    }

    fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            model: self.model.clone(),
            web_search: !self.no_web_search,
            markdown: !self.no_markdown,
            ..AgentConfig::default()
        }
    }

    fn youtube_url(&self) -> Option<&str> {
        non_blank(self.youtube.as_deref())
    }

    fn website_url(&self) -> Option<&str> {
        non_blank(self.website.as_deref())
    }

    /// Checks that need no I/O: input, then file type, then the question.
    fn validate(&self) -> clipsage_core::Result<()> {
        if self.video.is_none() && self.youtube_url().is_none() && self.website_url().is_none() {
            return Err(ClipsageError::MissingInput);
        }
        if let Some(path) = &self.video {
            upload_file_name(&path.to_string_lossy())?;
        }
        AnalysisQuery::new(self.query.as_deref().unwrap_or_default())?;
        Ok(())
    }

    async fn selection(&self) -> clipsage_core::Result<InputSelection> {
        if let Some(path) = &self.video {
            return Ok(InputSelection::UploadedVideo(
                UploadedVideo::from_path(path).await?,
            ));
        }
        if let Some(url) = self.youtube_url() {
            return Ok(InputSelection::YouTube(url.to_string()));
        }
        if let Some(url) = self.website_url() {
            return Ok(InputSelection::Website(url.to_string()));
        }
        Ok(InputSelection::None)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_seconds(value: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("`{value}` is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("`{value}` is out of range: {e}"))
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Drives one spinner per pipeline stage.
#[derive(Default)]
struct StageSpinners {
    current: Option<(ProgressBar, Instant)>,
}

impl StageSpinners {
    fn update(&mut self, update: StageUpdate) {
        match update {
            StageUpdate::Started(stage) => {
                self.abandon();
                let spinner = create_spinner(&format!("{}...", stage.label()));
                self.current = Some((spinner, Instant::now()));
            }
            StageUpdate::Finished(stage, detail) => {
                if let Some((spinner, started)) = self.current.take() {
                    spinner.finish_with_message(format!(
                        "{} {}: {} {}",
                        style("✓").green().bold(),
                        finished_label(stage),
                        style(detail).dim(),
                        style(format!("[{}]", format_duration(started.elapsed()))).dim()
                    ));
                }
            }
        }
    }

    fn abandon(&mut self) {
        if let Some((spinner, _)) = self.current.take() {
            spinner.finish_and_clear();
        }
    }
}

fn finished_label(stage: Stage) -> &'static str {
    match stage {
        Stage::AcquiringVideo => "Video ready",
        Stage::ExtractingWebsite => "Website text extracted",
        Stage::UploadingVideo => "Processed",
        Stage::Analyzing => "Analyzed",
    }
}

fn build_pipeline(cli: &Cli) -> Result<Pipeline> {
    let gemini = GeminiClient::new(ProviderConfig {
        api_key: cli.api_key.clone().filter(|key| !key.trim().is_empty()),
        ..ProviderConfig::from_env()
    });
    if !gemini.has_api_key() {
        debug!("no API key configured, remote calls will fail");
    }
    let agent = GeminiAgent::new(gemini.clone(), cli.agent_config());

    Ok(Pipeline::new(
        VideoAcquirer::new(Arc::new(YtDlpDownloader::new(cli.ytdlp.clone()))),
        Arc::new(WebsiteExtractor::new()?),
        Arc::new(gemini),
        ReadinessPoller::new(cli.poll_policy()),
        Analyzer::new(Arc::new(agent)),
    ))
}

fn report_failure(error: &ClipsageError) {
    if error.is_validation() {
        eprintln!("{} {}", style("Warning:").yellow().bold(), error);
    } else {
        eprintln!("{} {}", style("Error:").red().bold(), error);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let pipeline = build_pipeline(&cli)?;

    println!(
        "\n{}  {}\n",
        style("clipsage").cyan().bold(),
        style(format!("Multimodal Analyzer · {}", cli.model)).dim()
    );

    let selection = match cli.validate() {
        Ok(()) => cli.selection().await,
        Err(e) => Err(e),
    };
    let selection = match selection {
        Ok(selection) => selection,
        Err(e) => {
            report_failure(&e);
            std::process::exit(1);
        }
    };

    if let InputSelection::UploadedVideo(upload) = &selection {
        println!(
            "{} Video loaded: {} {}",
            style("✓").green().bold(),
            upload.file_name,
            style(format!("({})", format_size(upload.bytes.len() as u64))).dim()
        );
    }

    println!("{}", style("─".repeat(60)).dim());

    let total_start = Instant::now();
    let mut spinners = StageSpinners::default();
    let request = AnalysisRequest {
        selection,
        query: cli.query.clone().unwrap_or_default(),
    };

    let outcome = pipeline
        .handle(request, &mut |update: StageUpdate| spinners.update(update))
        .await;
    spinners.abandon();

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            report_failure(&e);
            std::process::exit(1);
        }
    };

    println!(
        "\n{} {}\n",
        style("Total time:").dim(),
        style(format_duration(total_start.elapsed())).cyan().bold()
    );
    println!("{}", style("─".repeat(60)).dim());
    println!("{}", format_result_readable(&result));

    if let Some(dir) = &cli.save {
        let path = save_result(&result, dir).await?;
        println!(
            "{} {}",
            style("Saved:").dim(),
            style(path.display()).cyan()
        );
    }

    Ok(())
}
