use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::style::{Print, PrintStyledContent, StyledContent, Stylize};
use crossterm::{execute, queue};
use std::io::{self, Stdout, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

use livedoc::api::HttpTransport;
use livedoc::config::{Config, ViolationPolicy};
use livedoc::logging::init_tracing;
use livedoc::runtime::{run_session, PatchSink, SessionController, SessionId};
use livedoc::state::audit::{AuditPatch, StepStatus, Verdict};
use livedoc::state::chat::{ChatPatch, ChatReducer, FillerFilter};
use livedoc::state::report::{EvidenceDetails, LogEntry, ReportPatch, ReportReducer};
use livedoc::state::{AuditReducer, Terminal};
use livedoc::types::{DecisionKind, ReportProfile, WorkflowRequest};

const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Parser)]
#[command(name = "livedoc", version, about = "Consume live audit, chat and report streams")]
struct Cli {
    /// Backend base URL, overrides LIVEDOC_BASE_URL.
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Locale tag sent with every request, overrides LIVEDOC_LOCALE.
    #[arg(long, global = true)]
    locale: Option<String>,
    /// Treat protocol violations as errors.
    #[arg(long, global = true)]
    strict: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Audit a declaration read from --input or stdin.
    Audit {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Chat on one session; every stdin line is a new turn.
    Chat {
        /// Show tool announcement chunks instead of filtering them.
        #[arg(long)]
        no_filter: bool,
    },
    /// Generate a report from the context in --input or stdin.
    Report {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Also show the research trail.
        #[arg(long)]
        extended: bool,
        /// After the report, print the full text behind each piece of evidence.
        #[arg(long)]
        expand: bool,
    },
    /// Print the knowledge-base document behind an evidence filename.
    Detail { filename: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(locale) = cli.locale {
        config.locale = locale;
    }
    if cli.strict {
        config.violation_policy = ViolationPolicy::Fail;
    }
    config.validate()?;

    let transport = Arc::new(HttpTransport::new(&config)?);
    let controller = Arc::new(
        SessionController::new(transport.clone()).with_idle_timeout(config.idle_timeout),
    );

    let terminal = match cli.command {
        Command::Audit { input } => {
            let raw = read_input(input).await?;
            let request = WorkflowRequest::audit(&raw, &config.locale)?;
            let session = SessionId::from("audit");
            watch_ctrl_c(controller.clone(), session.clone());
            let mut reducer = AuditReducer::new(config.violation_policy);
            let mut renderer = ConsoleRenderer::new();
            run_session(&controller, &session, &request, &mut reducer, &mut renderer).await
        }
        Command::Chat { no_filter } => {
            let filter = config.filler_filter && !no_filter;
            run_chat(controller.clone(), &config, filter).await?
        }
        Command::Report {
            input,
            extended,
            expand,
        } => {
            let raw = read_input(input).await?;
            let profile = if extended {
                ReportProfile::Extended
            } else {
                ReportProfile::Standard
            };
            let request = WorkflowRequest::report(&raw, &config.locale, profile)?;
            let session = SessionId::from("report");
            watch_ctrl_c(controller.clone(), session.clone());
            let mut reducer = ReportReducer::new(profile, config.violation_policy);
            let mut renderer = ConsoleRenderer::new();
            let terminal =
                run_session(&controller, &session, &request, &mut reducer, &mut renderer).await;
            if expand {
                let details = EvidenceDetails::new(transport.clone());
                for evidence in reducer.document().log.evidence() {
                    match details.get_section_detail(&evidence.filename).await {
                        Ok(text) => renderer.detail(&evidence.filename, &text),
                        Err(error) => tracing::warn!(filename = %evidence.filename, %error, "detail unavailable"),
                    }
                }
            }
            terminal
        }
        Command::Detail { filename } => {
            let details = EvidenceDetails::new(transport.clone());
            let text = details.get_section_detail(&filename).await?;
            println!("{text}");
            Terminal::Success
        }
    };

    match terminal {
        Terminal::Success => Ok(()),
        Terminal::Error(message) => bail!(message),
        Terminal::Interrupted => std::process::exit(EXIT_INTERRUPTED),
    }
}

async fn run_chat(
    controller: Arc<SessionController>,
    config: &Config,
    filter: bool,
) -> Result<Terminal> {
    let session = SessionId::new(config.session_id.clone());
    watch_ctrl_c(controller.clone(), session.clone());
    let mut reducer = ChatReducer::new();
    if filter {
        reducer = reducer.with_filter(FillerFilter::new()?);
    }
    let mut renderer = ConsoleRenderer::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last = Terminal::Success;

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        let request = WorkflowRequest::chat(message, session.as_str(), &config.locale)?;
        renderer.on_patch(reducer.begin_turn(message));
        last = run_session(&controller, &session, &request, &mut reducer, &mut renderer).await;
    }
    Ok(last)
}

async fn read_input(path: Option<PathBuf>) -> Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut input = String::new();
            tokio::io::stdin()
                .read_to_string(&mut input)
                .await
                .context("failed to read stdin")?;
            Ok(input)
        }
    }
}

/// Ctrl+C cancels the session's open stream; the driver then reports it as
/// interrupted.
fn watch_ctrl_c(controller: Arc<SessionController>, session: SessionId) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !controller.cancel_session(&session) {
                std::process::exit(EXIT_INTERRUPTED);
            }
        }
    });
}

struct ConsoleRenderer {
    out: Stdout,
}

impl ConsoleRenderer {
    fn new() -> Self {
        Self { out: io::stdout() }
    }

    fn styled(&mut self, content: StyledContent<String>) {
        if let Err(error) = queue!(self.out, PrintStyledContent(content)) {
            tracing::debug!(%error, "console write failed");
        }
    }

    fn plain(&mut self, text: &str) {
        if let Err(error) = queue!(self.out, Print(text)) {
            tracing::debug!(%error, "console write failed");
        }
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }

    fn detail(&mut self, filename: &str, text: &str) {
        self.styled(format!("\n== {filename} ==\n").cyan().bold());
        self.plain(text);
        self.plain("\n");
        self.flush();
    }

    fn terminal(&mut self, terminal: &Terminal) {
        let line = match terminal {
            Terminal::Success => "\n[done]\n".to_string().green(),
            Terminal::Error(message) => format!("\n[error] {message}\n").red().bold(),
            Terminal::Interrupted => "\n[interrupted]\n".to_string().dark_grey(),
        };
        if let Err(error) = execute!(self.out, PrintStyledContent(line)) {
            tracing::debug!(%error, "console write failed");
        }
    }
}

fn status_marker(status: StepStatus) -> StyledContent<String> {
    match status {
        StepStatus::Pending => "  ○ ".to_string().dark_grey(),
        StepStatus::Thinking => "  … ".to_string().yellow(),
        StepStatus::Pass => "  ✓ ".to_string().green(),
        StepStatus::Risk => "  ✗ ".to_string().red(),
    }
}

impl PatchSink<AuditPatch> for ConsoleRenderer {
    fn on_patch(&mut self, patch: AuditPatch) {
        match patch {
            AuditPatch::Initialized { cards } => {
                for card in cards {
                    self.styled(status_marker(card.status));
                    self.plain(&format!("{}\n", card.title));
                }
            }
            AuditPatch::CardUpdated { card, .. } => {
                self.styled(status_marker(card.status));
                self.plain(&card.title);
                if !card.message.is_empty() {
                    self.styled(format!(" {}", card.message).dark_grey());
                }
                self.plain("\n");
            }
            AuditPatch::Completed { verdict } => {
                let headline = match verdict.verdict {
                    Verdict::Pass => "\nVerdict: pass\n".to_string().green().bold(),
                    Verdict::Risk => "\nVerdict: risk\n".to_string().red().bold(),
                };
                self.styled(headline);
                self.plain(&format!("{}\n", verdict.summary));
            }
        }
        self.flush();
    }

    fn on_terminal(&mut self, terminal: &Terminal) {
        self.terminal(terminal);
    }
}

impl PatchSink<ChatPatch> for ConsoleRenderer {
    fn on_patch(&mut self, patch: ChatPatch) {
        match patch {
            ChatPatch::TurnStarted { user_message, .. } => {
                self.styled(format!("\n> {user_message}\n").bold());
            }
            ChatPatch::TextOpened { .. } => {}
            ChatPatch::TextAppended { delta, .. } => self.plain(&delta),
            ChatPatch::ToolStarted { call, .. } => {
                self.styled(format!("\n[{} …]", call.name).yellow());
                if let Some(overlay) = call.overlay {
                    self.styled(format!(" {}", overlay.title).dark_grey());
                }
                self.plain("\n");
            }
            ChatPatch::ToolFinished { call, .. } => {
                self.styled(format!("[{} ✓]\n", call.name).green());
                if let Some(download) = call.download {
                    self.styled(format!("  download: {} ({})\n", download.filename, download.url).cyan());
                }
            }
        }
        self.flush();
    }

    fn on_terminal(&mut self, terminal: &Terminal) {
        self.terminal(terminal);
    }
}

impl PatchSink<ReportPatch> for ConsoleRenderer {
    fn on_patch(&mut self, patch: ReportPatch) {
        match patch {
            ReportPatch::TocSet { titles } => {
                for (index, title) in titles.iter().enumerate() {
                    self.styled(format!("{:>2}. {title}\n", index + 1).dark_grey());
                }
            }
            ReportPatch::SectionActivated { heading, .. } => {
                self.styled(format!("\n## {heading}\n\n").cyan().bold());
            }
            ReportPatch::SectionAppended { delta, .. } => self.plain(&delta),
            ReportPatch::SectionCompleted { .. } => self.plain("\n"),
            ReportPatch::LogAppended { entry } => {
                let line = match entry {
                    LogEntry::Thought { text } => format!("  [thought] {text}\n"),
                    LogEntry::Search { query } => format!("  [search] {query}\n"),
                    LogEntry::Evidence(evidence) => format!(
                        "  [evidence] {} ({:.0}%)\n",
                        evidence.filename,
                        evidence.score * 100.0
                    ),
                    LogEntry::Note { content } => format!("  [note] {content}\n"),
                    LogEntry::Decision(decision) => format!(
                        "  [decision round {}] {} - {}\n",
                        decision.round,
                        match decision.decision {
                            DecisionKind::Stop => "stop",
                            DecisionKind::Continue => "continue",
                        },
                        decision.reason
                    ),
                    LogEntry::SectionCompleted { index } => {
                        format!("  >> section {index} completed\n")
                    }
                };
                self.styled(line.dark_grey());
            }
        }
        self.flush();
    }

    fn on_terminal(&mut self, terminal: &Terminal) {
        self.terminal(terminal);
    }
}
