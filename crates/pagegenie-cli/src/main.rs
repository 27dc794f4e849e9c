//! pagegenie - command-line surface for the pagegenie assistant.
//!
//! Wires settings, the background coordinator, the on-device bridge and the
//! router together, then renders results as text.

mod render;

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pagegenie_client::credentials::credential_from_token;
use pagegenie_client::{
    link, BackendApi, BridgeClient, BridgeClientConfig, BridgeHost, Coordinator,
    CoordinatorHandle, Gateway, GatewayConfig, OllamaPromptModel, RouteRequest, Router,
};
use pagegenie_core::defaults;
use pagegenie_core::{
    Error, Mode, OpsLogEntry, Operation, Persona, SettingsChange, SettingsStore,
};

#[derive(Parser)]
#[command(name = "pagegenie")]
#[command(author, version, about = "Reading and writing assistant: on-device AI first, cloud as fallback")]
#[command(propagate_version = true)]
struct Cli {
    /// Settings file (default: $PAGEGENIE_SETTINGS or ~/.config/pagegenie/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an AI operation on text
    Run {
        /// summarize, explain, rewrite, translate, proofread or comment_code
        operation: Operation,

        /// Input text; `-` or omitted reads stdin
        text: Option<String>,

        /// auto, offline-only or online-only (default: from settings)
        #[arg(short, long)]
        mode: Option<Mode>,

        /// Target language for translate (default: from settings)
        #[arg(short, long)]
        lang: Option<String>,

        /// general, student, researcher or editor
        #[arg(short, long)]
        persona: Option<Persona>,

        /// Ask the backend to cite sources
        #[arg(long)]
        cite: bool,

        /// Page the text came from, recorded in the operation log
        #[arg(long, default_value = "")]
        source: String,
    },

    /// Sign in and store the bearer token
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },

    /// Create an account and sign in
    Signup {
        #[arg(long)]
        full_name: String,

        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },

    /// Forget the stored token
    Logout,

    /// Show the signed-in profile
    Whoami,

    /// Show credential state and settings
    Status,

    /// Read or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Check the backend health endpoint
    Health,

    /// Generate, take and review quizzes
    Quiz {
        #[command(subcommand)]
        command: QuizCommand,
    },

    /// Reading suggestions
    Reading {
        #[command(subcommand)]
        command: ReadingCommand,
    },

    /// Save and list notes
    Note {
        #[command(subcommand)]
        command: NoteCommand,
    },

    /// Compare a claim against your notes
    Compare {
        text: String,

        #[arg(long, default_value = "")]
        url: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print all settings, or one key
    Get { key: Option<String> },

    /// Set one key (backendUrl, mode, targetLang, persona, citeSources,
    /// showToolbarOnSelection, apiToken)
    Set { key: String, value: String },
}

#[derive(Subcommand)]
enum QuizCommand {
    /// Generate a quiz from a page URL, or from --text
    Generate {
        #[arg(default_value = "")]
        url: String,

        #[arg(long)]
        text: Option<String>,

        #[arg(long, default_value = "")]
        title: String,
    },

    /// Print a quiz's questions
    Show { id: String },

    /// Submit answers by option index (-1 for unanswered)
    Submit {
        id: String,

        #[arg(allow_negative_numbers = true, num_args = 1..)]
        answers: Vec<i64>,
    },

    /// Recent quiz attempts
    Recent,
}

#[derive(Subcommand)]
enum ReadingCommand {
    /// Suggest follow-up reading for a page
    Suggest {
        url: String,

        #[arg(long, default_value = "")]
        summary: String,
    },

    /// Recently suggested reading
    Recent,
}

#[derive(Subcommand)]
enum NoteCommand {
    /// Save a note; the backend categorizes it
    Save {
        content: String,

        #[arg(long, default_value = "")]
        source: String,
    },

    /// List saved notes
    List,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = init_logging();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", render::notice(&e));
            ExitCode::FAILURE
        }
    }
}

/// Logging setup.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
///   RUST_LOG    - standard env filter (default: "pagegenie=info,pagegenie_client=warn,pagegenie_core=warn")
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pagegenie=info,pagegenie_client=warn,pagegenie_core=warn".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let path = std::path::Path::new(path);
        let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("pagegenie.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // stdout carries command output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    }
}

/// Shared handles for one command.
struct App {
    settings: Arc<SettingsStore>,
    gateway: Gateway,
    coordinator: CoordinatorHandle,
    api: BackendApi,
}

impl App {
    fn new(settings_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let path = settings_path.unwrap_or_else(SettingsStore::default_path);
        let settings = Arc::new(
            SettingsStore::open(&path)
                .with_context(|| format!("loading settings from {}", path.display()))?
                .with_env_overlay(),
        );
        tokio::spawn(watch_credential(settings.subscribe()));
        let gateway = Gateway::with_config(Arc::clone(&settings), GatewayConfig::from_env())?;
        let (coordinator, _task) = Coordinator::new(gateway.clone()).start();
        let api = BackendApi::new(Arc::new(coordinator.clone()));
        debug!(settings = %path.display(), "App initialized");
        Ok(Self {
            settings,
            gateway,
            coordinator,
            api,
        })
    }

    /// Router over an Ollama-backed bridge host and the coordinator.
    fn router(&self) -> Router {
        let (content, page) = link(defaults::BRIDGE_CAPACITY);
        BridgeHost::new()
            .with_prompt_model(Arc::new(OllamaPromptModel::from_env()))
            .spawn(page);
        let local = BridgeClient::new(content, BridgeClientConfig::from_env());
        Router::new(Arc::new(local), Arc::new(self.api.clone()))
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let app = App::new(cli.settings)?;

    match cli.command {
        Commands::Run {
            operation,
            text,
            mode,
            lang,
            persona,
            cite,
            source,
        } => {
            let text = read_input(text)?;
            let mut request = RouteRequest::new(operation, text.clone())
                .with_settings(&app.settings.get());
            if let Some(mode) = mode {
                request.mode = mode;
            }
            if let Some(lang) = lang {
                request.target_lang = lang;
            }
            if persona.is_some() {
                request.persona = persona;
            }
            if cite {
                request.cite_sources = Some(true);
            }
            let target_lang = request.target_lang.clone();

            let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<String>();
            let printer = tokio::spawn(async move {
                while let Some(line) = progress_rx.recv().await {
                    eprintln!("… {}", line);
                }
            });

            let result = app.router().route(request, Some(progress_tx)).await;
            let _ = printer.await;
            let result = result?;
            info!(op = %operation, route = %result.route, "Operation complete");
            println!("{}", render::ai_result(operation, &result));

            if app.gateway.credentials().current().is_some() {
                app.api
                    .log_operation(&OpsLogEntry {
                        kind: operation.to_string(),
                        source,
                        input: text,
                        output: result.text,
                        target_lang: (operation == Operation::Translate).then_some(target_lang),
                        ts: Utc::now().timestamp_millis(),
                    })
                    .await;
            }
        }

        Commands::Login { username, password } => {
            let credential = app.coordinator.login(&username, &password).await?;
            println!(
                "Signed in. Token valid until {}.",
                render::timestamp(credential.expires_at_ms)
            );
        }

        Commands::Signup {
            full_name,
            username,
            password,
        } => {
            let credential = match app.coordinator.signup(&full_name, &username, &password).await
            {
                Err(Error::MalformedAuthResponse) => {
                    info!("Signup returned no token, signing in");
                    app.coordinator.login(&username, &password).await?
                }
                other => other?,
            };
            println!(
                "Account created. Token valid until {}.",
                render::timestamp(credential.expires_at_ms)
            );
        }

        Commands::Logout => {
            app.coordinator.logout().await?;
            println!("Signed out.");
        }

        Commands::Whoami => {
            let me = app.coordinator.fetch(defaults::ME_PATH).await?;
            println!("{}", serde_json::to_string_pretty(&me)?);
        }

        Commands::Status => {
            let settings = app.settings.get();
            let path = app
                .settings
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(memory)".to_string());
            println!("Settings: {}", path);
            println!("Backend:  {}", settings.backend_url().unwrap_or("(not configured)"));
            println!("Mode:     {}", settings.mode);
            match app.gateway.credentials().current() {
                Some(c) if c.is_expired() => {
                    println!("Signed in: no (token expired {})", render::timestamp(c.expires_at_ms))
                }
                Some(c) => println!("Signed in: yes (until {})", render::timestamp(c.expires_at_ms)),
                None => println!("Signed in: no"),
            }
        }

        Commands::Config { command } => config(&app, command)?,

        Commands::Health => {
            app.gateway.health().await?;
            println!("Backend healthy.");
        }

        Commands::Quiz { command } => match command {
            QuizCommand::Generate { url, text, title } => {
                let id = match text {
                    Some(text) => app.api.generate_quiz_from_text(&text, &url, &title).await?,
                    None if url.is_empty() => bail!("a URL or --text is required"),
                    None => app.api.generate_quiz(&url).await?,
                };
                println!("Quiz {} created. Take it with `pagegenie quiz show {}`.", id, id);
            }
            QuizCommand::Show { id } => {
                let quiz = app.api.quiz(&id).await?;
                println!("{}", render::quiz(&id, &quiz));
            }
            QuizCommand::Submit { id, answers } => {
                let verdict = app.api.submit_quiz(&id, answers).await?;
                println!("{}", serde_json::to_string_pretty(&verdict)?);
            }
            QuizCommand::Recent => {
                let attempts = app.api.recent_quiz_attempts().await?;
                println!("{}", render::items(&attempts));
            }
        },

        Commands::Reading { command } => match command {
            ReadingCommand::Suggest { url, summary } => {
                let suggestions = app.api.suggest_reading(&url, &summary).await?;
                println!("{}", render::items(&suggestions));
            }
            ReadingCommand::Recent => {
                let recent = app.api.recent_reading().await?;
                println!("{}", render::items(&recent));
            }
        },

        Commands::Note { command } => match command {
            NoteCommand::Save { content, source } => {
                let saved = app.api.save_note(&source, &content).await?;
                match saved.categories {
                    Some(c) => {
                        println!("Saved. Topic: {}", c.topic.as_deref().unwrap_or("-"));
                        if !c.tags.is_empty() {
                            println!("Tags: {}", c.tags.join(", "));
                        }
                    }
                    None => println!("Saved."),
                }
            }
            NoteCommand::List => {
                let notes = app.api.notes().await?;
                println!("{}", render::items(&notes));
            }
        },

        Commands::Compare { text, url } => {
            let comparison = app.api.compare_concept(&text, &url).await?;
            println!("{}", render::comparison(&comparison));
        }
    }

    app.coordinator.shutdown().await;
    Ok(())
}

fn config(app: &App, command: ConfigCommand) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Get { key } => {
            let value = render::settings(&app.settings.get());
            match key {
                Some(key) => match value.get(&key) {
                    Some(v) => println!("{}", v),
                    None => bail!("unknown setting: {}", key),
                },
                None => println!("{}", serde_json::to_string_pretty(&value)?),
            }
        }
        ConfigCommand::Set { key, value } => {
            let mut parse_error = None;
            app.settings.update(|s| match key.as_str() {
                "backendUrl" => s.backend_url = value.trim().to_string(),
                "targetLang" => s.target_lang = value.trim().to_string(),
                "mode" => match value.parse() {
                    Ok(mode) => s.mode = mode,
                    Err(e) => parse_error = Some(e),
                },
                "persona" => match value.parse() {
                    Ok(persona) => s.persona = persona,
                    Err(e) => parse_error = Some(e),
                },
                "citeSources" => match parse_bool(&value) {
                    Some(b) => s.cite_sources = b,
                    None => parse_error = Some(format!("Invalid boolean: {}", value)),
                },
                "showToolbarOnSelection" => match parse_bool(&value) {
                    Some(b) => s.show_toolbar_on_selection = b,
                    None => parse_error = Some(format!("Invalid boolean: {}", value)),
                },
                "apiToken" => {
                    let credential =
                        credential_from_token(value.trim(), Utc::now().timestamp_millis());
                    s.api_token = credential.token;
                    s.token_exp = if s.api_token.is_empty() {
                        0
                    } else {
                        credential.expires_at_ms
                    };
                }
                other => parse_error = Some(format!("unknown setting: {}", other)),
            })?;
            if let Some(e) = parse_error {
                bail!(e);
            }
            println!("Saved {}.", key);
        }
    }
    Ok(())
}

/// Log every credential transition, including ones forced by the backend.
async fn watch_credential(mut rx: broadcast::Receiver<SettingsChange>) {
    loop {
        match rx.recv().await {
            Ok(change) => {
                if let Some(message) = credential_transition(&change) {
                    info!(
                        has_token = !change.new.api_token.is_empty(),
                        expires_at_ms = change.new.token_exp,
                        "{}",
                        message
                    );
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "Settings watcher lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn credential_transition(change: &SettingsChange) -> Option<&'static str> {
    if !change.credential_changed() {
        return None;
    }
    Some(match (change.old.api_token.is_empty(), change.new.api_token.is_empty()) {
        (_, true) => "Credential cleared",
        (true, false) => "Credential stored",
        (false, false) => "Credential replaced",
    })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_input(text: Option<String>) -> anyhow::Result<String> {
    let text = match text.as_deref() {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            buf
        }
        Some(t) => t.to_string(),
    };
    if text.trim().is_empty() {
        bail!("no input text");
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagegenie_core::Settings;

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "pagegenie",
            "run",
            "translate",
            "hola",
            "-l",
            "fr",
            "-m",
            "online-only",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                operation,
                text,
                mode,
                lang,
                ..
            } => {
                assert_eq!(operation, Operation::Translate);
                assert_eq!(text.as_deref(), Some("hola"));
                assert_eq!(mode, Some(Mode::OnlineOnly));
                assert_eq!(lang.as_deref(), Some("fr"));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_operation() {
        assert!(Cli::try_parse_from(["pagegenie", "run", "dance", "x"]).is_err());
    }

    #[test]
    fn test_quiz_submit_accepts_negative_answers() {
        let cli =
            Cli::try_parse_from(["pagegenie", "quiz", "submit", "q1", "0", "-1", "2"]).unwrap();
        match cli.command {
            Commands::Quiz {
                command: QuizCommand::Submit { id, answers },
            } => {
                assert_eq!(id, "q1");
                assert_eq!(answers, vec![0, -1, 2]);
            }
            _ => panic!("expected quiz submit"),
        }
    }

    #[test]
    fn test_credential_transition() {
        let signed_in = Settings {
            api_token: "tok".to_string(),
            token_exp: 5,
            ..Settings::default()
        };
        let change = |old: &Settings, new: &Settings| SettingsChange {
            old: old.clone(),
            new: new.clone(),
        };

        assert_eq!(
            credential_transition(&change(&Settings::default(), &signed_in)),
            Some("Credential stored")
        );
        assert_eq!(
            credential_transition(&change(&signed_in, &Settings::default())),
            Some("Credential cleared")
        );
        let mode_only = Settings {
            mode: Mode::OnlineOnly,
            ..Settings::default()
        };
        assert_eq!(
            credential_transition(&change(&Settings::default(), &mode_only)),
            None
        );
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_config_set_token_derives_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let app = App::new(Some(dir.path().join("settings.json"))).unwrap();
            config(
                &app,
                ConfigCommand::Set {
                    key: "apiToken".to_string(),
                    value: "opaque".to_string(),
                },
            )
            .unwrap();
            let s = app.settings.get();
            assert_eq!(s.api_token, "opaque");
            assert!(s.token_exp > Utc::now().timestamp_millis());

            assert!(config(
                &app,
                ConfigCommand::Set {
                    key: "mode".to_string(),
                    value: "sideways".to_string(),
                },
            )
            .is_err());
            assert_eq!(app.settings.get().mode, Mode::Auto);
        });
    }
}
