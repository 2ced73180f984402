//! TinyNote - CLI Tool
//!
//! Command-line client for the TinyNote backend.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tinynote::api::{
    notes_in_listing, ApiError, AuthService, ChangePasswordRequest, LoginRequest, Note, NoteApi,
    NoteDraft, Page, RegisterRequest, Revalidator, SessionGuard, UserApi,
};
use tinynote::chat::{message_text, ChatRequest, ChatStreamer, StreamEvent};
use tinynote::events::{ClientEvent, EventBus, EventEmitter, NoticeLevel, Route};
use tinynote::session::{FileSessionStore, SessionContext, UserInfo};
use tinynote::util::{format_relative, parse_timestamp};
use tinynote::ClientConfig;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tinynote")]
#[command(about = "Command-line client for TinyNote")]
struct Cli {
    /// YAML config file (default: ./tinynote.yaml)
    #[arg(long, env = "TINYNOTE_CONFIG")]
    config: Option<PathBuf>,

    /// Backend API URL (overrides config; chat streams go to <server>/ai/chat)
    #[arg(long)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Log in (falls back to the remembered login)
    Login {
        /// Username; defaults to the remembered one
        username: Option<String>,

        /// Password; read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,

        /// Remember this login for next time
        #[arg(long)]
        remember: bool,
    },

    /// Log out, keeping the remembered login
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Account operations
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Note operations
    Note {
        #[command(subcommand)]
        action: NoteAction,
    },

    /// Ask the AI assistant; the answer streams to stdout (Ctrl-C aborts)
    Chat {
        prompt: String,

        /// Model override
        #[arg(long)]
        model: Option<String>,
    },

    /// Keep revalidating the session until it expires or Ctrl-C
    Watch,
}

#[derive(Subcommand)]
enum UserAction {
    /// Fetch a profile (default: your own)
    Info { id: Option<i64> },

    /// Update your profile
    Update {
        #[arg(long)]
        nickname: Option<String>,

        #[arg(long)]
        email: Option<String>,
    },

    /// Change your password
    Password {
        #[arg(long)]
        old: String,

        #[arg(long)]
        new: String,
    },

    /// Point your avatar at an existing URL
    Avatar { url: String },

    /// Upload an image as your avatar
    UploadAvatar { path: PathBuf },

    /// Number of notes you own
    NoteCount,
}

#[derive(Subcommand)]
enum NoteAction {
    /// Create a note
    Create {
        #[arg(short, long)]
        title: String,

        /// Note body (use --file to read it from disk)
        #[arg(short, long, conflicts_with = "file")]
        content: Option<String>,

        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Note type
        #[arg(long = "type", default_value = "0")]
        note_type: i32,

        /// Content is Markdown
        #[arg(long)]
        markdown: bool,
    },

    /// Update an existing note
    Update {
        id: i64,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long, conflicts_with = "file")]
        content: Option<String>,

        #[arg(short, long)]
        file: Option<PathBuf>,

        #[arg(long = "type")]
        note_type: Option<i32>,

        #[arg(long)]
        markdown: Option<bool>,
    },

    /// Delete a note
    Delete { id: i64 },

    /// Show a note
    Show { id: i64 },

    /// List your notes
    List {
        /// Only notes of this type
        #[arg(long = "type")]
        note_type: Option<i32>,

        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "10")]
        size: u32,
    },

    /// Search your notes
    Search {
        keyword: String,

        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "10")]
        size: u32,
    },
}

/// Prints notices to stderr and republishes every event on the bus
struct ConsoleEmitter {
    bus: EventBus,
}

impl EventEmitter for ConsoleEmitter {
    fn emit(&self, event: ClientEvent) {
        match &event {
            ClientEvent::Notice(notice) => {
                let tag = match notice.level {
                    NoticeLevel::Success => "ok",
                    NoticeLevel::Info => "info",
                    NoticeLevel::Warning => "warning",
                    NoticeLevel::Error => "error",
                };
                eprintln!("[{}] {}", tag, notice.message);
            }
            ClientEvent::Navigate { route } => {
                debug!(path = route.path(), "Navigation requested");
            }
        }
        self.bus.emit(event);
    }
}

/// Everything a command needs
struct App {
    config: ClientConfig,
    bus: EventBus,
    guard: Arc<SessionGuard>,
    auth: AuthService,
    users: UserApi,
    notes: NoteApi,
}

impl App {
    async fn new(config: ClientConfig) -> Result<Self> {
        let store = Arc::new(FileSessionStore::new(config.state_path.clone()));
        let session = Arc::new(
            SessionContext::load(store)
                .await
                .context("Failed to load session state")?,
        );
        let bus = EventBus::default();
        let emitter = Arc::new(ConsoleEmitter { bus: bus.clone() });
        let guard = Arc::new(
            SessionGuard::new(&config, session, emitter).context("Failed to build HTTP client")?,
        );

        Ok(Self {
            auth: AuthService::new(guard.clone(), config.remember_password),
            users: UserApi::new(guard.clone()),
            notes: NoteApi::new(guard.clone()),
            config,
            bus,
            guard,
        })
    }

    /// Id of the logged-in user; fails with a hint otherwise
    async fn user_id(&self) -> Result<i64> {
        match self.auth.current_user().await.and_then(|u| u.id) {
            Some(id) => Ok(id),
            None => bail!("not logged in, run `tinynote login` first"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,tinynote=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        // Guard failures were already shown as notices
        if !already_reported(&e) {
            eprintln!("error: {:#}", e);
        }
        std::process::exit(1);
    }
}

fn already_reported(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiError>().is_some_and(ApiError::was_notified)
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ClientConfig::from_yaml_and_env(cli.config.as_deref())?;
    if let Some(server) = cli.server.as_deref() {
        config = config.with_server(server);
    }
    let app = App::new(config).await?;

    match cli.command {
        Commands::Register {
            username,
            email,
            password,
        } => {
            app.users
                .register(&RegisterRequest {
                    username: username.clone(),
                    email,
                    password,
                })
                .await?;
            println!("Registered {}", username);
        }
        Commands::Login {
            username,
            password,
            remember,
        } => handle_login(&app, username, password, remember).await?,
        Commands::Logout => {
            if !app.auth.logout().await {
                println!("Not logged in");
            }
        }
        Commands::Whoami => handle_whoami(&app).await?,
        Commands::User { action } => handle_user(&app, action).await?,
        Commands::Note { action } => handle_note(&app, action).await?,
        Commands::Chat { prompt, model } => handle_chat(&app, prompt, model).await?,
        Commands::Watch => handle_watch(&app).await?,
    }

    Ok(())
}

async fn handle_login(
    app: &App,
    username: Option<String>,
    password: Option<String>,
    remember: bool,
) -> Result<()> {
    let remembered = app.auth.remembered_credentials().await;
    let username = username
        .or_else(|| remembered.username.clone())
        .context("username required (nothing remembered)")?;

    let password = match password {
        Some(password) => password,
        None if remembered.username.as_deref() == Some(username.as_str()) => {
            match remembered.password {
                Some(password) => password,
                None => read_password()?,
            }
        }
        None => read_password()?,
    };

    app.auth
        .login(&LoginRequest { username, password }, remember)
        .await?;
    if let Some(name) = app.auth.display_name().await {
        println!("Welcome, {}", name);
    }
    Ok(())
}

fn read_password() -> Result<String> {
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn handle_whoami(app: &App) -> Result<()> {
    let state = app.guard.session().snapshot().await;
    match state.current_user() {
        Some(user) => {
            println!(
                "{} (id {})",
                app.auth.display_name().await.unwrap_or_default(),
                user.id.unwrap_or_default()
            );
            if let Some(username) = &user.username {
                println!("username: {}", username);
            }
            if let Some(email) = &user.email {
                println!("email:    {}", email);
            }
            if let Some(avatar) = &state.avatar_url {
                println!("avatar:   {}", avatar);
            }
        }
        None => {
            println!("Not logged in");
            if let Some(username) = &state.remembered_username {
                println!("remembered login: {}", username);
            }
        }
    }
    Ok(())
}

async fn handle_user(app: &App, action: UserAction) -> Result<()> {
    match action {
        UserAction::Info { id } => {
            let id = match id {
                Some(id) => id,
                None => app.user_id().await?,
            };
            let info = app.users.info(id).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        UserAction::Update { nickname, email } => {
            let id = app.user_id().await?;
            let current = app.users.info(id).await?;
            let updated = UserInfo {
                id: Some(id),
                nickname: nickname.or(current.nickname.clone()),
                email: email.or(current.email.clone()),
                ..current
            };
            app.users.update(&updated).await?;
            app.auth.refresh_profile().await?;
            println!("Profile updated");
        }

        UserAction::Password { old, new } => {
            let user_id = app.user_id().await?;
            app.users
                .change_password(&ChangePasswordRequest {
                    user_id,
                    old_password: old,
                    new_password: new,
                })
                .await?;
            println!("Password changed");
        }

        UserAction::Avatar { url } => {
            let user_id = app.user_id().await?;
            app.users.update_avatar_url(user_id, &url).await?;
            let absolute = app.auth.update_avatar_url(&url).await?;
            println!("Avatar set to {}", absolute);
        }

        UserAction::UploadAvatar { path } => {
            let user_id = app.user_id().await?;
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "avatar".to_string());

            let payload = app.users.upload_avatar(user_id, &file_name, bytes).await?;
            let url = payload
                .as_str()
                .or_else(|| payload.get("url").and_then(|v| v.as_str()))
                .or_else(|| payload.get("avatarUrl").and_then(|v| v.as_str()))
                .map(str::to_string)
                .context("upload reply carries no avatar URL")?;

            app.users.update_avatar_url(user_id, &url).await?;
            let absolute = app.auth.update_avatar_url(&url).await?;
            println!("Avatar uploaded: {}", absolute);
        }

        UserAction::NoteCount => {
            let user_id = app.user_id().await?;
            let count = app.users.note_count(user_id).await?;
            println!("{}", count);
        }
    }

    Ok(())
}

async fn read_content(content: Option<String>, file: Option<PathBuf>) -> Result<Option<String>> {
    match (content, file) {
        (Some(content), _) => Ok(Some(content)),
        (None, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .map(Some)
            .with_context(|| format!("Failed to read {}", path.display())),
        (None, None) => Ok(None),
    }
}

async fn handle_note(app: &App, action: NoteAction) -> Result<()> {
    let user_id = app.user_id().await?;

    match action {
        NoteAction::Create {
            title,
            content,
            file,
            note_type,
            markdown,
        } => {
            let content = read_content(content, file).await?.unwrap_or_default();
            let resp = app
                .notes
                .create(&NoteDraft {
                    id: None,
                    user_id,
                    title,
                    content,
                    note_type,
                    is_markdown: i32::from(markdown),
                })
                .await?;
            println!("Created note: {}", resp);
        }

        NoteAction::Update {
            id,
            title,
            content,
            file,
            note_type,
            markdown,
        } => {
            let existing = app.notes.detail(id, user_id).await?;
            let content = read_content(content, file).await?;
            app.notes
                .update(&NoteDraft {
                    id: Some(id),
                    user_id,
                    title: title.unwrap_or(existing.title),
                    content: content.unwrap_or(existing.content),
                    note_type: note_type.or(existing.note_type).unwrap_or(0),
                    is_markdown: markdown
                        .map(i32::from)
                        .or(existing.is_markdown)
                        .unwrap_or(0),
                })
                .await?;
            println!("Updated note {}", id);
        }

        NoteAction::Delete { id } => {
            app.notes.delete(id, user_id).await?;
            println!("Deleted note {}", id);
        }

        NoteAction::Show { id } => {
            let note = app.notes.detail(id, user_id).await?;
            println!("# {}", note.title);
            if let Some(when) = note_timestamp(&note) {
                println!("({})", when);
            }
            println!();
            println!("{}", note.content);
        }

        NoteAction::List {
            note_type,
            page,
            size,
        } => {
            let page = Page { num: page, size };
            let listing = match note_type {
                Some(note_type) => app.notes.list_by_type(user_id, note_type, page).await?,
                None => app.notes.list(user_id, page).await?,
            };
            print_notes(&notes_in_listing(&listing));
        }

        NoteAction::Search {
            keyword,
            page,
            size,
        } => {
            let listing = app
                .notes
                .search(user_id, &keyword, Page { num: page, size })
                .await?;
            print_notes(&notes_in_listing(&listing));
        }
    }

    Ok(())
}

/// Relative age of the latest timestamp on a note
fn note_timestamp(note: &Note) -> Option<String> {
    ["updateTime", "updatedAt", "createTime", "createdAt"]
        .iter()
        .filter_map(|key| note.extra.get(*key).and_then(|v| v.as_str()))
        .find_map(parse_timestamp)
        .map(|ts| format_relative(ts, Utc::now()))
}

fn print_notes(notes: &[Note]) {
    if notes.is_empty() {
        println!("No notes");
        return;
    }
    println!("{:<8} {:<6} {:<16} {}", "ID", "TYPE", "UPDATED", "TITLE");
    println!("{}", "-".repeat(60));
    for note in notes {
        println!(
            "{:<8} {:<6} {:<16} {}",
            note.id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
            note.note_type.unwrap_or_default(),
            note_timestamp(note).unwrap_or_else(|| "-".into()),
            note.title
        );
    }
}

async fn handle_chat(app: &App, prompt: String, model: Option<String>) -> Result<()> {
    let user_id = app.user_id().await?;
    let streamer = ChatStreamer::new(&app.config, app.guard.session().clone())
        .context("Failed to build streaming client")?;

    let (handle, mut events) = streamer.open_channel(ChatRequest {
        user_id,
        prompt,
        model,
    });

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                handle.abort();
                eprintln!();
                eprintln!("[aborted]");
                break;
            }
            event = events.recv() => match event {
                Some(StreamEvent::Message(message)) => {
                    write!(stdout, "{}", message_text(&message))?;
                    stdout.flush()?;
                }
                Some(StreamEvent::Completed) => {
                    writeln!(stdout)?;
                    break;
                }
                Some(StreamEvent::Failed(e)) => return Err(e.into()),
                None => break,
            }
        }
    }

    let state = handle.finished().await;
    debug!(?state, "Chat stream finished");
    Ok(())
}

async fn handle_watch(app: &App) -> Result<()> {
    if !app.auth.is_logged_in().await {
        bail!("not logged in, run `tinynote login` first");
    }

    let mut events = app.bus.subscribe();
    let shutdown = CancellationToken::new();
    let task = Revalidator::new(
        app.guard.clone(),
        app.config.validate_path.clone(),
        app.config.revalidate_interval,
    )
    .spawn(shutdown.clone());

    info!(
        every_secs = app.config.revalidate_interval.as_secs(),
        "Watching session, Ctrl-C to stop"
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = events.recv() => match event {
                Ok(ClientEvent::Navigate { route: Route::Login }) => {
                    println!("Session ended");
                    break;
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    }

    shutdown.cancel();
    task.await.ok();
    Ok(())
}
