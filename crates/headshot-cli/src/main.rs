use std::fs;
use std::io::{self, BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use headshot_contracts::backdrop::Backdrop;
use headshot_contracts::commands::{parse_command, SessionCommand, SESSION_HELP_COMMANDS};
use headshot_contracts::events::EventWriter;
use headshot_contracts::export::{now_millis, ExportFile};
use headshot_contracts::styles::{StyleCatalog, StyleSpec, CUSTOM_STYLE_ID};
use headshot_engine::{
    default_generators, read_image_file, BackgroundEdit, BorderKeyRemover, GeminiConfig,
    GeneratedImage, GenerationError, ImageGenerator, ImageGeneratorRegistry, InputImage, Screen,
    Workflow,
};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "headshot", version, about = "AI headshot studio")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the available styles.
    Styles,
    Generate(GenerateArgs),
    RemoveBg(RemoveBgArgs),
    Session(SessionArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Provider {
    Gemini,
    Dryrun,
}

impl Provider {
    fn id(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Dryrun => "dryrun",
        }
    }
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    image: PathBuf,
    /// Defaults to the first catalog style, or `custom` when `--prompt` is set.
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    prompt: Option<String>,
    #[arg(long)]
    out: PathBuf,
    #[arg(long, value_enum, default_value_t = Provider::Gemini)]
    provider: Provider,
    #[arg(long)]
    model: Option<String>,
    /// Also export a background-edited copy on this backdrop.
    #[arg(long)]
    backdrop: Option<Backdrop>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct RemoveBgArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value_t = Backdrop::Transparent)]
    backdrop: Backdrop,
    #[arg(long, default_value_t = 48.0)]
    tolerance: f32,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long, value_enum, default_value_t = Provider::Gemini)]
    provider: Provider,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    events: Option<PathBuf>,
}

const PROGRESS_INTERVAL: Duration = Duration::from_millis(750);

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("headshot error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("HEADSHOT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Styles => {
            print_styles(&mut io::stdout().lock(), &StyleCatalog::default())?;
            Ok(0)
        }
        Command::Generate(args) => run_generate(args),
        Command::RemoveBg(args) => run_remove_bg(args),
        Command::Session(args) => {
            run_session(args)?;
            Ok(0)
        }
    }
}

/// Builds the generator registry, failing before any work when the chosen
/// provider has no credential.
fn load_generators(provider: Provider, model: Option<&str>) -> Result<ImageGeneratorRegistry> {
    let mut config = GeminiConfig::from_env();
    if let Some(model) = model {
        config = config.with_model(model);
    }
    if provider == Provider::Gemini {
        config.require_api_key()?;
    }
    tracing::debug!(?config, provider = provider.id(), "generator config loaded");
    Ok(default_generators(config))
}

fn open_workflow(out: &Path, events: Option<PathBuf>) -> Result<Workflow> {
    fs::create_dir_all(out)
        .with_context(|| format!("failed to create output dir {}", out.display()))?;
    let events_path = events.unwrap_or_else(|| out.join("events.jsonl"));
    let session_id = Uuid::new_v4().to_string();
    tracing::info!(%session_id, events = %events_path.display(), "session opened");
    Ok(Workflow::new(StyleCatalog::default())?.with_events(EventWriter::new(events_path, session_id)))
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let registry = load_generators(args.provider, args.model.as_deref())?;
    let generator = registry
        .get(args.provider.id())
        .with_context(|| format!("provider '{}' is not registered", args.provider.id()))?;
    let mut workflow = open_workflow(&args.out, args.events.clone())?;

    let style = resolve_style(
        workflow.catalog(),
        args.style.as_deref(),
        args.prompt.as_deref(),
    )?;
    let bytes = read_image_file(&args.image)?;
    workflow
        .select_image(bytes)
        .with_context(|| format!("cannot use {}", args.image.display()))?;
    workflow.select_style(&style);
    if let Some(prompt) = args.prompt.as_deref() {
        workflow.set_custom_prompt(prompt);
    }

    let mut stdout = io::stdout().lock();
    run_generation(&mut workflow, generator, &mut io::stderr())?;
    if let Some(error) = workflow.session().last_error() {
        eprintln!("Generation failed ({}): {}", error.kind.id(), error.message);
        return Ok(1);
    }
    let file = workflow
        .export_result(now_millis())
        .context("generation finished without an image")?;
    let path = write_export(&args.out, &file)?;
    writeln!(stdout, "Saved {}", path.display())?;

    if let Some(backdrop) = args.backdrop {
        workflow.open_background_edit();
        workflow.select_backdrop(backdrop);
        workflow.remove_background(&BorderKeyRemover::default());
        if let Some(error) = workflow.background_edit().and_then(|edit| edit.last_error()) {
            eprintln!("Background edit failed: {}", error.message);
            return Ok(1);
        }
        let file = workflow.download_background_edit(now_millis())?;
        let path = write_export(&args.out, &file)?;
        writeln!(stdout, "Saved {}", path.display())?;
    }
    Ok(0)
}

/// A custom prompt only reaches the generator under the custom style, so
/// `--prompt` picks that style by default and conflicts with any other.
fn resolve_style(
    catalog: &StyleCatalog,
    style: Option<&str>,
    prompt: Option<&str>,
) -> Result<StyleSpec> {
    let id = match (style, prompt) {
        (Some(id), _) => id,
        (None, Some(_)) => CUSTOM_STYLE_ID,
        (None, None) => {
            return catalog
                .default_style()
                .cloned()
                .context("style catalog is empty")
        }
    };
    let spec = catalog.get(id).cloned().with_context(|| {
        format!(
            "unknown style '{id}' (available: {})",
            catalog.ids().join(", ")
        )
    })?;
    if prompt.is_some() && !spec.is_custom() {
        bail!(
            "--prompt is only used with --style {CUSTOM_STYLE_ID}; style '{}' has its own prompt",
            spec.id
        );
    }
    Ok(spec)
}

fn run_remove_bg(args: RemoveBgArgs) -> Result<i32> {
    let bytes = read_image_file(&args.image)?;
    InputImage::from_bytes(bytes.clone())
        .with_context(|| format!("cannot use {}", args.image.display()))?;
    let mut edit = BackgroundEdit::new();
    edit.select_backdrop(args.backdrop);
    edit.start(&bytes, &BorderKeyRemover::new(args.tolerance));
    if let Some(error) = edit.last_error() {
        eprintln!("Background edit failed: {}", error.message);
        return Ok(1);
    }
    let file = edit.download(now_millis())?;
    let path = write_export(&args.out, &file)?;
    println!("Saved {}", path.display());
    Ok(0)
}

fn run_session(args: SessionArgs) -> Result<()> {
    let registry = load_generators(args.provider, args.model.as_deref())?;
    let generator = registry
        .get(args.provider.id())
        .with_context(|| format!("provider '{}' is not registered", args.provider.id()))?;
    let workflow = open_workflow(&args.out, args.events.clone())?;
    let mut session = SessionLoop {
        workflow,
        generator,
        remover: BorderKeyRemover::default(),
        out_dir: args.out.clone(),
    };

    println!("Headshot session started. Type /help for commands.");
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();
    loop {
        print!("[{}] > ", session.workflow.screen().id());
        stdout.flush()?;

        line.clear();
        let read = match stdin.lock().read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }
        let command = parse_command(line.trim_end_matches(['\n', '\r']));
        if session.handle(command, &mut stdout)? == Flow::Quit {
            break;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct SessionLoop<'a> {
    workflow: Workflow,
    generator: &'a dyn ImageGenerator,
    remover: BorderKeyRemover,
    out_dir: PathBuf,
}

impl SessionLoop<'_> {
    fn handle(&mut self, command: SessionCommand, out: &mut impl Write) -> Result<Flow> {
        match command {
            SessionCommand::Noop => {}
            SessionCommand::Help => {
                writeln!(out, "Commands: {}", SESSION_HELP_COMMANDS.join(" "))?;
                writeln!(out, "Plain text sets the custom prompt.")?;
            }
            SessionCommand::Quit => return Ok(Flow::Quit),
            SessionCommand::Styles => print_styles(out, self.workflow.catalog())?,
            SessionCommand::Status => self.print_status(out)?,
            SessionCommand::Upload { path } => self.upload(&path, out)?,
            SessionCommand::Style { id } => {
                let Some(style) = self.workflow.catalog().get(&id).cloned() else {
                    writeln!(
                        out,
                        "Unknown style '{id}'. Available: {}",
                        self.workflow.catalog().ids().join(", ")
                    )?;
                    return Ok(Flow::Continue);
                };
                if self.workflow.select_style(&style) {
                    writeln!(out, "Style set to {}", style.name)?;
                } else {
                    writeln!(out, "Busy generating; style unchanged.")?;
                }
            }
            SessionCommand::Prompt { text } => {
                if !self.workflow.set_custom_prompt(&text) {
                    writeln!(out, "Busy generating; prompt unchanged.")?;
                } else if self.workflow.session().selected_style().is_custom() {
                    writeln!(out, "Custom prompt set.")?;
                } else {
                    writeln!(out, "Custom prompt saved. Use /style custom to send it.")?;
                }
            }
            SessionCommand::Generate => {
                if self.workflow.screen() != Screen::Configure {
                    writeln!(out, "Upload a photo first (/upload <path>).")?;
                    return Ok(Flow::Continue);
                }
                run_generation(&mut self.workflow, self.generator, out)?;
                match (self.workflow.screen(), self.workflow.session().last_error()) {
                    (Screen::Result, _) => writeln!(
                        out,
                        "Headshot ready. /download to save, /edit_bg to change the background, /retry to try again."
                    )?,
                    (_, Some(error)) => writeln!(out, "Error: {}", error.message)?,
                    _ => {}
                }
            }
            SessionCommand::Retry => {
                if self.workflow.try_again() {
                    writeln!(out, "Back to style selection; your photo is kept.")?;
                } else {
                    writeln!(out, "Nothing to retry yet.")?;
                }
            }
            SessionCommand::Reset => {
                self.workflow.reset();
                writeln!(out, "Session reset.")?;
            }
            SessionCommand::Download => match self.workflow.export_result(now_millis()) {
                Some(file) => {
                    let path = write_export(&self.out_dir, &file)?;
                    writeln!(out, "Saved {}", path.display())?;
                }
                None => writeln!(out, "Nothing to download yet.")?,
            },
            SessionCommand::EditBackground => {
                if self.workflow.open_background_edit() {
                    writeln!(out, "Background editor open. /remove_bg to start.")?;
                } else if self.workflow.background_edit().is_some() {
                    writeln!(out, "Background editor is already open.")?;
                } else {
                    writeln!(out, "Generate a headshot first.")?;
                }
            }
            SessionCommand::Backdrop { name } => {
                let backdrop = match name.parse::<Backdrop>() {
                    Ok(backdrop) => backdrop,
                    Err(err) => {
                        writeln!(out, "{err}")?;
                        return Ok(Flow::Continue);
                    }
                };
                if self.workflow.select_backdrop(backdrop) {
                    writeln!(out, "Backdrop set to {}", backdrop.label())?;
                } else {
                    writeln!(out, "Open the background editor first (/edit_bg).")?;
                }
            }
            SessionCommand::RemoveBackground => {
                if self.workflow.background_edit().is_none() {
                    writeln!(out, "Open the background editor first (/edit_bg).")?;
                    return Ok(Flow::Continue);
                }
                self.workflow.remove_background(&self.remover);
                let Some(edit) = self.workflow.background_edit() else {
                    return Ok(Flow::Continue);
                };
                match (edit.preview_path(), edit.last_error()) {
                    (Some(preview), _) => {
                        writeln!(out, "Background removed. Preview: {}", preview.display())?
                    }
                    (None, Some(error)) => writeln!(out, "Error: {}", error.message)?,
                    (None, None) => writeln!(out, "Background removal is {}.", edit.state().id())?,
                }
            }
            SessionCommand::SaveBackground => {
                match self.workflow.download_background_edit(now_millis()) {
                    Ok(file) => {
                        let path = write_export(&self.out_dir, &file)?;
                        writeln!(out, "Saved {}", path.display())?;
                    }
                    Err(err) => writeln!(out, "Cannot save: {err}")?,
                }
            }
            SessionCommand::CancelBackground => {
                if self.workflow.cancel_background_edit() {
                    writeln!(out, "Background edit discarded.")?;
                } else {
                    writeln!(out, "Nothing to cancel.")?;
                }
            }
            SessionCommand::CloseBackground => {
                if self.workflow.close_background_edit() {
                    writeln!(out, "Background editor closed.")?;
                } else {
                    writeln!(out, "Background editor is not open.")?;
                }
            }
            SessionCommand::Unknown { command, .. } => {
                writeln!(out, "Unknown command /{command}. Type /help for commands.")?;
            }
        }
        Ok(Flow::Continue)
    }

    fn upload(&mut self, path: &str, out: &mut impl Write) -> Result<()> {
        if path.is_empty() {
            writeln!(out, "/upload requires a path")?;
            return Ok(());
        }
        let loaded = if path.starts_with("data:") {
            InputImage::from_data_url(path)
                .map(|image| image.bytes)
                .map_err(anyhow::Error::from)
        } else {
            read_image_file(Path::new(path))
        };
        let bytes = match loaded {
            Ok(bytes) => bytes,
            Err(err) => {
                writeln!(out, "Upload failed: {err:#}")?;
                return Ok(());
            }
        };
        match self.workflow.select_image(bytes) {
            Ok(true) => writeln!(out, "Photo loaded. Pick a /style, then /generate.")?,
            Ok(false) => writeln!(out, "A photo is already loaded; /reset to start over.")?,
            Err(err) => writeln!(out, "{err}")?,
        }
        Ok(())
    }

    fn print_status(&self, out: &mut impl Write) -> Result<()> {
        let session = self.workflow.session();
        writeln!(out, "Screen: {}", session.screen().id())?;
        writeln!(out, "Style: {}", session.selected_style().name)?;
        if !session.custom_prompt().is_empty() {
            writeln!(out, "Custom prompt: {}", session.custom_prompt())?;
        }
        if let Some(image) = session.original_image() {
            match image.dimensions() {
                Some((width, height)) => {
                    writeln!(out, "Photo: {} {width}x{height}", image.mime_type)?
                }
                None => writeln!(out, "Photo: {}", image.mime_type)?,
            }
        }
        if let Some(error) = session.last_error() {
            writeln!(out, "Error ({}): {}", error.kind.id(), error.message)?;
        }
        if let Some(edit) = self.workflow.background_edit() {
            writeln!(
                out,
                "Background: {} on {}",
                edit.state().id(),
                edit.selected_backdrop().label()
            )?;
            if let Some(error) = edit.last_error() {
                writeln!(out, "Background error: {}", error.message)?;
            }
        }
        Ok(())
    }
}

/// Starts a generation, runs it on a worker thread, and applies the outcome.
/// Returns whether an outcome was applied.
fn run_generation(
    workflow: &mut Workflow,
    generator: &dyn ImageGenerator,
    progress: &mut impl Write,
) -> Result<bool> {
    let Some(ticket) = workflow.begin_generation() else {
        return Ok(false);
    };
    let token = ticket.token();
    writeln!(progress, "Generating ({})...", ticket.style_id())?;
    let waited = thread::scope(|scope| {
        let (tx, rx) = mpsc::channel();
        let worker = scope.spawn(move || {
            let _ = tx.send(ticket.run(generator));
        });
        let waited = wait_for_outcome(&rx, progress);
        if worker.join().is_err() {
            tracing::error!(token, "generation worker panicked");
        }
        waited
    });
    // The ticket must settle even when the worker or the progress sink fails.
    let outcome = match waited {
        Ok(Some(outcome)) => outcome,
        Ok(None) => Err(GenerationError::Transport(
            "generation worker exited without a result".to_string(),
        )),
        Err(err) => {
            workflow.complete_generation(token, Err(GenerationError::transport(&err)));
            return Err(err);
        }
    };
    Ok(workflow.complete_generation(token, outcome))
}

/// `None` when the worker hung up without sending an outcome.
fn wait_for_outcome(
    rx: &mpsc::Receiver<Result<GeneratedImage, GenerationError>>,
    progress: &mut impl Write,
) -> Result<Option<Result<GeneratedImage, GenerationError>>> {
    loop {
        match rx.recv_timeout(PROGRESS_INTERVAL) {
            Ok(outcome) => {
                writeln!(progress)?;
                return Ok(Some(outcome));
            }
            Err(RecvTimeoutError::Timeout) => {
                write!(progress, ".")?;
                progress.flush()?;
            }
            Err(RecvTimeoutError::Disconnected) => {
                writeln!(progress)?;
                return Ok(None);
            }
        }
    }
}

fn write_export(out_dir: &Path, file: &ExportFile) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output dir {}", out_dir.display()))?;
    let path = out_dir.join(&file.file_name);
    fs::write(&path, &file.bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

fn print_styles(out: &mut impl Write, catalog: &StyleCatalog) -> Result<()> {
    for style in catalog.list() {
        writeln!(out, "{:<22} {:<22} {}", style.id, style.name, style.description)?;
    }
    Ok(())
}
