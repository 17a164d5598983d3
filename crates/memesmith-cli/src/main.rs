use std::fs;
use std::io::{self, ErrorKind as IoErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use memesmith_contracts::chat::{parse_intent, CHAT_HELP_COMMANDS};
use memesmith_contracts::events::{EventKind, EventPayload, EventWriter};
use memesmith_contracts::models::{ModelSelection, ModelSelector};
use memesmith_contracts::session::{EditorMode, Session};
use memesmith_contracts::templates::TEMPLATES;
use memesmith_engine::providers::{DEFAULT_CAPTION_MODEL, DEFAULT_EDIT_MODEL};
use memesmith_engine::{
    build_client, save_image, ClientConfig, ImageAcquirer, ImageSource, Orchestrator, Outcome,
};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(
    name = "memesmith",
    version,
    about = "Caption and edit meme images with a generative model"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive session driven by slash commands.
    Chat(ChatArgs),
    /// Print caption suggestions for one image.
    Caption(CaptionArgs),
    /// Apply one edit instruction and save the result.
    Edit(EditArgs),
    /// List the built-in template images.
    Templates(TemplatesArgs),
}

#[derive(Debug, Parser)]
struct TemplatesArgs {
    /// Print the catalog as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ModelArgs {
    #[arg(long, default_value = DEFAULT_CAPTION_MODEL)]
    caption_model: String,
    #[arg(long, default_value = DEFAULT_EDIT_MODEL)]
    edit_model: String,
    /// Number of captions to request (1-10).
    #[arg(long = "captions", default_value_t = 5)]
    caption_count: usize,
    /// Transport timeout in seconds (15-300).
    #[arg(long, default_value_t = 90.0)]
    timeout: f64,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct SourceArgs {
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    template: Option<String>,
}

impl SourceArgs {
    fn to_source(&self) -> Result<ImageSource> {
        match (&self.image, &self.url, &self.template) {
            (Some(path), None, None) => Ok(ImageSource::File(path.clone())),
            (None, Some(url), None) => Ok(ImageSource::Url(url.clone())),
            (None, None, Some(id)) => Ok(ImageSource::Template(id.clone())),
            _ => bail!("exactly one of --image, --url or --template is required"),
        }
    }
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    models: ModelArgs,
}

#[derive(Debug, Parser)]
struct CaptionArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    models: ModelArgs,
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    models: ModelArgs,
}

struct Worker {
    label: &'static str,
    handle: JoinHandle<Outcome>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("memesmith error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
        Command::Caption(args) => run_caption(args),
        Command::Edit(args) => run_edit(args),
        Command::Templates(args) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(TEMPLATES)?);
            } else {
                print_templates();
            }
            Ok(0)
        }
    }
}

fn new_event_writer(path: PathBuf) -> EventWriter {
    EventWriter::new(path, Uuid::new_v4().to_string())
}

fn build_orchestrator(models: &ModelArgs, events: Option<EventWriter>) -> Result<Orchestrator> {
    let selected = ModelSelector::new(None)
        .select_pair(Some(&models.caption_model), Some(&models.edit_model))
        .map_err(anyhow::Error::msg)?;

    let config = ClientConfig::from_env()
        .with_caption_count(models.caption_count)
        .with_request_timeout_secs(models.timeout);
    let acquirer = ImageAcquirer::new().timeout(config.request_timeout);
    let client = build_client(&selected, config)
        .context("failed to configure generative client")?;

    let mut orchestrator = Orchestrator::new(client).with_acquirer(acquirer);
    if let Some(events) = events {
        orchestrator = orchestrator.with_events(events.clone());
        for (capability, selection) in selected.selections() {
            let _ = events.emit(
                EventKind::ModelSelected,
                model_selected_payload(capability, selection),
            );
        }
    }
    for (_, selection) in selected.selections() {
        if let Some(reason) = selection.fallback_reason.as_deref() {
            println!("{reason} Using {}.", selection.model.name);
        }
    }
    Ok(orchestrator)
}

fn model_selected_payload(capability: &str, selection: &ModelSelection) -> EventPayload {
    let mut payload = EventPayload::new();
    payload.insert(
        "capability".to_string(),
        Value::String(capability.to_string()),
    );
    payload.insert(
        "model".to_string(),
        Value::String(selection.model.name.clone()),
    );
    payload.insert(
        "provider".to_string(),
        Value::String(selection.model.provider.clone()),
    );
    payload.insert(
        "requested".to_string(),
        selection
            .requested
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
    );
    payload.insert(
        "fallback_reason".to_string(),
        selection
            .fallback_reason
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
    );
    payload
}

fn run_chat(args: ChatArgs) -> Result<()> {
    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let orchestrator = Arc::new(build_orchestrator(
        &args.models,
        Some(new_event_writer(events_path)),
    )?);
    let mut workers: Vec<Worker> = Vec::new();

    let stdin = io::stdin();
    let mut line = String::new();

    println!(
        "Memesmith chat started ({}). Type /help for commands.",
        orchestrator.client_name()
    );

    loop {
        reap_finished(&mut workers, &orchestrator)?;
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == IoErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_intent(input);

        match intent.action.as_str() {
            "noop" => {}
            "help" => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
                println!("/select #N picks suggestion N; any other text is used as the caption.");
            }
            "list_templates" => print_templates(),
            "acquire_file" => {
                let path = intent.arg("path");
                if path.is_empty() {
                    println!("/upload requires a path");
                    continue;
                }
                let outcome = orchestrator.acquire(&ImageSource::File(PathBuf::from(path)));
                report_outcome("Upload", outcome, &orchestrator);
            }
            "acquire_url" => {
                let url = intent.arg("url");
                if url.is_empty() {
                    println!("/url requires a URL");
                    continue;
                }
                let outcome = orchestrator.acquire(&ImageSource::Url(url.to_string()));
                report_outcome("Image", outcome, &orchestrator);
            }
            "acquire_template" => {
                let id = intent.arg("template");
                if id.is_empty() {
                    println!("/template requires an id (see /templates)");
                    continue;
                }
                let outcome = orchestrator.acquire(&ImageSource::Template(id.to_string()));
                report_outcome("Template", outcome, &orchestrator);
            }
            "generate_captions" => spawn_captions(&mut workers, &orchestrator),
            "edit_image" => {
                spawn_edit(&mut workers, &orchestrator, intent.arg("instruction"));
            }
            "select_caption" => {
                let snapshot = orchestrator.snapshot();
                match resolve_caption(intent.arg("caption"), snapshot.generated_captions()) {
                    Ok(caption) => {
                        orchestrator.select_caption(&caption);
                        print_selected(&caption);
                    }
                    Err(message) => println!("{message}"),
                }
            }
            "clear_caption" => {
                orchestrator.select_caption("");
                println!("Caption cleared.");
            }
            "set_mode" => match intent.arg("mode").parse::<EditorMode>() {
                Ok(mode) => {
                    orchestrator.set_mode(mode);
                    println!("Mode set to {mode}");
                }
                Err(err) => println!("{err}"),
            },
            "reset" => {
                let outcome = orchestrator.reset();
                report_outcome("Reset", outcome, &orchestrator);
            }
            "save_image" => {
                let requested = intent.arg("path");
                let target = if requested.is_empty() {
                    args.out.clone()
                } else {
                    PathBuf::from(requested)
                };
                let snapshot = orchestrator.snapshot();
                let Some(image) = snapshot.current_image() else {
                    println!("Nothing to save yet. Upload an image or pick a template first.");
                    continue;
                };
                match save_image(image, &target) {
                    Ok(path) => println!("Saved {}", path.display()),
                    Err(err) => println!("Save failed: {err:#}"),
                }
            }
            "status" => print_status(&orchestrator.snapshot()),
            "wait" => {
                join_workers(&mut workers, &orchestrator)?;
            }
            "prompt" => {
                let text = intent.prompt.as_deref().unwrap_or_default();
                match orchestrator.snapshot().mode() {
                    EditorMode::Edit => spawn_edit(&mut workers, &orchestrator, text),
                    EditorMode::Caption => {
                        orchestrator.select_caption(text);
                        print_selected(text);
                    }
                }
            }
            _ => {
                println!("Unknown command: {}", intent.raw.trim());
            }
        }
    }

    join_workers(&mut workers, &orchestrator)
}

fn spawn_captions(workers: &mut Vec<Worker>, orchestrator: &Arc<Orchestrator>) {
    if let Some(reason) = orchestrator.snapshot().caption_skip_reason() {
        println!("Captions skipped: {reason}");
        return;
    }
    let target = orchestrator.clone();
    workers.push(Worker {
        label: "Captions",
        handle: thread::spawn(move || target.generate_captions()),
    });
    println!("Generating captions...");
}

fn spawn_edit(workers: &mut Vec<Worker>, orchestrator: &Arc<Orchestrator>, instruction: &str) {
    if let Some(reason) = orchestrator.snapshot().edit_skip_reason(instruction) {
        println!("Edit skipped: {reason}");
        return;
    }
    let target = orchestrator.clone();
    let instruction = instruction.to_string();
    workers.push(Worker {
        label: "Edit",
        handle: thread::spawn(move || target.edit_image(&instruction)),
    });
    println!("Editing...");
}

fn reap_finished(workers: &mut Vec<Worker>, orchestrator: &Orchestrator) -> Result<()> {
    let mut idx = 0;
    while idx < workers.len() {
        if workers[idx].handle.is_finished() {
            let worker = workers.remove(idx);
            finish_worker(worker, orchestrator)?;
        } else {
            idx += 1;
        }
    }
    Ok(())
}

fn join_workers(workers: &mut Vec<Worker>, orchestrator: &Orchestrator) -> Result<()> {
    for worker in workers.drain(..) {
        finish_worker(worker, orchestrator)?;
    }
    Ok(())
}

fn finish_worker(worker: Worker, orchestrator: &Orchestrator) -> Result<()> {
    let outcome = worker
        .handle
        .join()
        .map_err(|_| anyhow::anyhow!("{} worker panicked", worker.label))?;
    report_outcome(worker.label, outcome, orchestrator);
    Ok(())
}

fn report_outcome(label: &str, outcome: Outcome, orchestrator: &Orchestrator) {
    let snapshot = orchestrator.snapshot();
    match outcome {
        Outcome::Applied => match label {
            "Captions" => print_captions(snapshot.generated_captions()),
            "Reset" => println!("Restored the original image."),
            _ => {
                if let Some(image) = snapshot.current_image() {
                    println!(
                        "{label} ok: {} ({} bytes, {})",
                        image.mime_type(),
                        image.len(),
                        image.digest()
                    );
                }
            }
        },
        Outcome::Skipped(reason) => println!("{label} skipped: {reason}"),
        Outcome::Failed(_) => println!(
            "{}",
            snapshot.last_error().unwrap_or("Operation failed.")
        ),
        Outcome::Discarded => {
            println!("{label} result discarded: the image changed while it was in flight.")
        }
    }
}

/// `/select #2` picks the second suggestion. Anything else, digits included,
/// is the caption text itself.
fn resolve_caption(arg: &str, captions: &[String]) -> Result<String, String> {
    let arg = arg.trim();
    let Some(index) = arg.strip_prefix('#').and_then(|n| n.trim().parse::<usize>().ok()) else {
        return Ok(arg.to_string());
    };
    index
        .checked_sub(1)
        .and_then(|idx| captions.get(idx))
        .cloned()
        .ok_or_else(|| match captions.len() {
            0 => format!("No suggestion #{index}: generate captions first."),
            count => format!("No suggestion #{index}: pick #1 to #{count}."),
        })
}

fn print_captions(captions: &[String]) {
    if captions.is_empty() {
        println!("No captions returned.");
        return;
    }
    for (idx, caption) in captions.iter().enumerate() {
        println!("#{} {caption}", idx + 1);
    }
}

fn print_selected(caption: &str) {
    if caption.is_empty() {
        println!("Caption cleared.");
    } else {
        println!("Caption: {caption}");
    }
}

fn print_templates() {
    for template in TEMPLATES {
        println!("{}  {:<10} {}", template.id, template.name, template.url);
    }
}

fn print_status(session: &Session) {
    match session.current_image() {
        Some(image) => {
            let edited = session.original_image() != Some(image);
            println!(
                "Image: {} ({} bytes, {}){}",
                image.mime_type(),
                image.len(),
                image.digest(),
                if edited { " [edited]" } else { "" }
            );
        }
        None => println!("Image: none"),
    }
    println!("Mode: {}", session.mode());
    println!("Suggestions: {}", session.generated_captions().len());
    println!(
        "Caption: {}",
        session.overlay_caption().unwrap_or("(none)")
    );
    let mut in_flight = Vec::new();
    if session.generation_in_flight() {
        in_flight.push("captions");
    }
    if session.edit_in_flight() {
        in_flight.push("edit");
    }
    if !in_flight.is_empty() {
        println!("In flight: {}", in_flight.join(", "));
    }
    if let Some(error) = session.last_error() {
        println!("Last error: {error}");
    }
}

fn run_caption(args: CaptionArgs) -> Result<i32> {
    let source = args.source.to_source()?;
    let orchestrator = build_orchestrator(&args.models, args.events.map(new_event_writer))?;
    if !acquire_or_report(&orchestrator, &source) {
        return Ok(1);
    }
    match orchestrator.generate_captions() {
        Outcome::Applied => {
            print_captions(orchestrator.snapshot().generated_captions());
            Ok(0)
        }
        outcome => Ok(report_failure(&orchestrator, "Captions", outcome)),
    }
}

fn run_edit(args: EditArgs) -> Result<i32> {
    let source = args.source.to_source()?;
    let orchestrator = build_orchestrator(&args.models, args.events.map(new_event_writer))?;
    if !acquire_or_report(&orchestrator, &source) {
        return Ok(1);
    }
    match orchestrator.edit_image(&args.prompt) {
        Outcome::Applied => {
            let snapshot = orchestrator.snapshot();
            let Some(image) = snapshot.current_image() else {
                bail!("edit reported success without an image");
            };
            let path = save_image(image, &args.out)?;
            println!("Saved {}", path.display());
            Ok(0)
        }
        outcome => Ok(report_failure(&orchestrator, "Edit", outcome)),
    }
}

fn acquire_or_report(orchestrator: &Orchestrator, source: &ImageSource) -> bool {
    match orchestrator.acquire(source) {
        Outcome::Applied => true,
        outcome => {
            report_failure(orchestrator, "Image", outcome);
            false
        }
    }
}

fn report_failure(orchestrator: &Orchestrator, label: &str, outcome: Outcome) -> i32 {
    match outcome {
        Outcome::Skipped(reason) => eprintln!("{label} skipped: {reason}"),
        _ => eprintln!(
            "{}",
            orchestrator
                .snapshot()
                .last_error()
                .unwrap_or("Operation failed.")
        ),
    }
    1
}
