//! Terminal client for AskPDF.
//!
//! A small REPL joining the conversation pane and the document pane: plain
//! input is sent to the backend as a question, slash commands drive
//! everything else (`/help` lists them).

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use askpdf_lib::api::ServerChoice;
use askpdf_lib::state::{lock, probe_backend, AppState};
use askpdf_lib::{chat, document};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

#[derive(Parser)]
#[command(name = "askpdf", version, about = "Chat with a PDF from the terminal")]
struct Cli {
    /// PDF to upload on startup.
    pdf: Option<PathBuf>,

    /// Backend deployment to talk to.
    #[arg(long, value_enum, default_value_t = ServerChoice::Local)]
    server: ServerChoice,

    /// Log filter when RUST_LOG is unset (e.g. "debug").
    #[arg(long, default_value = "warn")]
    log: String,
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn ellipsize(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{head}…")
    }
}

// ── Conversation pane ────────────────────────────────────────────────────────

fn print_turn(turn: &chat::ChatTurn) {
    match turn.role {
        chat::ChatRole::User => println!("{} {}", bold("you ▸"), turn.content),
        chat::ChatRole::Assistant => {
            println!("{} {}", cyan("askpdf ▸"), turn.content);
            for excerpt in &turn.excerpts {
                println!(
                    "    {} {}",
                    dim(&format!("[p.{}]", excerpt.page)),
                    dim(&ellipsize(&excerpt.text, 120))
                );
            }
        }
    }
}

/// Prints everything appended to the log since the last call.
fn drain_new_turns(state: &AppState, printed: &mut usize) {
    let session = lock(&state.session);
    for turn in &session.turns()[*printed..] {
        print_turn(turn);
    }
    *printed = session.len();
}

// ── Document pane ────────────────────────────────────────────────────────────

fn render_pane(state: &AppState) {
    if !state.panel_open() {
        println!("{}", dim("(document panel closed; /panel to open)"));
        return;
    }
    let viewer = lock(&state.viewer);
    if let Some(message) = viewer.error() {
        println!("{}", red(message));
        return;
    }
    if !viewer.is_loaded() {
        println!("{}", dim("No PDF loaded."));
        return;
    }
    println!(
        "{}",
        bold(&format!(
            "── page {}/{} · zoom {:.1}× · rotation {}° ──",
            viewer.page(),
            viewer.page_count(),
            viewer.zoom(),
            viewer.rotation()
        ))
    );
    let text = viewer.page_text().unwrap_or_default();
    for line in text.lines().take(12) {
        println!("  {}", dim(line));
    }
    let extra = text.lines().count().saturating_sub(12);
    if extra > 0 {
        println!("  {}", dim(&format!("… {extra} more lines")));
    }
    let page = viewer.page();
    drop(viewer);
    let session = lock(&state.session);
    for excerpt in session.excerpts().iter().filter(|e| e.page == page) {
        println!("  {} {}", cyan("▌"), ellipsize(&excerpt.text, 120));
    }
}

// ── Actions ──────────────────────────────────────────────────────────────────

async fn run_upload(state: &AppState, path: &Path, printed: &mut usize) {
    let bar = spinner("Uploading PDF…");
    let result = document::upload_pdf(state, path).await;
    bar.finish_and_clear();
    match result {
        Ok(()) => {
            drain_new_turns(state, printed);
            render_pane(state);
        }
        Err(err) => println!("{} {err}", red("✗")),
    }
}

async fn run_question(state: &AppState, text: &str, gemini: bool, printed: &mut usize) {
    let bar = spinner("Thinking…");
    let result = if gemini {
        chat::chat_gemini(state, text).await
    } else {
        chat::ask_question(state, text).await
    };
    bar.finish_and_clear();
    match result {
        Ok(()) => drain_new_turns(state, printed),
        Err(err) => println!("{} {err}", red("✗")),
    }
}

async fn run_summarize(state: &AppState, printed: &mut usize) {
    let bar = spinner("Summarizing…");
    let result = chat::summarize(state).await;
    bar.finish_and_clear();
    match result {
        Ok(()) => drain_new_turns(state, printed),
        Err(err) => println!("{} {err}", red("✗")),
    }
}

fn print_help() {
    println!("{}", bold("Commands"));
    println!("  /open <path>       upload a PDF and make it the current document");
    println!("  /summarize         summarize the current document");
    println!("  /mode              toggle between the default and gemini answer paths");
    println!("  /panel             toggle the document panel");
    println!("  /next  /prev       page navigation");
    println!("  /page <n>          jump to page n");
    println!("  /zoom in|out       adjust zoom (0.5–2.0)");
    println!("  /rotate            rotate the page by 90°");
    println!("  /excerpts          list the latest answer's supporting excerpts");
    println!("  /server <choice>   switch backend: local or hosted");
    println!("  /help  /quit");
    println!("{}", dim("Anything else is sent to the backend as a question."));
}

// ── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log)),
        )
        .with_writer(io::stderr)
        .init();

    let state = AppState::with_server(cli.server);
    let mut printed = 0usize;
    let mut gemini_mode = false;

    let bar = spinner("Checking backend…");
    let probe = probe_backend(&state).await;
    bar.finish_and_clear();
    match probe {
        Ok(_) => println!(
            "{} connected to {}",
            green("✓"),
            state.client().base_url()
        ),
        Err(_) => {
            let fallback = state.server().other();
            println!(
                "{} backend {} is unreachable",
                red("✗"),
                state.client().base_url()
            );
            print!("Switch to {fallback} ({})? [y/N] ", fallback.base_url());
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            if line.trim().eq_ignore_ascii_case("y") {
                state.switch_backend(fallback);
                println!("{} using {}", green("✓"), state.client().base_url());
            }
        }
    }

    if let Some(path) = &cli.pdf {
        run_upload(&state, path, &mut printed).await;
    } else {
        println!("{}", dim("Open a PDF with /open <path>, then ask away."));
    }

    let stdin = io::stdin();
    loop {
        let doc = state.pdf_name().unwrap_or_else(|| "no pdf".into());
        let mode = if gemini_mode { " · gemini" } else { "" };
        print!("{} ", bold(&format!("[{doc}{mode}]>")));
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(rest) = input.strip_prefix('/') {
            let (command, args) = rest.split_once(' ').unwrap_or((rest, ""));
            match command {
                "open" => {
                    if args.is_empty() {
                        println!("{} usage: /open <path>", red("✗"));
                    } else {
                        run_upload(&state, Path::new(args.trim()), &mut printed).await;
                    }
                }
                "summarize" => run_summarize(&state, &mut printed).await,
                "mode" => {
                    gemini_mode = !gemini_mode;
                    let label = if gemini_mode { "gemini" } else { "default" };
                    println!("{} answer path: {label}", green("✓"));
                }
                "panel" => {
                    state.toggle_panel();
                    render_pane(&state);
                }
                "next" => {
                    lock(&state.viewer).next_page();
                    render_pane(&state);
                }
                "prev" => {
                    lock(&state.viewer).prev_page();
                    render_pane(&state);
                }
                "page" => match args.trim().parse::<u32>() {
                    Ok(n) => {
                        lock(&state.viewer).go_to_page(n);
                        render_pane(&state);
                    }
                    Err(_) => println!("{} usage: /page <number>", red("✗")),
                },
                "zoom" => {
                    match args.trim() {
                        "in" => lock(&state.viewer).zoom_in(),
                        "out" => lock(&state.viewer).zoom_out(),
                        _ => {
                            println!("{} usage: /zoom in|out", red("✗"));
                            continue;
                        }
                    }
                    render_pane(&state);
                }
                "rotate" => {
                    lock(&state.viewer).rotate();
                    render_pane(&state);
                }
                "excerpts" => {
                    let session = lock(&state.session);
                    if session.excerpts().is_empty() {
                        println!("{}", dim("No excerpts yet."));
                    }
                    for excerpt in session.excerpts() {
                        println!(
                            "  {} {}",
                            cyan(&format!("[p.{}]", excerpt.page)),
                            excerpt.text
                        );
                    }
                }
                "server" => match args.trim() {
                    "local" => {
                        state.switch_backend(ServerChoice::Local);
                        println!("{} using {}", green("✓"), state.client().base_url());
                    }
                    "hosted" => {
                        state.switch_backend(ServerChoice::Hosted);
                        println!("{} using {}", green("✓"), state.client().base_url());
                    }
                    _ => println!("{} usage: /server local|hosted", red("✗")),
                },
                "help" => print_help(),
                "quit" | "exit" => break,
                other => {
                    println!("{} unknown command /{other}, try /help", red("✗"));
                }
            }
        } else {
            run_question(&state, input, gemini_mode, &mut printed).await;
        }
    }

    Ok(())
}
