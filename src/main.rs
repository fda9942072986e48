use ai_chat_export::config;
use ai_chat_export::locate::Mode;
use ai_chat_export::note::{self, WriteMode};
use ai_chat_export::pipeline::{self, ExtractionResult, Settings};
use ai_chat_export::title::heuristic_title;
use clap::Parser;
use eyre::{Context, Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Convert saved AI-chat HTML pages into clean Markdown notes.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// HTML file to process.
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Process every HTML file in this directory instead.
    #[arg(short, long, value_name = "DIR")]
    batch: Option<PathBuf>,

    /// Convert whole pages instead of searching for a phrase.
    #[arg(short = 'p', long)]
    full_page: bool,

    /// Phrase identifying the exchange to extract (repeatable).
    /// Omitted in single-file mode, phrases are read from stdin.
    #[arg(long, value_name = "TEXT")]
    phrase: Vec<String>,

    /// Merge every extraction into this single note.
    #[arg(short, long, value_name = "NAME")]
    merge: Option<String>,

    /// Watch the downloads directory and convert new HTML files as they land.
    #[arg(short, long)]
    watch: bool,

    /// Directory notes are written to.
    /// Defaults to ./Exported_Notes if not set in config.
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/ai-chat-export/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Keep raw phrases as titles instead of rewriting them.
    #[arg(long)]
    raw_titles: bool,

    /// Enable debug-level logging.
    #[arg(long)]
    debug: bool,

    /// Suppress per-file output.
    #[arg(short, long)]
    quiet: bool,
}

/// Everything a processing run needs, resolved from CLI > config > default.
struct App {
    out_dir: PathBuf,
    merge: Option<String>,
    settings: Settings,
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Logging (RUST_LOG overrides the flag)
    let default_filter = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    // 2. Load config file (CLI path > default path)
    let file_cfg = config::load_file_config(cli.config.as_deref())?;

    // 3. Resolve output directory (CLI > Config > Default)
    let out_dir = cli
        .out_dir
        .or(file_cfg.out_dir)
        .unwrap_or_else(|| PathBuf::from("Exported_Notes"));

    // 4. Resolve the watched directory (Config > OS downloads dir)
    let downloads_dir = file_cfg
        .downloads_dir
        .or_else(dirs::download_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    // 5. Engine settings
    let settings = Settings {
        date_format: file_cfg
            .date_format
            .unwrap_or_else(|| "%Y-%m-%d".to_string()),
        max_title_len: file_cfg.max_filename_length.unwrap_or(60),
        smart_titles: !cli.raw_titles && file_cfg.smart_titles.unwrap_or(true),
    };

    // 6. Merge target always ends in .md
    let merge = cli.merge.map(|m| {
        if m.ends_with(".md") {
            m
        } else {
            format!("{m}.md")
        }
    });

    let app = App {
        out_dir,
        merge,
        settings,
        quiet: cli.quiet,
    };

    // 7. Dispatch
    if cli.watch {
        watch_loop(&downloads_dir, &app)
    } else if let Some(dir) = cli.batch {
        run_batch(&dir, &app, cli.full_page, &cli.phrase)
    } else if let Some(file) = cli.file {
        if cli.full_page {
            process_full_page(&file, &app).map(|_| ())
        } else if cli.phrase.is_empty() {
            phrase_loop(&file, &app)
        } else {
            for phrase in &cli.phrase {
                process_search(&file, phrase, &app)?;
            }
            Ok(())
        }
    } else {
        Err(eyre!(
            "Nothing to do. Pass an HTML file, --batch <dir> or --watch."
        ))
    }
}

fn process_search(path: &Path, phrase: &str, app: &App) -> Result<bool> {
    let html = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read: {}", path.display()))?;
    let result = pipeline::extract(
        &html,
        &Mode::Search {
            phrase: phrase.to_string(),
        },
        &app.settings,
        None,
    );
    save_result(path, result, phrase, app)
}

fn process_full_page(path: &Path, app: &App) -> Result<bool> {
    let html = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read: {}", path.display()))?;
    let result = pipeline::extract(&html, &Mode::FullPage, &app.settings, None);

    // Fall back to the filename when the page carries no usable title.
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().replace(['_', '-'], " "))
        .unwrap_or_else(|| "exported chat".to_string());
    save_result(path, result, &stem, app)
}

/// Write a successful extraction, or report why there is nothing to write.
fn save_result(source: &Path, result: ExtractionResult, fallback: &str, app: &App) -> Result<bool> {
    if !result.success {
        if !app.quiet {
            eprintln!("✗ {}: {}", source.display(), result.message);
        }
        return Ok(false);
    }
    let Some(body) = result.markdown.as_deref() else {
        return Ok(false);
    };

    let title = match &result.title {
        Some(t) => t.clone(),
        None => heuristic_title(fallback, app.settings.max_title_len),
    };
    let fm = pipeline::frontmatter_for(&result, &title, &app.settings);

    let (target, mode) = match &app.merge {
        Some(name) => (app.out_dir.join(name), WriteMode::Append),
        None => (
            app.out_dir
                .join(filename_for(&title, app.settings.max_title_len)),
            WriteMode::Create,
        ),
    };
    let outcome = note::write_note(&target, &fm, &title, body, mode)?;

    if !app.quiet {
        println!(
            "✔ {}  ({} words) → {}",
            title,
            result.word_count,
            outcome.path().display()
        );
        if !result.languages.is_empty() {
            println!("  languages: {}", result.languages.join(", "));
        }
    }
    Ok(true)
}

fn filename_for(title: &str, max_len: usize) -> String {
    let raw_slug = slug::slugify(title);
    // Truncate the slug (slug output is ASCII-only, so byte == char)
    let slug = raw_slug[..raw_slug.len().min(max_len)].trim_end_matches('-');
    if slug.is_empty() {
        "note.md".to_string()
    } else {
        format!("{slug}.md")
    }
}

/// Interactive loop: keep asking for phrases until an empty line.
fn phrase_loop(path: &Path, app: &App) -> Result<()> {
    let stdin = std::io::stdin();
    let mut count = 0usize;
    loop {
        print!("Search phrase (ENTER to finish): ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let phrase = line.trim();
        if phrase.is_empty() {
            break;
        }
        if process_search(path, phrase, app)? {
            count += 1;
        }
    }
    if !app.quiet {
        println!("Done — {count} extraction(s) from this file.");
    }
    Ok(())
}

fn html_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .wrap_err_with(|| format!("Failed to read directory: {}", dir.display()))?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn run_batch(dir: &Path, app: &App, full_page: bool, phrases: &[String]) -> Result<()> {
    if !full_page && phrases.is_empty() {
        return Err(eyre!("Batch mode needs --phrase or --full-page."));
    }

    let files = html_files(dir)?;
    if files.is_empty() {
        return Err(eyre!("No HTML files found in {}", dir.display()));
    }

    let pb = if app.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)",
            )
            .unwrap()
            .progress_chars("=>-"),
        );
        bar.println(format!("Found {} HTML file(s).", files.len()));
        bar
    };

    let mut exported = 0usize;
    let mut skipped = 0usize;
    for file in &files {
        let outcome = if full_page {
            process_full_page(file, app)
        } else {
            let mut any = false;
            for phrase in phrases {
                any |= process_search(file, phrase, app)?;
            }
            Ok(any)
        };
        match outcome {
            Ok(true) => exported += 1,
            Ok(false) => skipped += 1,
            Err(e) => {
                skipped += 1;
                pb.println(format!("Error [{}]: {:#}", file.display(), e));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if !app.quiet {
        eprintln!("Done. {exported} exported, {skipped} skipped.");
    }
    Ok(())
}

/// Poll the downloads directory and full-page convert HTML files as they
/// appear. One engine invocation per file; Ctrl+C stops the loop.
fn watch_loop(dir: &Path, app: &App) -> Result<()> {
    let mut seen: BTreeSet<PathBuf> = html_files(dir)?.into_iter().collect();

    if !app.quiet {
        println!("Watching {} for new HTML files. Ctrl+C to stop.", dir.display());
    }

    loop {
        std::thread::sleep(Duration::from_secs(2));
        for file in html_files(dir)? {
            if !seen.insert(file.clone()) {
                continue;
            }
            if !app.quiet {
                println!("Detected: {}", file.display());
            }
            // Give the browser a moment to finish writing.
            std::thread::sleep(Duration::from_millis(500));
            if let Err(e) = process_full_page(&file, app) {
                eprintln!("Error [{}]: {:#}", file.display(), e);
            }
        }
    }
}
