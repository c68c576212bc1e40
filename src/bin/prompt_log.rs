//! prompt-log: append a prompt entry to the project's markdown prompt log.

use std::path::PathBuf;

use clap::Parser;
use inference_playground::prompt_log::append_prompt;

#[derive(Parser, Debug)]
#[command(name = "prompt-log", about = "Append a prompt entry to PROMPTS.md")]
struct Args {
    /// Prompt text or change note.
    #[arg(long)]
    note: String,

    /// Optional file link or reference.
    #[arg(long)]
    link: Option<String>,

    /// Optional section name (e.g. "Script Input Prompts").
    #[arg(long)]
    section: Option<String>,

    /// Markdown file to append to.
    #[arg(long, default_value = "PROMPTS.md")]
    file: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inference_playground=warn".into()),
        )
        .init();

    let args = Args::parse();
    let today = chrono::Local::now().date_naive();

    append_prompt(
        &args.file,
        today,
        &args.note,
        args.link.as_deref(),
        args.section.as_deref(),
    )?;

    println!("Appended prompt to {}", args.file.display());
    Ok(())
}
