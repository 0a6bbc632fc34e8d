//! docx-review CLI

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser as ClapParser, Subcommand};

use docx_review::core::parser::{DocxParser, Parser};
use docx_review::extract;
use docx_review::feedback::{DefaultFeedback, FeedbackGenerator, ResponseFeedback};
use docx_review::store::InMemorySessionStore;
use docx_review::utils::document_processor::ReviewProcessor;
use docx_review::ReviewConfig;

#[derive(ClapParser)]
#[command(name = "docx-review")]
#[command(version)]
#[command(about = "Split .docx write-ups into sections and return reviewer comments", long_about = None)]
struct Cli {
    /// Config file (TOML)
    #[arg(short, long, global = true, env = "DOCX_REVIEW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the extracted sections as JSON
    Sections {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Run a full review with the default feedback set and write the reviewed copy
    Review {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Directory for the reviewed document
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Comment author
        #[arg(short, long)]
        author: Option<String>,

        /// Shell command that reads a review prompt on stdin and prints the
        /// feedback JSON; the default feedback set is used without it
        #[arg(short, long, value_name = "CMD")]
        generator: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = ReviewConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Sections { input } => {
            let blocks = DocxParser
                .parse(&input)
                .with_context(|| format!("failed to parse {}", input.display()))?;
            let sections = extract(&blocks, &config.known_sections, &config.excluded_sections);
            println!("{}", serde_json::to_string_pretty(&sections)?);
        }
        Commands::Review {
            input,
            output_dir,
            author,
            generator,
        } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(author) = author {
                config.default_author = author;
            }

            let generator: Arc<dyn FeedbackGenerator> = match generator {
                Some(cmd) => Arc::new(ResponseFeedback::new(move |prompt: &str| run_generator(&cmd, prompt))),
                None => Arc::new(DefaultFeedback),
            };
            let processor = ReviewProcessor::new(config, Arc::new(InMemorySessionStore::new()), generator);

            let upload = processor.upload(&input)?;
            println!("Loaded {} sections", upload.sections.len());

            for analysis in processor.analyze_all(&upload.session_id)? {
                for item in analysis.feedback {
                    processor.accept_feedback(&upload.session_id, &analysis.section_name, item)?;
                }
            }

            let artifact = processor.complete_review(&upload.session_id)?;
            println!(
                "✅ {} comments written to {} ({:?})",
                artifact.comment_count,
                artifact.path.display(),
                artifact.mode
            );
        }
    }

    Ok(())
}

/// Run `cmd` through the shell with `prompt` on stdin and return its stdout.
fn run_generator(cmd: &str, prompt: &str) -> docx_review::Result<String> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(prompt.as_bytes())?;
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(docx_review::Error::Parse(format!(
            "generator exited with {}",
            output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
