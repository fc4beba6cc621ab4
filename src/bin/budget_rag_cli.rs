use anyhow::{Context, Result};
use budget_rag::{
    config, logging,
    processing::{AnswerBody, QuestionKind, RagService},
};
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "budget-rag-cli",
    about = "Build the vector database or ask questions about the budget brief"
)]
struct Cli {
    /// Rebuild the vector database from the configured PDF.
    #[arg(long)]
    build: bool,
    /// Ask a question against the vector database.
    #[arg(long, value_name = "QUESTION")]
    ask: Option<String>,
    /// Answer `--ask` with the figure-focused prompt.
    #[arg(long, requires = "ask")]
    numerical: bool,
    /// Print the chunks most similar to the query.
    #[arg(long, value_name = "QUERY")]
    search: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();
    let config = config::init_config().context("Failed to load configuration")?;

    if !cli.build && cli.ask.is_none() && cli.search.is_none() {
        println!("Please specify either --build to create database or --ask to ask a question");
        return Ok(());
    }

    let service = RagService::new(config)
        .await
        .context("Failed to initialize RAG service")?;

    if cli.build {
        let outcome = service.build_database().await?;
        println!("Database created successfully!");
        println!(
            "{} pages, {} chunks ({} duplicates skipped) in collection '{}'",
            outcome.pages, outcome.chunks, outcome.skipped_duplicates, outcome.collection
        );
    }

    if let Some(question) = cli.ask.as_deref() {
        let kind = if cli.numerical {
            QuestionKind::Numerical
        } else {
            QuestionKind::Standard
        };
        let answer = service.ask(question, kind).await?;
        match &answer.body {
            AnswerBody::Sections(parsed) => {
                println!("ANSWER:\n{}\n", parsed.answer);
                if !parsed.sources.is_empty() {
                    println!("SOURCES:\n{}\n", parsed.sources);
                }
                if !parsed.excerpts.is_empty() {
                    println!("RELEVANT EXCERPTS:\n{}\n", parsed.excerpts);
                }
            }
            AnswerBody::Numerical {
                raw_output,
                figures,
            } => {
                println!("{raw_output}\n");
                for figure in figures {
                    println!("  - {} ({:?})", figure.text, figure.kind);
                }
            }
            AnswerBody::Raw { raw_output } => println!("{raw_output}"),
        }
    }

    if let Some(query) = cli.search.as_deref() {
        let hits = service.search(query).await?;
        if hits.is_empty() {
            println!("Unable to find any matches!");
        }
        for hit in hits {
            let page = hit
                .page
                .map(|page| format!("page {}", page + 1))
                .unwrap_or_else(|| "page ?".into());
            println!("[{:.3}] {}\n{}\n", hit.score, page, hit.text);
        }
    }

    Ok(())
}
