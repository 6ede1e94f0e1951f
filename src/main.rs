#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # consensus-grader
//!
//! Grade a plain-text submission from the command line, check a schema file,
//! or serve the grading API.
//!
//! Agents are configured through the environment (a `.env` file is picked up
//! too): set `OPENAI_ENDPOINT`, `OPENAI_API_KEY` and a comma separated
//! `OPENAI_MODELS` for chat-model agents, and/or `SCORING_SERVICE_ENDPOINTS`
//! for remote scoring services.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use bpaf::*;
use colored::Colorize;
use consensus_grader::{
    api::{self, AppState},
    config,
    schema::{DirectorySchemaStore, SchemaStore, store::load_schema_file},
};
use dotenvy::dotenv;
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Grade a submission file
    Grade {
        /// Assignment whose schema to use
        assignment: String,
        /// Schema directory override
        schemas:    Option<PathBuf>,
        /// Print JSON instead of a table
        json:       bool,
        /// Plain-text submission
        submission: PathBuf,
    },
    /// Check a schema file
    Validate(PathBuf),
    /// Serve the HTTP API
    Serve {
        /// Bind address override
        addr:    Option<String>,
        /// Schema directory override
        schemas: Option<PathBuf>,
    },
}

/// Parse the command line arguments and return a `Cmd` enum
fn options() -> Cmd {
    /// parses the schema directory override
    fn schema_dir() -> impl Parser<Option<PathBuf>> {
        long("schemas")
            .help("Directory of <assignment>.json grading schemas")
            .argument::<PathBuf>("DIR")
            .optional()
    }

    let assignment = long("assignment")
        .short('a')
        .help("Assignment id to grade against")
        .argument::<String>("ID");
    let json = long("json")
        .help("Print the grade as JSON")
        .switch();
    let submission = positional::<PathBuf>("FILE").help("Plain-text submission to grade");
    let schemas = schema_dir();
    let grade = construct!(Cmd::Grade {
        assignment,
        schemas,
        json,
        submission
    })
    .to_options()
    .command("grade")
    .help("Grade a submission against an assignment's rubric");

    let schema_file = positional::<PathBuf>("SCHEMA").help("Path to a JSON grading schema");
    let validate = construct!(Cmd::Validate(schema_file))
        .to_options()
        .command("validate")
        .help("Check that a schema's criteria add up to its total");

    let addr = long("addr")
        .help("Address to bind, defaults to GRADER_ADDR or 0.0.0.0:8000")
        .argument::<String>("ADDR")
        .optional();
    let schemas = schema_dir();
    let serve = construct!(Cmd::Serve { addr, schemas })
        .to_options()
        .command("serve")
        .help("Serve the grading and review API");

    let cmd = construct!([grade, validate, serve]);

    cmd.to_options()
        .descr("Rubric grading by multi-agent consensus")
        .run()
}

/// Picks the schema store: an explicit directory wins over the environment.
fn schema_store(config: &config::ConfigHandle, dir: Option<PathBuf>) -> Arc<dyn SchemaStore> {
    match dir {
        Some(dir) => Arc::new(DirectorySchemaStore::new(dir)),
        None => config.schema_store(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = LevelFilter::from_level(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    match options() {
        Cmd::Grade {
            assignment,
            schemas,
            json,
            submission,
        } => {
            let config = config::ensure_initialized()?;
            let text = std::fs::read_to_string(&submission)
                .with_context(|| format!("Could not read submission {}", submission.display()))?;
            let schema = schema_store(&config, schemas).load(&assignment)?;

            let grade = config
                .grader_instance()
                .grade_assignment(&text, &schema)
                .await
                .with_context(|| format!("Could not grade {}", submission.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&grade)?);
            } else {
                eprintln!("{}", grade.table());
                let status = if grade.needs_review() {
                    "needs review".yellow().bold()
                } else {
                    "ok".green().bold()
                };
                println!("{}: {grade} [{status}]", schema.name());
            }
        }
        Cmd::Validate(path) => {
            let schema = load_schema_file(&path)?;
            println!(
                "{} {} ({} criteria, {} points)",
                "valid".green().bold(),
                schema.name(),
                schema.criteria().len(),
                schema.total_points()
            );
        }
        Cmd::Serve { addr, schemas } => {
            let config = config::ensure_initialized()?;
            let addr = addr.unwrap_or_else(|| config.addr().to_string());
            let state = Arc::new(AppState::new(
                config.grader_instance(),
                schema_store(&config, schemas),
            ));

            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Could not bind {addr}"))?;
            tracing::info!("Listening on http://{addr}");
            axum::serve(listener, api::router(state))
                .await
                .context("Server error")?;
        }
    };

    Ok(())
}
