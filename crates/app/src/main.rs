use biobuilder_core::{
    discover_documents, ingest_paths, BioExtractor, DocumentStore, ExtractionReport,
    ExtractionTargets, LlmClientConfig, OpenAiCompatibleClient,
};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const PREVIEW_CHARS: usize = 500;

#[derive(Parser)]
#[command(name = "biobuilder", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the OpenAI-compatible completion endpoint
    #[arg(long, env = "BIOBUILDER_LLM_URL", default_value = "http://0.0.0.0:4000")]
    llm_url: String,

    /// API key sent as a bearer token
    #[arg(long, env = "BIOBUILDER_LLM_API_KEY", default_value = "sk-1234")]
    llm_api_key: String,

    /// Model used when a command does not name one
    #[arg(long, env = "BIOBUILDER_MODEL", default_value = "nvidia-gpt-oss-120b")]
    default_model: String,

    /// Keep a copy of every ingested file in this directory
    #[arg(long, env = "BIOBUILDER_UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,
}

#[derive(Args)]
struct DocumentArgs {
    /// Document to load (pdf or txt). Repeatable.
    #[arg(long = "file")]
    files: Vec<PathBuf>,

    /// Folder scanned recursively for pdf and txt files.
    #[arg(long)]
    folder: Option<PathBuf>,
}

impl DocumentArgs {
    fn paths(&self) -> Vec<PathBuf> {
        let mut paths = self.files.clone();
        if let Some(folder) = &self.folder {
            paths.extend(discover_documents(folder));
        }
        paths
    }
}

#[derive(Subcommand)]
enum Command {
    /// Load documents and print their summaries.
    Documents {
        #[command(flatten)]
        documents: DocumentArgs,
    },
    /// Extract genes, proteins and their relations from documents.
    Extract {
        #[command(flatten)]
        documents: DocumentArgs,
        /// Restrict extraction to relations involving this entity. Repeatable.
        #[arg(long = "entity")]
        entities: Vec<String>,
        /// Restrict extraction to this relation type. Repeatable.
        #[arg(long = "relation")]
        relations: Vec<String>,
        /// Model override for this request.
        #[arg(long)]
        model: Option<String>,
        /// Print the report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Ask a question answered from the documents.
    Ask {
        #[command(flatten)]
        documents: DocumentArgs,
        /// Question to answer
        #[arg(long)]
        question: String,
        /// Model override for this request.
        #[arg(long)]
        model: Option<String>,
    },
    /// List chat models offered by the completion endpoint.
    Models,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "biobuilder boot"
    );

    let client = OpenAiCompatibleClient::new(LlmClientConfig {
        base_url: cli.llm_url.clone(),
        api_key: Some(cli.llm_api_key.clone()),
        default_model: cli.default_model.clone(),
    })?;
    info!(
        url = %cli.llm_url,
        default_model = client.default_model(),
        "completion endpoint configured"
    );

    let store = match &cli.upload_dir {
        Some(dir) => DocumentStore::with_upload_dir(dir)?,
        None => DocumentStore::new(),
    };

    match cli.command {
        Command::Documents { documents } => {
            load_documents(&store, &documents)?;
            for summary in store.list() {
                println!(
                    "{} {} chars={} words={}",
                    summary.id, summary.filename, summary.char_count, summary.word_count
                );
                if let Some(preview) = store.preview(&summary.id, PREVIEW_CHARS) {
                    println!("  preview:\n{preview}");
                }
            }
        }
        Command::Extract {
            documents,
            entities,
            relations,
            model,
            json,
        } => {
            load_documents(&store, &documents)?;
            let extractor = BioExtractor::new(client);
            let targets = ExtractionTargets {
                entities,
                relations,
            };

            let report = extractor
                .extract_documents(&store, None, model.as_deref(), &targets)
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Command::Ask {
            documents,
            question,
            model,
        } => {
            load_documents(&store, &documents)?;
            let extractor = BioExtractor::new(client);
            let report = extractor
                .ask_documents(&store, &question, None, model.as_deref())
                .await?;

            println!("{}", report.answer);
            println!(
                "model={} documents_used={}",
                report.model_used, report.documents_used
            );
        }
        Command::Models => {
            for model in client.list_models().await? {
                println!("{}\t{}", model.id, model.name);
            }
        }
    }

    Ok(())
}

fn load_documents(store: &DocumentStore, documents: &DocumentArgs) -> anyhow::Result<()> {
    let report = ingest_paths(store, &documents.paths())?;

    if !report.skipped_files.is_empty() {
        warn!(skipped = report.skipped_files.len(), "some documents were skipped");
        for skipped in &report.skipped_files {
            eprintln!("skipped {}: {}", skipped.path.display(), skipped.reason);
        }
    }

    info!(loaded = report.documents.len(), "documents loaded");
    Ok(())
}

fn print_report(report: &ExtractionReport) {
    let result = &report.result;

    println!(
        "model={} documents_used={} entities={} relations={}",
        report.model_used,
        report.documents_used,
        result.entities.len(),
        result.relations.len()
    );

    for entity in &result.entities {
        if entity.aliases.is_empty() {
            println!("entity [{}] {}", entity.entity_type.as_str(), entity.name);
        } else {
            println!(
                "entity [{}] {} (aka {})",
                entity.entity_type.as_str(),
                entity.name,
                entity.aliases.join(", ")
            );
        }
        if !entity.description.is_empty() {
            println!("  {}", entity.description);
        }
    }

    for relation in &result.relations {
        println!(
            "relation {} -[{}]-> {}",
            relation.source, relation.relation_type, relation.target
        );
        if !relation.evidence.is_empty() {
            println!("  evidence: {}", relation.evidence);
        }
    }

    if result.parse_error {
        println!("parse_error: the model output could not be parsed");
        if let Some(raw) = &result.raw_response {
            println!("raw_response:\n{raw}");
        }
    }
}
