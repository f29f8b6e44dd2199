//! ownergraph CLI - ownership graph ingestion and entity resolution

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ownergraph_core::config::Config;
use ownergraph_core::domain::ownership::{
    Collaborators, DeclaredHolding, DocumentSource, EntityResolver, IngestRequest,
    IngestionResult, IngestionService, OrgNumber, OwnershipGraphRepository, Resolution,
    WebIntelligence, normalize_identifier,
};
use ownergraph_core::infrastructure::extraction::{
    LlmWebIntelligence, NoDocuments, ReportDirectory, UnavailableWeb,
};
use ownergraph_core::infrastructure::ownership::SqliteOwnershipGraphRepository;
use ownergraph_core::infrastructure::search::TavilySearch;
use ownergraph_core::llm::{JsonCompletion, LlmClient};
use ownergraph_core::storage::{Database, DatabaseConfig};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ownergraph")]
#[command(author, version, about = "Ownership graph ingestion and entity resolution", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file (defaults to the configured path)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest an entity and its holdings
    Ingest {
        /// Organization number, e.g. 556043-4200
        id: String,
        /// Company name
        name: String,
        /// Known holding, repeatable
        #[arg(long = "holding", value_name = "ID=NAME[@PCT]", value_parser = parse_holding)]
        holdings: Vec<DeclaredHolding>,
    },

    /// Ingest every `ID,NAME` line of a file
    IngestMany {
        file: PathBuf,
        /// Runs in flight at once (defaults to ingestion.max_concurrent_runs)
        #[arg(short, long)]
        concurrency: Option<usize>,
    },

    /// Resolve a name against the stored graph
    Resolve {
        name: String,
        /// Organization number hint
        #[arg(long)]
        id: Option<String>,
    },

    /// Show a stored entity
    Show { id: String },

    /// List the owners of an entity
    Owners { id: String },

    /// List the holdings of an entity
    Holdings { id: String },

    /// Show the ownership network around an entity
    Network {
        id: String,
        /// Hops to follow (1-5)
        #[arg(short, long, default_value_t = 2)]
        depth: u32,
    },

    /// Graph statistics
    Stats,

    /// Check an organization number
    Validate { id: String },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// List all configuration values
    Show,
    /// Write a default configuration file
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Show config file path
    Path,
}

/// Parse `ID=NAME` or `ID=NAME@PCT`
fn parse_holding(raw: &str) -> Result<DeclaredHolding, String> {
    let (id, rest) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=NAME[@PCT], got '{}'", raw))?;
    let (name, pct) = match rest.rsplit_once('@') {
        Some((name, pct)) => {
            let pct: f64 = pct
                .trim()
                .trim_end_matches('%')
                .parse()
                .map_err(|_| format!("invalid percentage '{}'", pct))?;
            (name, Some(pct))
        }
        None => (rest, None),
    };

    let id = normalize_identifier(id.trim()).map_err(|e| e.to_string())?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("holding '{}' has no name", raw));
    }
    Ok(DeclaredHolding {
        entity_id: id,
        name: name.to_string(),
        ownership_pct: pct,
    })
}

/// Parse a batch file of `ID,NAME` lines; blank lines and `#` comments are skipped
fn parse_batch(contents: &str) -> anyhow::Result<Vec<IngestRequest>> {
    contents
        .lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| {
            let (id, name) = line
                .split_once(',')
                .ok_or_else(|| anyhow::anyhow!("line {}: expected ID,NAME", n))?;
            let name = name.trim().trim_matches('"');
            if name.is_empty() {
                anyhow::bail!("line {}: missing name", n);
            }
            Ok(IngestRequest::new(id.trim(), name))
        })
        .collect()
}

#[tokio::main]
async fn main() {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let level = if cli.verbose { "ownergraph=debug" } else { "ownergraph=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();

    if let Err(e) = run(cli).await {
        report_error(&e);
        std::process::exit(1);
    }
}

fn report_error(e: &anyhow::Error) {
    match e.downcast_ref::<ownergraph_core::Error>() {
        Some(core) => {
            eprintln!("Error [{}]: {}", core.code(), core);
            if let Some(suggestion) = core.suggestion() {
                eprintln!("  Try: {}", suggestion);
            }
        }
        None => eprintln!("Error: {:#}", e),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let out = Output {
        format: cli.format,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Validate { id } => cmd_validate(&id, out),
        Commands::Config { action } => cmd_config(action, out),
        Commands::Doctor => cmd_doctor(cli.db.as_deref(), out).await,
        command => {
            let config = Config::load()?;
            let db = open_database(cli.db.as_deref(), &config).await?;
            let repo = Arc::new(db.repository());
            let result = match command {
                Commands::Ingest { id, name, holdings } => {
                    let mut request = IngestRequest::new(id, name);
                    request.declared_portfolio = holdings;
                    cmd_ingest(&config, repo, request, out).await
                }
                Commands::IngestMany { file, concurrency } => {
                    cmd_ingest_many(&config, repo, &file, concurrency, out).await
                }
                Commands::Resolve { name, id } => cmd_resolve(repo, &name, id.as_deref(), out).await,
                Commands::Show { id } => cmd_show(repo, &id, out).await,
                Commands::Owners { id } => cmd_related(repo, &id, Direction::Owners, out).await,
                Commands::Holdings { id } => cmd_related(repo, &id, Direction::Holdings, out).await,
                Commands::Network { id, depth } => cmd_network(repo, &id, depth, out).await,
                Commands::Stats => cmd_stats(repo, out).await,
                Commands::Validate { .. } | Commands::Config { .. } | Commands::Doctor => Ok(()),
            };
            db.close().await;
            result
        }
    }
}

// ============================================================================
// Setup
// ============================================================================

#[derive(Clone, Copy)]
struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    fn print_json<T: serde::Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

async fn open_database(path: Option<&Path>, config: &Config) -> anyhow::Result<Database> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.database.path.clone());
    let db = Database::new(
        DatabaseConfig::with_path(path).max_connections(config.database.max_connections),
    )
    .await?;
    Ok(db)
}

/// Collaborators from configuration, degrading when keys are missing
fn build_collaborators(config: &Config) -> Collaborators {
    let llm: Option<Arc<dyn JsonCompletion>> = match LlmClient::from_env(config.llm.clone()) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!(error = %e, "Language model not configured");
            None
        }
    };

    let web: Arc<dyn WebIntelligence> = match (TavilySearch::from_env(&config.search), &llm) {
        (Ok(search), Some(llm)) => Arc::new(LlmWebIntelligence::new(Arc::new(search), llm.clone())),
        (Err(e), _) => Arc::new(UnavailableWeb::new(e.to_string())),
        (Ok(_), None) => Arc::new(UnavailableWeb::new(format!(
            "{} is not set",
            config.llm.api_key_env
        ))),
    };

    let documents: Arc<dyn DocumentSource> = match (&config.documents.reports_dir, &llm) {
        (Some(dir), Some(llm)) => Arc::new(
            ReportDirectory::new(dir, llm.clone())
                .with_max_chars(config.documents.max_report_chars),
        ),
        (Some(dir), None) => {
            warn!(reports_dir = %dir.display(), "Reports need a language model; ignoring them");
            Arc::new(NoDocuments)
        }
        (None, _) => Arc::new(NoDocuments),
    };

    Collaborators::new(documents, web)
}

fn build_service(
    config: &Config,
    repo: Arc<SqliteOwnershipGraphRepository>,
) -> IngestionService<SqliteOwnershipGraphRepository> {
    IngestionService::with_settings(repo, build_collaborators(config), config.ingestion.settings())
}

fn parse_id(raw: &str) -> anyhow::Result<OrgNumber> {
    Ok(OrgNumber::parse(raw)?)
}

fn format_pct(pct: Option<f64>) -> String {
    pct.map(|p| format!(" {:.1}%", p)).unwrap_or_default()
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_ingest(
    config: &Config,
    repo: Arc<SqliteOwnershipGraphRepository>,
    request: IngestRequest,
    out: Output,
) -> anyhow::Result<()> {
    let service = build_service(config, repo);
    let result = service.ingest_request(request).await?;

    if out.json() {
        return out.print_json(&result);
    }
    if !out.quiet {
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &IngestionResult) {
    println!("Ingested {}", result.entity_id);
    println!("  Holdings: {}", result.portfolio.len());
    for item in &result.portfolio {
        println!(
            "    - {} ({}) [{}]{}",
            item.name,
            item.entity_id,
            item.role,
            format_pct(item.ownership_pct)
        );
    }
    println!("  Companies processed: {}", result.companies_processed);
    println!(
        "  Investors: {} discovered, {} linked",
        result.investors_discovered, result.investors_linked
    );

    let degraded: Vec<_> = result
        .events
        .iter()
        .filter(|e| e.event_type_name() == "collaborator_degraded")
        .collect();
    if !degraded.is_empty() {
        println!("  Degraded lookups: {}", degraded.len());
    }
}

async fn cmd_ingest_many(
    config: &Config,
    repo: Arc<SqliteOwnershipGraphRepository>,
    file: &Path,
    concurrency: Option<usize>,
    out: Output,
) -> anyhow::Result<()> {
    let contents = tokio::fs::read_to_string(file).await?;
    let requests = parse_batch(&contents)?;
    if requests.is_empty() {
        anyhow::bail!("{} has no entries", file.display());
    }

    let concurrency = concurrency.unwrap_or(config.ingestion.max_concurrent_runs);
    info!(entries = requests.len(), concurrency, "Batch ingestion started");

    let service = Arc::new(build_service(config, repo));
    let results = service.ingest_many(requests, concurrency).await;

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    if out.json() {
        let report: Vec<_> = results
            .iter()
            .map(|(id, result)| match result {
                Ok(result) => serde_json::json!({"entity_id": id, "result": result}),
                Err(e) => serde_json::json!({"entity_id": id, "error": e.to_string(), "code": e.code()}),
            })
            .collect();
        out.print_json(&report)?;
    } else if !out.quiet {
        for (id, result) in &results {
            match result {
                Ok(r) => println!(
                    "[OK] {} - {} holdings, {} investors linked",
                    id,
                    r.portfolio.len(),
                    r.investors_linked
                ),
                Err(e) => println!("[!!] {} - {}", id, e),
            }
        }
        println!();
        println!("{} ingested, {} failed", results.len() - failed, failed);
    }

    if failed > 0 {
        anyhow::bail!("{} of {} ingestions failed", failed, results.len());
    }
    Ok(())
}

async fn cmd_resolve(
    repo: Arc<SqliteOwnershipGraphRepository>,
    name: &str,
    hint: Option<&str>,
    out: Output,
) -> anyhow::Result<()> {
    let resolution = EntityResolver::new(repo).resolve(name, hint).await?;

    match resolution {
        Resolution::Found { entity, matched_by } => {
            if out.json() {
                return out.print_json(&serde_json::json!({
                    "entity_id": entity.entity_id,
                    "name": entity.name,
                    "role": entity.role(),
                    "matched_by": matched_by,
                }));
            }
            println!("{} ({}) [{}]", entity.name, entity.entity_id, entity.role());
            if !out.quiet {
                println!("  Matched by: {:?}", matched_by);
            }
            Ok(())
        }
        Resolution::NotFound => {
            if out.json() {
                return out.print_json(&serde_json::Value::Null);
            }
            anyhow::bail!("No entity matches '{}'", name)
        }
    }
}

async fn cmd_show(
    repo: Arc<SqliteOwnershipGraphRepository>,
    id: &str,
    out: Output,
) -> anyhow::Result<()> {
    let id = parse_id(id)?;
    let entity = repo
        .get_entity(&id)
        .await?
        .ok_or_else(|| ownergraph_core::Error::EntityNotFound(id.to_string()))?;

    if out.json() {
        return out.print_json(&entity);
    }

    let attrs = &entity.attributes;
    println!("{} ({})", entity.name, entity.entity_id);
    println!("  Role: {}", entity.role());
    println!("  Country: {}", entity.country_code);
    if let Some(description) = &attrs.description {
        println!("  Description: {}", description);
    }
    if let Some(mission) = &attrs.mission {
        println!("  Mission: {}", mission);
    }
    if let Some(thesis) = &attrs.investment_thesis {
        println!("  Investment thesis: {}", thesis);
    }
    if let Some(website) = &attrs.website {
        println!("  Website: {}", website);
    }
    if let Some(year) = attrs.founded_year {
        println!("  Founded: {}", year);
    }
    if let Some(count) = attrs.employee_count {
        println!("  Employees: {}", count);
    }
    for (label, set) in [
        ("Sectors", &attrs.sectors),
        ("Key people", &attrs.key_people),
        ("Aliases", &attrs.aliases),
    ] {
        if !set.is_empty() {
            println!("  {}: {}", label, set.iter().cloned().collect::<Vec<_>>().join(", "));
        }
    }
    if !entity.portfolio.is_empty() {
        println!("  Portfolio ({}):", entity.portfolio.len());
        for item in &entity.portfolio {
            println!(
                "    - {} ({}){}",
                item.name,
                item.entity_id,
                format_pct(item.ownership_pct)
            );
        }
    }
    println!("  Updated: {}", entity.updated_at.format("%Y-%m-%d %H:%M:%S"));
    Ok(())
}

#[derive(Clone, Copy)]
enum Direction {
    Owners,
    Holdings,
}

async fn cmd_related(
    repo: Arc<SqliteOwnershipGraphRepository>,
    id: &str,
    direction: Direction,
    out: Output,
) -> anyhow::Result<()> {
    let id = parse_id(id)?;
    if repo.get_entity(&id).await?.is_none() {
        return Err(ownergraph_core::Error::EntityNotFound(id.to_string()).into());
    }

    let related = match direction {
        Direction::Owners => repo.list_owners(&id).await?,
        Direction::Holdings => repo.list_holdings(&id).await?,
    };

    if out.json() {
        let rows: Vec<_> = related
            .iter()
            .map(|h| {
                serde_json::json!({
                    "entity_id": h.entity.entity_id,
                    "name": h.entity.name,
                    "role": h.entity.role(),
                    "share_percentage": h.edge.share_percentage,
                })
            })
            .collect();
        return out.print_json(&rows);
    }

    let label = match direction {
        Direction::Owners => "owners",
        Direction::Holdings => "holdings",
    };
    if related.is_empty() {
        if !out.quiet {
            println!("No known {} of {}.", label, id);
        }
        return Ok(());
    }
    if !out.quiet {
        println!("{} {}:", related.len(), label);
    }
    for h in &related {
        println!(
            "  {} ({}) [{}]{}",
            h.entity.name,
            h.entity.entity_id,
            h.entity.role(),
            format_pct(h.edge.share_percentage)
        );
    }
    Ok(())
}

async fn cmd_network(
    repo: Arc<SqliteOwnershipGraphRepository>,
    id: &str,
    depth: u32,
    out: Output,
) -> anyhow::Result<()> {
    let id = parse_id(id)?;
    let network = repo.network(&id, depth).await?;
    if network.nodes.is_empty() {
        return Err(ownergraph_core::Error::EntityNotFound(id.to_string()).into());
    }

    if out.json() {
        return out.print_json(&network);
    }

    let name_of = |entity_id: &OrgNumber| {
        network
            .nodes
            .iter()
            .find(|n| n.entity_id == *entity_id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| entity_id.to_string())
    };

    println!("Nodes ({}):", network.nodes.len());
    for node in &network.nodes {
        println!(
            "  {}{} ({}) [{}]",
            "  ".repeat(node.distance as usize),
            node.name,
            node.entity_id,
            node.role
        );
    }
    println!("Edges ({}):", network.edges.len());
    for edge in &network.edges {
        println!(
            "  {} -> {}{}",
            name_of(&edge.owner_id),
            name_of(&edge.target_id),
            format_pct(edge.share_percentage)
        );
    }
    Ok(())
}

async fn cmd_stats(repo: Arc<SqliteOwnershipGraphRepository>, out: Output) -> anyhow::Result<()> {
    let stats = repo.stats().await?;
    if out.json() {
        return out.print_json(&stats);
    }
    println!("Entities: {}", stats.total_entities);
    println!("  Funds: {}", stats.total_funds);
    println!("Edges: {}", stats.total_edges);
    println!("  With share: {}", stats.edges_with_share);
    Ok(())
}

fn cmd_validate(id: &str, out: Output) -> anyhow::Result<()> {
    let normalized = normalize_identifier(id)?;
    if out.json() {
        return out.print_json(&serde_json::json!({"input": id, "normalized": normalized}));
    }
    println!("{}", normalized);
    Ok(())
}

fn cmd_config(action: ConfigAction, out: Output) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::load()?;
            let items = config.list()?;
            if out.json() {
                let map: serde_json::Map<_, _> = items
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect();
                return out.print_json(&map);
            }
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Init { force } => {
            let path = Config::config_path()?;
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists. Use --force to overwrite it.",
                    path.display()
                );
            }
            let path = Config::default().save()?;
            if !out.quiet {
                println!("Wrote {}", path.display());
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(db_path: Option<&Path>, out: Output) -> anyhow::Result<()> {
    if !out.quiet {
        println!("ownergraph Health Check");
        println!("=======================");
        println!();
    }

    let mut all_ok = true;

    let config = match Config::load() {
        Ok(config) => {
            if !out.quiet {
                println!("[OK] Configuration: Valid");
            }
            config
        }
        Err(e) => {
            println!("[!!] Configuration: Error - {:#}", e);
            println!();
            println!("Some checks failed. See above for details.");
            return Ok(());
        }
    };

    for (label, key, var) in [
        ("LLM API key", config.llm.resolved_api_key(), &config.llm.api_key_env),
        ("Search API key", config.search.resolved_api_key(), &config.search.api_key_env),
    ] {
        match key {
            Ok(Some(_)) => {
                if !out.quiet {
                    println!("[OK] {}: Configured", label);
                }
            }
            Ok(None) => {
                all_ok = false;
                println!("[!!] {}: Not configured", label);
                println!("     Set the {} environment variable", var);
            }
            Err(e) => {
                all_ok = false;
                println!("[!!] {}: Error - {}", label, e);
            }
        }
    }

    match &config.documents.reports_dir {
        Some(dir) if dir.is_dir() => {
            if !out.quiet {
                println!("[OK] Reports: {}", dir.display());
            }
        }
        Some(dir) => {
            all_ok = false;
            println!("[!!] Reports: {} is not a directory", dir.display());
        }
        None => {
            if !out.quiet {
                println!("[--] Reports: not configured (holdings come only from --holding)");
            }
        }
    }

    match open_database(db_path, &config).await {
        Ok(db) => {
            match db.health_check().await {
                Ok(()) => {
                    if !out.quiet {
                        println!("[OK] Database: Connected");
                        println!("     Path: {}", db.path().display());
                    }
                    match db.migration_status().await {
                        Ok(status) if status.needs_migration => {
                            all_ok = false;
                            println!(
                                "[!!] Database: Migrations pending (v{} -> v{})",
                                status.current_version, status.target_version
                            );
                        }
                        Ok(status) => {
                            if !out.quiet {
                                println!("[OK] Database: Schema v{}", status.current_version);
                            }
                        }
                        Err(e) => {
                            all_ok = false;
                            println!("[!!] Database: Migration check failed - {:#}", e);
                        }
                    }
                    if !out.quiet {
                        if let Ok(stats) = db.repository().stats().await {
                            println!(
                                "     Entities: {}, edges: {}",
                                stats.total_entities, stats.total_edges
                            );
                        }
                    }
                }
                Err(e) => {
                    all_ok = false;
                    println!("[!!] Database: Health check failed - {:#}", e);
                }
            }
            db.close().await;
        }
        Err(e) => {
            all_ok = false;
            println!("[!!] Database: Failed to open - {:#}", e);
        }
    }

    println!();
    if all_ok {
        println!("All checks passed!");
    } else {
        println!("Some checks failed. See above for details.");
    }
    Ok(())
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
