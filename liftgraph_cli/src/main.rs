use clap::{Parser, Subcommand};
use liftgraph_core::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "liftgraph")]
#[command(about = "Workout record graph resolver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSONL file acting as the network source (omit to run offline)
    #[arg(long, global = true)]
    network: Option<PathBuf>,

    /// Cache strategy (cache-only, cache-first, parallel, network-only, adaptive)
    #[arg(long, global = true)]
    strategy: Option<CacheStrategy>,

    /// Fetch deadline in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and publish records from a JSONL file
    Import {
        file: PathBuf,

        /// Write to the network source only, leaving the local cache alone
        #[arg(long)]
        to_network: bool,
    },

    /// Validate every record in a JSONL file
    Validate { file: PathBuf },

    /// Resolve exercise references
    Exercises {
        #[arg(required = true)]
        references: Vec<String>,
    },

    /// Resolve a template and its exercises
    Template { reference: String },

    /// Resolve the newest version of a collection and its content
    Collection { reference: String },

    /// Check whether the local cache holds a record
    Probe { reference: String },

    /// Compact the local cache
    Compact,

    /// Export sets of every cached workout record to CSV
    Export { csv: PathBuf },
}

/// Everything a command needs, built from config plus global flags.
struct Context {
    config: Config,
    provider: Arc<LocalProvider>,
    resolver: ReferenceResolver,
}

impl Context {
    fn new(cli: &Cli) -> Result<Self> {
        let mut config = Config::load()?;
        if let Some(data_dir) = &cli.data_dir {
            config.data.data_dir = data_dir.clone();
        }
        if let Some(network) = &cli.network {
            config.network.source = Some(network.clone());
        }
        if let Some(strategy) = cli.strategy {
            config.fetch.strategy = strategy;
        }
        if let Some(timeout_ms) = cli.timeout_ms {
            if timeout_ms == 0 {
                return Err(Error::Config("--timeout-ms must be greater than 0".into()));
            }
            config.fetch.timeout_ms = timeout_ms;
        }

        let provider = Arc::new(LocalProvider::in_data_dir(
            &config.data.data_dir,
            config.network.source.clone(),
        ));
        let resolver = ReferenceResolver::from_config(provider.clone(), &config);
        resolver.selector().set_online(provider.has_network());

        tracing::debug!(
            "Using data dir {:?}, strategy {}, network {:?}",
            config.data.data_dir,
            config.fetch.strategy,
            config.network.source
        );
        Ok(Self {
            config,
            provider,
            resolver,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    liftgraph_core::logging::init();

    let cli = Cli::parse();
    let ctx = Context::new(&cli)?;

    match &cli.command {
        Commands::Import { file, to_network } => cmd_import(&ctx, file, *to_network).await,
        Commands::Validate { file } => cmd_validate(file),
        Commands::Exercises { references } => cmd_exercises(&ctx, references).await,
        Commands::Template { reference } => cmd_template(&ctx, reference).await,
        Commands::Collection { reference } => cmd_collection(&ctx, reference).await,
        Commands::Probe { reference } => cmd_probe(&ctx, reference).await,
        Commands::Compact => cmd_compact(&ctx),
        Commands::Export { csv } => cmd_export(&ctx, csv),
    }
}

fn read_input(file: &Path) -> Result<Vec<RawRecord>> {
    if !file.exists() {
        return Err(Error::Config(format!("input file {:?} does not exist", file)));
    }
    JsonlRecordStore::new(file).read_all()
}

async fn cmd_import(ctx: &Context, file: &Path, to_network: bool) -> Result<()> {
    let records = read_input(file)?;

    let mut valid = Vec::new();
    let mut rejected = 0;
    for record in records {
        let result = validate(&record);
        if result.is_valid {
            valid.push(record);
        } else {
            rejected += 1;
            eprintln!("✗ {} rejected: {}", record.id, result.errors.join("; "));
        }
    }

    if to_network {
        let network = ctx.provider.network().ok_or_else(|| {
            Error::Config("--to-network requires a network source (--network)".into())
        })?;
        let added = network.insert_new(&valid)?;
        println!("✓ Imported {} records to network ({} rejected)", added, rejected);
    } else {
        for record in &valid {
            ctx.resolver.selector().publish(record).await?;
        }
        println!("✓ Imported {} records ({} rejected)", valid.len(), rejected);
    }

    Ok(())
}

fn cmd_validate(file: &Path) -> Result<()> {
    let records = read_input(file)?;

    let mut invalid = 0;
    for record in &records {
        let result = validate(record);
        let kind = record
            .record_kind()
            .map(|k| k.to_string())
            .unwrap_or_else(|| record.kind.to_string());
        if result.is_valid {
            println!("✓ {} [{}]", record.id, kind);
        } else {
            invalid += 1;
            println!("✗ {} [{}]", record.id, kind);
        }
        for error in &result.errors {
            println!("    error: {}", error);
        }
        for warning in &result.warnings {
            println!("    warning: {}", warning);
        }
    }

    println!();
    println!("{} records, {} invalid", records.len(), invalid);

    if invalid > 0 {
        return Err(Error::Other(format!("{} invalid records", invalid)));
    }
    Ok(())
}

async fn cmd_exercises(ctx: &Context, references: &[String]) -> Result<()> {
    let resolved = ctx.resolver.resolve_exercises(references).await?;

    if resolved.items.is_empty() {
        println!("No exercises found.");
    }
    for exercise in &resolved.items {
        display_exercise(exercise);
    }
    display_diagnostics(&resolved.diagnostics);
    Ok(())
}

async fn cmd_template(ctx: &Context, reference: &str) -> Result<()> {
    let single = match ctx.resolver.resolve_single_template(reference).await? {
        Some(single) => single,
        None => {
            println!("Template not found: {}", reference);
            return Ok(());
        }
    };

    let template = &single.template;
    println!("\n{}", template.title);
    if let Some(workout_type) = template.workout_type {
        println!("  Type: {}", workout_type.as_str());
    }
    if let Some(duration) = template.duration_seconds {
        println!("  Duration: ~{} min", duration / 60);
    }
    println!("  Total sets: {}", template.total_sets());
    println!();

    for entry in &template.exercises {
        match single.exercise_for(&entry.reference) {
            Some(exercise) => {
                println!("  {} × {} sets", exercise.title, entry.sets);
                let interpretation = interpret(&entry.params, exercise);
                for (name, param) in &interpretation.parameters {
                    let mark = if param.is_valid { "" } else { "  (invalid)" };
                    println!("    {}: {} {}{}", name, param.value, param.unit, mark);
                }
                for warning in interpretation.warnings.iter().chain(&interpretation.errors) {
                    println!("    ! {}", warning);
                }
            }
            None => println!("  {} × {} sets (not found)", entry.reference, entry.sets),
        }
    }
    display_diagnostics(&single.diagnostics);

    println!("\nResolved in {}ms", single.elapsed_ms);
    Ok(())
}

async fn cmd_collection(ctx: &Context, reference: &str) -> Result<()> {
    let (collection, content) = match ctx.resolver.resolve_collection_by_ref(reference).await? {
        Some(found) => found,
        None => {
            println!("Collection not found: {}", reference);
            return Ok(());
        }
    };

    println!("\n{}", collection.title);
    if !collection.description.is_empty() {
        println!("  {}", collection.description);
    }
    println!();
    println!("Templates ({}):", content.templates.len());
    for template in &content.templates {
        println!("  {} ({} sets)", template.title, template.total_sets());
    }
    println!("Exercises ({}):", content.exercises.len());
    for exercise in &content.exercises {
        println!("  {}", exercise.title);
    }
    display_diagnostics(&content.diagnostics);
    Ok(())
}

async fn cmd_probe(ctx: &Context, reference: &str) -> Result<()> {
    let reference = match Reference::parse(reference) {
        Ok(reference) => reference,
        Err(e) => {
            println!("✗ {}", ReferenceDiagnostic::new(reference, &e));
            return Ok(());
        }
    };

    let filter = Filter::new()
        .kind(reference.kind())
        .author(reference.authority())
        .identifiers([reference.identifier()]);
    let availability = ctx.resolver.selector().check_availability(&[filter]).await;

    if availability.available {
        println!("✓ {} cached ({} versions)", reference, availability.count);
    } else {
        println!("✗ {} not in cache", reference);
    }
    Ok(())
}

fn cmd_compact(ctx: &Context) -> Result<()> {
    let store = ctx.provider.cache();
    let dropped = store.compact()?;
    println!("✓ Compacted cache, dropped {} records", dropped);
    println!("  Store: {}", store.path().display());
    Ok(())
}

fn cmd_export(ctx: &Context, csv_path: &Path) -> Result<()> {
    let filter = Filter::new().kind(RecordKind::WorkoutRecord);
    let raw = ctx.provider.cache().query(&[filter])?;

    let parser = RecordParser::new(ctx.config.cache.parse_cache_capacity);
    let mut records = Vec::new();
    for record in &raw {
        records.extend(parser.parse_workout_record(record)?);
    }
    records.sort_by_key(|r| r.started_at);

    let count = workout_sets_to_csv(&records, csv_path)?;
    let volume: f64 = records.iter().map(WorkoutRecord::total_volume).sum();

    println!("✓ Exported {} sets from {} workouts", count, records.len());
    println!("  Total volume: {:.1}", volume);
    println!("  CSV: {}", csv_path.display());
    Ok(())
}

fn display_exercise(exercise: &Exercise) {
    println!("\n{}", exercise.title);
    println!("  Equipment: {}", exercise.equipment);
    if let Some(difficulty) = &exercise.difficulty {
        println!("  Difficulty: {}", difficulty);
    }
    let schema: Vec<String> = exercise
        .format
        .iter()
        .zip(&exercise.format_units)
        .map(|(name, unit)| format!("{} ({})", name, unit))
        .collect();
    println!("  Parameters: {}", schema.join(", "));
    if !exercise.description.is_empty() {
        println!("  {}", exercise.description);
    }
}

fn display_diagnostics(diagnostics: &[ReferenceDiagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    println!("\nSkipped references:");
    for diagnostic in diagnostics {
        let marker = if diagnostic.corrupted { " [corrupted]" } else { "" };
        println!("  - {}{}", diagnostic, marker);
    }
}

