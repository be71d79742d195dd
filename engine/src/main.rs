//! Metamodel CLI - inspect and load model definitions
//!
//! # Commands
//!
//! ```bash
//! metamodel fields works.json             # Field catalogue with settings
//! metamodel load works.json               # Load rows as JSON
//! metamodel load works.json --filter '{"kind": "song"}' --page 1 --size 20
//! metamodel format works.json             # Load rows formatted for display
//! metamodel types                         # Registered types and classes
//! metamodel example-definition            # Show an example definition
//! ```

use clap::{Parser, Subcommand};
use metamodel::{
    example_definition, filter::sort_from_json, logs, BaseType, DisplayBridge, EngineConfig, Filter, FormatMode, Model,
    ModelLoader, Setting, Sort,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "metamodel")]
#[command(about = "Inspect and load metadata-driven model definitions", long_about = None)]
struct Cli {
    /// JSON configuration file (environment variables still apply)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the fields of a model definition with their settings
    Fields {
        /// Model definition JSON file
        definition: PathBuf,
    },

    /// Load rows through the full pipeline and output JSON
    Load {
        /// Model definition JSON file
        definition: PathBuf,

        /// Filter as JSON, e.g. '{"c": {"min": 20, "max": 30}}'
        #[arg(short, long)]
        filter: Option<String>,

        /// Sort as JSON, e.g. '{"title": "desc"}'
        #[arg(short, long)]
        sort: Option<String>,

        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: usize,

        /// Page size (0 = all rows)
        #[arg(long, default_value = "0")]
        size: usize,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load rows and output their display values
    Format {
        /// Model definition JSON file
        definition: PathBuf,

        /// Filter as JSON
        #[arg(short, long)]
        filter: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show registered types, dependency and transformer classes
    Types,

    /// Show example model definition
    ExampleDefinition,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref(), cli.log_level.as_deref()).and_then(|config| {
        match cli.command {
            Commands::Fields { definition } => cmd_fields(&config, &definition),

            Commands::Load {
                definition,
                filter,
                sort,
                page,
                size,
                output,
            } => cmd_load(
                &config,
                &definition,
                filter.as_deref(),
                sort.as_deref(),
                page,
                size,
                output.as_deref(),
            ),

            Commands::Format {
                definition,
                filter,
                output,
            } => cmd_format(&config, &definition, filter.as_deref(), output.as_deref()),

            Commands::Types => cmd_types(&config),

            Commands::ExampleDefinition => cmd_example_definition(),
        }
    });

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>, log_level: Option<&str>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    config.apply_env(|key| std::env::var(format!("{}{}", metamodel::config::ENV_PREFIX, key)).ok())?;
    if let Some(level) = log_level {
        config.log_level = level.to_string();
    }
    logs::init(config.log_level())?;
    Ok(config)
}

fn open_model(config: &EngineConfig, definition: &Path) -> Result<Model, Box<dyn std::error::Error>> {
    eprintln!("📄 Model: {}", definition.display());
    Ok(ModelLoader::new(config).load_file(definition)?)
}

fn parse_filter(filter: Option<&str>) -> Result<Filter, Box<dyn std::error::Error>> {
    match filter {
        Some(json) => Ok(Filter::from_json(&serde_json::from_str(json)?)?),
        None => Ok(Filter::new()),
    }
}

fn describe_setting(setting: &Setting) -> Value {
    match setting {
        Setting::Value(value) => value.to_json(),
        Setting::Function(_) => Value::String("<function>".to_string()),
    }
}

fn cmd_fields(config: &EngineConfig, definition: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let model = open_model(config, definition)?;
    let meta = model.meta();

    eprintln!("   Keys: {}", meta.keys().join(", "));
    eprintln!("   Storage: {}", model.storage().name());
    eprintln!();

    for name in meta.items_ordered() {
        let base = meta.base_type(name).map(BaseType::name).unwrap_or("-");
        println!("  {} ({})", name, base);
        for (key, setting) in meta.get_all(name) {
            println!("     {}: {}", key, describe_setting(&setting));
        }
    }
    Ok(())
}

fn cmd_load(
    config: &EngineConfig,
    definition: &Path,
    filter: Option<&str>,
    sort: Option<&str>,
    page: usize,
    size: usize,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut model = open_model(config, definition)?;
    let filter = parse_filter(filter)?;
    let sort: Sort = match sort {
        Some(json) => sort_from_json(&serde_json::from_str(json)?)?,
        None => Sort::new(),
    };

    let (rows, total) = model.load_page_with_count(page, size, &filter, &sort)?;
    eprintln!("✅ Loaded {} of {} rows", rows.len(), total);

    let json = serde_json::to_string_pretty(&metamodel::rows_to_json(&rows))?;
    write_output(&json, output)
}

fn cmd_format(
    config: &EngineConfig,
    definition: &Path,
    filter: Option<&str>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut model = open_model(config, definition)?;
    let rows = model.load(&parse_filter(filter)?, &Sort::new())?;
    eprintln!("✅ Loaded {} rows", rows.len());

    let mut bridge = DisplayBridge::new(model.meta(), rows, FormatMode::EagerSingleRow);
    let mut formatted = Vec::new();
    while bridge.cursor().is_valid() {
        formatted.push(bridge.formatted_row());
        bridge.cursor_mut().advance();
    }

    let json = serde_json::to_string_pretty(&metamodel::rows_to_json(&formatted))?;
    write_output(&json, output)
}

fn cmd_types(config: &EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let loader = ModelLoader::new(config);

    println!("Field types:");
    for name in loader.types().names() {
        println!("  {}", name);
    }
    println!("\nBase types:");
    for base in BaseType::ALL {
        println!("  {} = {}", base.name(), base.code());
    }
    println!("\nDependencies:");
    for class in loader.dependency_classes() {
        println!("  {}", class);
    }
    println!("\nTransformers:");
    for class in loader.transformer_classes() {
        println!("  {}", class);
    }
    Ok(())
}

fn cmd_example_definition() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&example_definition())?);
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
