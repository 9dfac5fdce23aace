//! oxide-criteria CLI
//!
//! Renders JSON query descriptions to dialect specific SQL.

mod query;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_criteria_core::dialect::DbmsDialect;
use oxide_criteria_core::metamodel::StaticMetamodel;
use oxide_criteria_core::{CriteriaBuilderFactory, CriteriaConfig, DialectRegistry, SqlStatement};

use crate::query::QueryDescription;

/// Criteria queries rendered to SQL.
#[derive(Parser)]
#[command(name = "oxide-criteria")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a query description to SQL.
    Render {
        /// Dialect name or alias.
        #[arg(short, long, env = "OXIDE_CRITERIA_DIALECT", default_value = "generic")]
        dialect: String,

        /// Metamodel JSON file.
        #[arg(short, long)]
        metamodel: PathBuf,

        /// Query description JSON file.
        #[arg(short, long)]
        query: PathBuf,

        /// Configuration property as KEY=VALUE, may be repeated.
        #[arg(short, long = "property", value_parser = parse_property)]
        properties: Vec<(String, String)>,
    },

    /// List the registered dialects.
    Dialects,
}

fn parse_property(text: &str) -> Result<(String, String), String> {
    text.split_once('=')
        .map(|(key, value)| (String::from(key.trim()), String::from(value.trim())))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{text}'"))
}

fn read(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn print_statement(label: &str, statement: &SqlStatement) {
    println!("{label}:");
    println!("  {}", statement.sql);
    for (position, value) in statement.parameters.iter().enumerate() {
        println!("  ${} = {value}", position + 1);
    }
}

fn render(
    dialect: String,
    metamodel: &Path,
    query: &Path,
    properties: Vec<(String, String)>,
) -> anyhow::Result<()> {
    let mut properties: HashMap<String, String> = properties.into_iter().collect();
    properties.insert(String::from("dialect"), dialect);
    let config = CriteriaConfig::from_properties(&properties)?;

    let metamodel = StaticMetamodel::from_json(&read(metamodel)?)?;
    let factory = CriteriaBuilderFactory::new(config, Arc::new(metamodel))?;
    info!("Rendering for dialect {}", factory.dialect().name());

    let description = QueryDescription::from_json(&read(query)?)
        .with_context(|| format!("parsing {}", query.display()))?;
    debug!("Query description: {description:?}");

    let rendered = description.render(&factory)?;
    print_statement("Query", &rendered.statement);
    if let Some(count) = &rendered.count {
        print_statement("Count", count);
    }
    Ok(())
}

const fn yes_no(supported: bool) -> &'static str {
    if supported {
        "yes"
    } else {
        "no"
    }
}

fn describe(dialect: &dyn DbmsDialect) {
    println!("  with clause:          {}", yes_no(dialect.supports_with_clause()));
    println!(
        "  modification in CTE:  {}",
        yes_no(dialect.supports_modification_query_in_with_clause())
    );
    println!("  returning:            {}", yes_no(dialect.supports_returning_columns()));
    println!("  null precedence:      {}", yes_no(dialect.supports_null_precedence()));
    println!(
        "  row value comparison: {}",
        yes_no(dialect.supports_full_row_value_comparison())
    );
    println!("  limit style:          {:?}", dialect.limit_style());
    println!("  parameter style:      {:?}", dialect.parameter_style());
}

fn list_dialects() {
    let registry = DialectRegistry::standard();
    let mut dialects = registry.dialects();
    dialects.sort_by(|(_, a), (_, b)| a.name().cmp(b.name()));
    for (mut names, dialect) in dialects {
        names.retain(|name| *name != dialect.name());
        names.sort_unstable();
        if names.is_empty() {
            println!("{}", dialect.name());
        } else {
            println!("{} (aliases: {})", dialect.name(), names.join(", "));
        }
        describe(dialect.as_ref());
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Render {
            dialect,
            metamodel,
            query,
            properties,
        } => render(dialect, &metamodel, &query, properties)?,
        Commands::Dialects => list_dialects(),
    }
    Ok(())
}
