//! amlq: translate item queries between AML, SQL, OData and stored queries.
//!
//! # Usage
//!
//! ```bash
//! # AML to SQL
//! amlq aml "<Item type='Part' action='get'><state>Released</state></Item>"
//!
//! # SQL WHERE fragment to AML
//! amlq where --type Part "state = 'Released' and cost > 10" --to aml
//!
//! # Stored query file to OData, with item metadata
//! amlq --schema schema.toml qdef saved_query.xml --to odata
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;

use aml_query::prelude::*;
use aml_query::search::{SearchCondition, SimpleSearchParser};

#[derive(Parser)]
#[command(name = "amlq")]
#[command(version)]
#[command(about = "Translate item queries between AML, SQL, OData and stored query definitions", long_about = None)]
#[command(after_help = "EXAMPLES:
    amlq aml query.xml --to odata
    amlq where --type Part \"state = 'Released'\" --to qdef
    amlq search --type Part --property cost \"5...10\"
    amlq pattern \"%ab_c%\" --from sql --to regex")]
struct Cli {
    /// Item type metadata (TOML or JSON)
    #[arg(long, global = true, env = "AMLQ_SCHEMA")]
    schema: Option<PathBuf>,

    /// Settings file (defaults to ./amlq.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Sql,
    Odata,
    Aml,
    Qdef,
}

#[derive(Clone, Copy, ValueEnum)]
enum PatternSyntax {
    Sql,
    Aml,
    Search,
    Vb,
    Regex,
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Output dialect
    #[arg(short, long, value_enum, default_value = "sql")]
    to: OutputFormat,

    /// Normalize criteria before rendering
    #[arg(short, long)]
    normalize: bool,

    /// SQL dialect, overriding the settings file
    #[arg(long)]
    dialect: Option<Dialect>,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate an AML query (inline, a file path, or stdin)
    Aml {
        input: Option<String>,
        #[command(flatten)]
        render: RenderArgs,
    },
    /// Translate a stored qry_QueryDefinition document
    Qdef {
        input: Option<String>,
        #[command(flatten)]
        render: RenderArgs,
    },
    /// Translate a SQL WHERE fragment over one item type
    Where {
        #[arg(long = "type")]
        item_type: String,
        sql: String,
        #[command(flatten)]
        render: RenderArgs,
    },
    /// Parse search-box text for one property
    Search {
        #[arg(long = "type")]
        item_type: String,
        #[arg(short, long)]
        property: String,
        /// Data type of the property, overriding the schema
        #[arg(long, value_parser = parse_data_type)]
        data_type: Option<DataType>,
        /// Explicit condition (equal, like, between, in, is_null, ...)
        #[arg(short, long)]
        condition: Option<String>,
        text: String,
        #[command(flatten)]
        render: RenderArgs,
    },
    /// Convert a pattern between wildcard and regex syntaxes
    Pattern {
        text: String,
        #[arg(long, value_enum, default_value = "sql")]
        from: PatternSyntax,
        #[arg(long, value_enum, default_value = "regex")]
        to: PatternSyntax,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "aml_query=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("AMLQ_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    let schema = match &cli.schema {
        Some(path) => Schema::load(path)
            .with_context(|| format!("loading schema {}", path.display()))?,
        None => Schema::new(),
    };

    match &cli.command {
        Commands::Aml { input, render } => {
            let text = read_input(input.as_deref())?;
            let query = parse_aml(&text)?;
            emit(cli, query, &schema, settings, render)
        }
        Commands::Qdef { input, render } => {
            let text = read_input(input.as_deref())?;
            let query = parse_query_definition(&text)?;
            emit(cli, query, &schema, settings, render)
        }
        Commands::Where {
            item_type,
            sql,
            render,
        } => {
            let mut query = Query::new(item_type.as_str());
            let root = query.root();
            let filter = parse_where(&query, root, sql)?;
            query[root].filter = Some(filter);
            emit(cli, query, &schema, settings, render)
        }
        Commands::Search {
            item_type,
            property,
            data_type,
            condition,
            text,
            render,
        } => {
            let condition = condition
                .as_deref()
                .map(str::parse::<SearchCondition>)
                .transpose()?;
            let mut query = Query::new(item_type.as_str());
            let root = query.root();
            let property = PropertyRef::new(root, property.as_str());
            let parsed = match data_type {
                Some(data_type) => {
                    let mut parser = SimpleSearchParser::new(&settings.search, data_type.clone());
                    if let Some(condition) = condition {
                        parser = parser.with_condition(condition);
                    }
                    parser.parse(&property, text)?
                }
                None => {
                    let ctx = QueryContext::new(&schema).with_settings(settings.clone());
                    parse_simple_search(&ctx, &query, &property, condition, text)?
                }
            };
            let Some(filter) = parsed else {
                println!("{}", "(empty search)".dimmed());
                return Ok(());
            };
            query[root].filter = Some(filter);
            emit(cli, query, &schema, settings, render)
        }
        Commands::Pattern { text, from, to } => {
            let pattern = match from {
                PatternSyntax::Regex => PatternList::parse_regex(text)?,
                syntax => PatternList::parse_wildcard(text, &wildcard_syntax(*syntax))?,
            };
            let rendered = match to {
                PatternSyntax::Regex => pattern.render_regex(),
                syntax => pattern.render_wildcard(&wildcard_syntax(*syntax))?,
            };
            println!("{}", rendered);
            Ok(())
        }
    }
}

fn emit(
    cli: &Cli,
    mut query: Query,
    schema: &Schema,
    mut settings: Settings,
    render: &RenderArgs,
) -> Result<()> {
    if let Some(dialect) = render.dialect {
        settings.dialect = dialect;
    }
    if render.normalize {
        query.normalize()?;
    }
    let ctx = QueryContext::new(schema).with_settings(settings);
    if cli.verbose {
        let root_type = ctx
            .table_type_name(&query, query.root())
            .unwrap_or_default();
        eprintln!(
            "{} {} table(s), root {}",
            "Query:".dimmed(),
            query.table_count(),
            root_type.as_str().yellow()
        );
    }

    let output = match render.to {
        OutputFormat::Sql => query.to_sql(&ctx)?,
        OutputFormat::Odata => to_odata_query(&ctx, &query)?,
        OutputFormat::Aml => query.to_aml(&ctx)?,
        OutputFormat::Qdef => to_query_definition(&ctx, &query)?,
    };
    println!("{}", output);
    Ok(())
}

fn parse_data_type(name: &str) -> Result<DataType, String> {
    Ok(DataType::from(name))
}

fn wildcard_syntax(syntax: PatternSyntax) -> WildcardSyntax {
    match syntax {
        PatternSyntax::Sql | PatternSyntax::Regex => WildcardSyntax::SQL_SERVER,
        PatternSyntax::Aml => WildcardSyntax::AML,
        PatternSyntax::Search => WildcardSyntax::SIMPLE_SEARCH,
        PatternSyntax::Vb => WildcardSyntax::VISUAL_BASIC,
    }
}

/// Inline XML, a file path, or stdin when absent or `-`.
fn read_input(input: Option<&str>) -> Result<String> {
    match input {
        None | Some("-") => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading stdin")?;
            Ok(text)
        }
        Some(text) if text.trim_start().starts_with('<') => Ok(text.to_string()),
        Some(path) => {
            let path = Path::new(path);
            if !path.exists() {
                bail!("'{}' is neither XML nor an existing file", path.display());
            }
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
        }
    }
}
