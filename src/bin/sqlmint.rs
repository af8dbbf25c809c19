//! sqlmint — dry-run CLI
//!
//! Shows the SQL and parameters a statement resolves to, without touching a
//! database.
//!
//! # Usage
//!
//! ```bash
//! # Resolve a configured statement
//! sqlmint render user.by_id --config sqlmint.toml --arg id=42
//!
//! # Compile ad-hoc SQL for a dialect
//! sqlmint compile "SELECT * FROM t WHERE id = #{id}" --driver postgres
//!
//! # Show the dialect registry
//! sqlmint dialects
//! ```

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use sqlmint::binder::render;
use sqlmint::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlmint")]
#[command(version)]
#[command(about = "Entity-driven SQL with named parameters", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlmint render user.by_id --config sqlmint.toml --arg id=42
    sqlmint compile 'UPDATE t SET a=#{a} WHERE id=#{id}' --driver postgres --start-index 2
    sqlmint dialects")]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a configured statement against arguments
    Render {
        /// Statement identifier
        id: String,

        /// Configuration file (defaults to the user config directory)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the configured driver
        #[arg(short, long, env = "SQLMINT_DRIVER")]
        driver: Option<String>,

        /// Named arguments (name=value)
        #[arg(short, long = "arg", value_name = "NAME=VALUE")]
        args: Vec<String>,
    },
    /// Compile SQL text with #{name} placeholders
    Compile {
        /// The SQL text
        sql: String,

        /// Driver name
        #[arg(short, long, env = "SQLMINT_DRIVER", default_value = "postgres")]
        driver: String,

        /// Offset for dollar numbering
        #[arg(long, default_value_t = 0)]
        start_index: usize,
    },
    /// Show the dialect registry
    Dialects,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Commands::Render {
            id,
            config,
            driver,
            args,
        } => render_statement(id, config.as_ref(), driver.as_deref(), args, &cli.format),
        Commands::Compile {
            sql,
            driver,
            start_index,
        } => compile_sql(sql, driver, *start_index, &cli.format),
        Commands::Dialects => {
            show_dialects();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("SQLMINT_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn render_statement(
    id: &str,
    config: Option<&PathBuf>,
    driver: Option<&str>,
    args: &[String],
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let path = match config {
        Some(path) => path.clone(),
        None => Config::default_path().context("no configuration directory on this platform")?,
    };
    let mut config =
        Config::load(&path).with_context(|| format!("loading {}", path.display()))?;
    if let Some(driver) = driver {
        config.driver = driver.to_string();
    }

    let session = Session::from_config(&config)?;
    let Some(statement) = session.statement(id) else {
        bail!("statement '{}' not found in {}", id, path.display());
    };

    let mut names = Vec::new();
    let mut values = Vec::new();
    for arg in args {
        let Some((name, raw)) = arg.split_once('=') else {
            bail!("argument '{}' is not NAME=VALUE", arg);
        };
        names.push(name);
        values.push(parse_value(raw));
    }

    let bound = session.bind(id, statement.kind, &names, &values)?;

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "id": bound.id,
                "dialect": session.dialect().to_string(),
                "sql": bound.sql,
                "params": bound.params,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => {
            println!("{} {} ({})", "Statement:".dimmed(), id.cyan(), statement.kind);
            println!("{} {}", "Dialect:".dimmed(), session.dialect().to_string().cyan());
            println!();
            println!("{}", "Generated SQL:".green().bold());
            println!("{}", bound.sql.white());
            print_params(session.dialect().bind_style(), config.start_index, &bound.params);
        }
    }
    Ok(())
}

fn compile_sql(sql: &str, driver: &str, start_index: usize, format: &OutputFormat) -> anyhow::Result<()> {
    let dialect = Dialect::from_driver(driver);
    let compiled = compile(sql)?;
    let rendered = render(dialect.bind_style(), &compiled.fragments, start_index);

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "dialect": dialect.to_string(),
                "fragments": compiled.fragments,
                "bind_names": compiled.bind_names,
                "sql": rendered,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => {
            println!("{}", "Fragments:".green().bold());
            for (i, fragment) in compiled.fragments.iter().enumerate() {
                println!("  {:>3} {:?}", i, fragment);
            }
            if !compiled.bind_names.is_empty() {
                println!();
                println!("{}", "Bind names:".cyan());
                for (i, name) in compiled.bind_names.iter().enumerate() {
                    println!("  {} {}", placeholder_label(dialect.bind_style(), start_index, i), name.yellow());
                }
            }
            println!();
            println!("{} {}", "SQL:".green().bold(), rendered.white());
        }
    }
    Ok(())
}

fn print_params(style: BindStyle, start_index: usize, params: &[Value]) {
    if params.is_empty() {
        return;
    }
    println!();
    println!("{}", "Bindings:".cyan());
    for (i, value) in params.iter().enumerate() {
        println!("  {} = {}", placeholder_label(style, start_index, i), value.to_string().yellow());
    }
}

fn placeholder_label(style: BindStyle, start_index: usize, i: usize) -> String {
    match style {
        BindStyle::Question => format!("?{}", i + 1),
        BindStyle::Dollar => format!("${}", i + 1 + start_index),
    }
}

/// Numbers, booleans and `null` are typed; everything else is text.
fn parse_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        Value::Int(n)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Float(f)
    } else if raw == "true" {
        Value::Bool(true)
    } else if raw == "false" {
        Value::Bool(false)
    } else if raw == "null" {
        Value::Null
    } else {
        Value::String(raw.to_string())
    }
}

fn show_dialects() {
    println!("{}", "sqlmint dialects".cyan().bold());
    println!();
    println!(
        "{:10} {:10} {:14} {}",
        "Dialect".white().bold(),
        "Bind".white().bold(),
        "Insert id".white().bold(),
        "Now".white().bold()
    );
    println!("{}", "─".repeat(52).dimmed());

    for dialect in Dialect::ALL {
        let bind = match dialect.bind_style() {
            BindStyle::Question => "?",
            BindStyle::Dollar => "$N",
        };
        let insert_id = match dialect.insert_id() {
            InsertId::Returning => "RETURNING",
            InsertId::LastInsertId => "last insert id",
        };
        println!(
            "{:10} {:10} {:14} {}",
            dialect.to_string().cyan(),
            bind.yellow(),
            insert_id.white(),
            dialect.now().dimmed()
        );
    }
}
