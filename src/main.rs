use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sqlforge::sql::{link, DdlGenerator};
use sqlforge::{compile_catalog, Catalog, Config, Snowflake, SqlDialect};

/// Compile entity metadata into DDL and parameterized SQL
#[derive(Parser, Debug)]
#[command(name = "sqlforge", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "SQLFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Target dialect, overriding the configuration
    #[arg(long, global = true)]
    dialect: Option<SqlDialect>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print CREATE statements for a catalog
    Ddl { catalog: PathBuf },
    /// Print DROP statements for a catalog
    Drop { catalog: PathBuf },
    /// Print the compiled catalog as JSON
    Compile { catalog: PathBuf },
    /// Mint identifiers
    NextId {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(dialect) = cli.dialect {
        config.compiler.dialect = dialect;
    }

    match cli.command {
        Command::Ddl { catalog } => {
            let catalog = read_catalog(&catalog)?;
            let linked = link(&catalog)?;
            let script = DdlGenerator::new(config.compiler.dialect)
                .with_schema_creation(config.compiler.create_schemas)
                .generate_script(&linked)?;
            print!("{}", script);
        }
        Command::Drop { catalog } => {
            let catalog = read_catalog(&catalog)?;
            let linked = link(&catalog)?;
            for statement in DdlGenerator::new(config.compiler.dialect).generate_drop(&linked) {
                println!("{};", statement);
            }
        }
        Command::Compile { catalog } => {
            let catalog = read_catalog(&catalog)?;
            let compiled = compile_catalog(&catalog, &config.compiler)?;
            println!("{}", serde_json::to_string_pretty(&compiled)?);
        }
        Command::NextId { count } => {
            let generator = Snowflake::from_config(&config.snowflake)?;
            for _ in 0..count {
                println!("{}", generator.next_id()?);
            }
        }
    }
    Ok(())
}

fn read_catalog(path: &Path) -> Result<Catalog> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("reading catalog {}", path.display()))?;
    Catalog::from_json(&source).with_context(|| format!("parsing catalog {}", path.display()))
}
