//! Compile entity and repository metadata into DDL and parameterized SQL
//!
//! - [`sql`]: metadata model, schema linker, DDL generator, query compiler
//! - [`id`]: Snowflake-style identifier generator used for generated keys
//! - [`config`]: TOML configuration for both

pub mod config;
pub mod id;
pub mod lexer;
pub mod sql;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use config::{Config, ConfigError};
pub use id::{Snowflake, SnowflakeConfig, SnowflakeError};
pub use sql::{
    compile_catalog, Catalog, CompileError, CompileResult, CompiledCatalog, CompilerConfig,
    SqlDialect,
};
