//! WebAssembly bindings for sqlforge
//!
//! # Usage from JavaScript
//!
//! ```javascript
//! import init, { compileCatalog, generateDdl } from 'sqlforge';
//!
//! await init();
//!
//! const result = compileCatalog(JSON.stringify(catalog), 'sqlite');
//! if (result.success) {
//!   console.log(result.ddl);
//!   console.log(result.operations);
//! } else {
//!   console.error(result.error);
//! }
//! ```

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::sql::{compile_catalog, link, Catalog, CompilerConfig, DdlGenerator, SqlDialect};

/// Helper to serialize values as plain JS objects (not Maps)
fn to_js_value<T: Serialize>(value: &T) -> JsValue {
    let serializer = serde_wasm_bindgen::Serializer::new().serialize_maps_as_objects(true);
    value.serialize(&serializer).unwrap_or(JsValue::NULL)
}

fn failure(error: impl std::fmt::Display) -> JsValue {
    to_js_value(&serde_json::json!({
        "success": false,
        "error": error.to_string(),
    }))
}

fn parse_input(json: &str, dialect: &str) -> Result<(Catalog, SqlDialect), String> {
    let dialect: SqlDialect = dialect.parse()?;
    let catalog = Catalog::from_json(json).map_err(|e| format!("Invalid catalog: {}", e))?;
    Ok((catalog, dialect))
}

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Compile a catalog
///
/// Returns `{ success, ddl, operations, error }`.
#[wasm_bindgen(js_name = compileCatalog)]
pub fn compile_catalog_js(json: &str, dialect: &str) -> JsValue {
    let (catalog, dialect) = match parse_input(json, dialect) {
        Ok(input) => input,
        Err(e) => return failure(e),
    };
    let config = CompilerConfig {
        dialect,
        ..Default::default()
    };
    match compile_catalog(&catalog, &config) {
        Ok(compiled) => to_js_value(&serde_json::json!({
            "success": true,
            "ddl": compiled.ddl,
            "operations": compiled.tables,
        })),
        Err(e) => failure(e),
    }
}

/// Generate DDL for a catalog
///
/// Returns `{ success, statements, error }`.
#[wasm_bindgen(js_name = generateDdl)]
pub fn generate_ddl(json: &str, dialect: &str) -> JsValue {
    let (catalog, dialect) = match parse_input(json, dialect) {
        Ok(input) => input,
        Err(e) => return failure(e),
    };
    let statements = link(&catalog).and_then(|linked| DdlGenerator::new(dialect).generate(&linked));
    match statements {
        Ok(statements) => to_js_value(&serde_json::json!({
            "success": true,
            "statements": statements,
        })),
        Err(e) => failure(e),
    }
}
