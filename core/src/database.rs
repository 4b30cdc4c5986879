//! Connection specs and table descriptors

use crate::config::{Config, DatabaseConfig, DatabaseType, TableOverrides};
use crate::error::Result;
use std::fmt;

/// A named database connection
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    pub name: String,
    pub config: DatabaseConfig,
}

impl ConnectionSpec {
    pub fn new(name: impl Into<String>, config: DatabaseConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    /// Resolve a connection by name from configuration
    pub fn from_config(config: &Config, name: &str) -> Result<Self> {
        Ok(Self::new(name, config.connection(name)?.clone()))
    }

    /// A local DuckDB database file
    pub fn duckdb_file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(
            name,
            DatabaseConfig {
                db_type: DatabaseType::Duckdb,
                connection_string: None,
                host: None,
                port: None,
                database: Some(path.into()),
                username: None,
                password_env: None,
            },
        )
    }

    /// Create a DuckDB ATTACH statement for this database
    pub fn create_attach_statement(&self, alias: &str) -> Result<String> {
        let target = self
            .config
            .build_connection_string()?
            .replace('\'', "''");
        let alias = quote_identifier(alias);
        let statement = match self.config.db_type {
            DatabaseType::Mysql => format!("ATTACH '{target}' AS {alias} (TYPE mysql);"),
            DatabaseType::Postgresql => format!("ATTACH '{target}' AS {alias} (TYPE postgres);"),
            DatabaseType::Sqlite => format!("ATTACH '{target}' AS {alias} (TYPE sqlite);"),
            DatabaseType::Duckdb => format!("ATTACH '{target}' AS {alias};"),
        };
        Ok(statement)
    }

    /// Schema a table lives in when the descriptor does not name one
    pub fn default_schema(&self) -> String {
        match self.config.db_type {
            DatabaseType::Postgresql => "public".to_string(),
            DatabaseType::Mysql => self
                .config
                .database
                .clone()
                .or_else(|| {
                    self.config
                        .connection_string
                        .as_deref()
                        .and_then(extract_database_name)
                })
                .unwrap_or_else(|| "main".to_string()),
            DatabaseType::Sqlite | DatabaseType::Duckdb => "main".to_string(),
        }
    }
}

impl fmt::Display for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}: {})",
            self.name,
            self.config.db_type,
            self.config.redacted_connection_string()
        )
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseType::Mysql => write!(f, "mysql"),
            DatabaseType::Postgresql => write!(f, "postgresql"),
            DatabaseType::Sqlite => write!(f, "sqlite"),
            DatabaseType::Duckdb => write!(f, "duckdb"),
        }
    }
}

/// Last path segment of a URL-style connection string
fn extract_database_name(connection_string: &str) -> Option<String> {
    let after_scheme = connection_string.split("://").nth(1)?;
    let path = after_scheme.split('/').nth(1)?;
    let name = path.split('?').next()?;
    (!name.is_empty()).then(|| name.to_string())
}

/// The table a session reconciles
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    pub name: String,
    pub schema: Option<String>,
    pub full_name: String,
    pub overrides: TableOverrides,
}

impl TableDescriptor {
    /// Parse `table` or `schema.table`
    pub fn parse(full_name: &str) -> Self {
        let (schema, name) = match full_name.split_once('.') {
            Some((schema, name)) => (Some(schema.to_string()), name.to_string()),
            None => (None, full_name.to_string()),
        };
        Self {
            name,
            schema,
            full_name: full_name.to_string(),
            overrides: TableOverrides::default(),
        }
    }

    /// Parse a table name and attach its configured overrides, if any
    pub fn from_config(config: &Config, full_name: &str) -> Self {
        let overrides = config
            .table_overrides(full_name)
            .cloned()
            .unwrap_or_default();
        Self::parse(full_name).with_overrides(overrides)
    }

    pub fn with_overrides(mut self, overrides: TableOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn schema_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.schema.as_deref().unwrap_or(default)
    }

    /// Fully quoted `catalog.schema.table` reference
    pub fn qualified_name(&self, catalog: &str, default_schema: &str) -> String {
        format!(
            "{}.{}.{}",
            quote_identifier(catalog),
            quote_identifier(self.schema_or(default_schema)),
            quote_identifier(&self.name)
        )
    }
}

impl fmt::Display for TableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name)
    }
}

/// Quote an identifier for DuckDB SQL
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
