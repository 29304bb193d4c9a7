//! Introspect - Generate pearls from a live database schema
//!
//! A driver hands back `schema -> tables`; [`generate_pearls`] turns that
//! into one database pearl, one pearl per schema and one per table:
//!
//! ```text
//! mydb                 (database, connection host = ${ENV_VAR})
//! mydb.main            (schema, parent = mydb)
//! mydb.main.orders     (table, parent = mydb.main, references from FKs)
//! ```
//!
//! Only SQLite is implemented; it rides on the index's own engine.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;

use super::error::{Error, Result, ResultExt};
use super::pearl::{ConnectionInfo, Pearl, PearlType, Status};

/// `created_by` stamped on generated pearls
pub const CREATED_BY: &str = "pearls-introspect";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: String,
    pub primary_key: bool,
    pub constraints: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
    /// Empty means the owning table's schema
    pub references_schema: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub name: String,
    pub schema: String,
    pub columns: Vec<Column>,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<Index>,
}

/// A schema reader for one database
pub trait Introspector {
    fn schemas(&self) -> Result<Vec<String>>;

    fn tables(&self, schema: &str) -> Result<Vec<Table>>;

    /// Every schema with its tables
    fn introspect(&self) -> Result<BTreeMap<String, Vec<Table>>> {
        let mut out = BTreeMap::new();
        for schema in self.schemas()? {
            let tables = self.tables(&schema)?;
            out.insert(schema, tables);
        }
        Ok(out)
    }
}

/// A generated pearl plus its markdown body
#[derive(Debug, Clone)]
pub struct GeneratedPearl {
    pub pearl: Pearl,
    pub content: String,
}

/// Environment variable conventionally holding a connection string
pub fn default_env_var(kind: &str) -> &'static str {
    match kind.to_ascii_lowercase().as_str() {
        "postgres" => "PEARLS_POSTGRES_URL",
        "mysql" => "PEARLS_MYSQL_URL",
        "sqlite" => "PEARLS_SQLITE_PATH",
        _ => "",
    }
}

/// Turn a database identifier into a valid ID segment:
/// lowercased, other characters mapped to `_`, letter-led.
pub fn id_segment(name: &str) -> String {
    let mut seg: String = name
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !seg.starts_with(|c: char| c.is_ascii_lowercase()) {
        seg.insert_str(0, "t_");
    }
    seg
}

/// Build database, schema and table pearls in that order.
/// Schemas are emitted sorted; tables keep driver order.
pub fn generate_pearls(
    prefix: &str,
    kind: &str,
    tables: &BTreeMap<String, Vec<Table>>,
    env_var: &str,
) -> Result<Vec<GeneratedPearl>> {
    let now = Utc::now();
    let stamp = |mut p: Pearl| {
        p.created_by = CREATED_BY.to_string();
        p.created_at = now;
        p.updated_at = now;
        p.status = Status::Active;
        p
    };

    let mut results = Vec::new();

    let mut db = stamp(
        Pearl::new(prefix, PearlType::new(PearlType::DATABASE)?)
            .with_context(|| format!("introspect prefix {:?}", prefix))?,
    );
    db.connection = Some(ConnectionInfo {
        kind: kind.to_string(),
        host: format!("${{{}}}", env_var),
        ..Default::default()
    });
    results.push(GeneratedPearl {
        pearl: db,
        content: String::new(),
    });

    for (schema, schema_tables) in tables {
        let schema_id = format!("{}.{}", prefix, id_segment(schema));

        let mut sp = stamp(Pearl::new(&schema_id, PearlType::new(PearlType::SCHEMA)?)?);
        sp.parent = Some(prefix.to_string());
        results.push(GeneratedPearl {
            pearl: sp,
            content: String::new(),
        });

        for table in schema_tables {
            let table_id = format!("{}.{}", schema_id, id_segment(&table.name));

            let references = table
                .foreign_keys
                .iter()
                .map(|fk| {
                    let ref_schema = if fk.references_schema.is_empty() {
                        schema.as_str()
                    } else {
                        fk.references_schema.as_str()
                    };
                    format!(
                        "{}.{}.{}",
                        prefix,
                        id_segment(ref_schema),
                        id_segment(&fk.references_table)
                    )
                })
                .collect();

            let mut tp = stamp(
                Pearl::new(&table_id, PearlType::new(PearlType::TABLE)?)?
                    .with_references(references),
            );
            tp.parent = Some(schema_id.clone());

            results.push(GeneratedPearl {
                pearl: tp,
                content: generate_table_content(table, prefix),
            });
        }
    }

    Ok(results)
}

/// Markdown documentation for one table
pub fn generate_table_content(table: &Table, prefix: &str) -> String {
    let mut out = format!("# {}\n\n", table.name);

    out.push_str("## Columns\n\n");
    out.push_str("| Column | Type | Nullable | Default | Constraints |\n");
    out.push_str("|--------|------|----------|---------|-------------|\n");
    for col in &table.columns {
        let nullable = if col.nullable { "YES" } else { "NO" };
        let constraints = match (col.primary_key, col.constraints.is_empty()) {
            (true, true) => "PRIMARY KEY".to_string(),
            (true, false) => format!("PRIMARY KEY, {}", col.constraints),
            (false, _) => col.constraints.clone(),
        };
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            col.name, col.data_type, nullable, col.default, constraints
        ));
    }

    if !table.foreign_keys.is_empty() {
        out.push_str("\n## Foreign Keys\n\n");
        out.push_str("| Column | References |\n");
        out.push_str("|--------|-----------|\n");
        for fk in &table.foreign_keys {
            let ref_schema = if fk.references_schema.is_empty() {
                &table.schema
            } else {
                &fk.references_schema
            };
            out.push_str(&format!(
                "| {} | {}.{}.{}.{} |\n",
                fk.column, prefix, ref_schema, fk.references_table, fk.references_column
            ));
        }
    }

    if !table.indexes.is_empty() {
        out.push_str("\n## Indexes\n\n");
        out.push_str("| Name | Columns | Unique |\n");
        out.push_str("|------|---------|--------|\n");
        for idx in &table.indexes {
            let unique = if idx.unique { "YES" } else { "NO" };
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                idx.name,
                idx.columns.join(", "),
                unique
            ));
        }
    }

    out
}

/// Read-only SQLite schema reader
pub struct SqliteIntrospector {
    conn: Connection,
}

impl SqliteIntrospector {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(format!("database file {}", path.display())));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Wrap an existing connection (for testing)
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    fn columns(&self, table: &str) -> Result<Vec<Column>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let cols = stmt
            .query_map([table], |row| {
                let notnull: i64 = row.get(2)?;
                let pk: i64 = row.get(4)?;
                Ok(Column {
                    name: row.get(0)?,
                    data_type: row.get(1)?,
                    nullable: notnull == 0,
                    default: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    primary_key: pk > 0,
                    constraints: String::new(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cols)
    }

    fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>> {
        let mut stmt = self.conn.prepare(
            "SELECT \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
        )?;
        let fks = stmt
            .query_map([table], |row| {
                Ok(ForeignKey {
                    references_table: row.get(0)?,
                    column: row.get(1)?,
                    references_column: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    references_schema: String::new(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(fks)
    }

    fn indexes(&self, table: &str) -> Result<Vec<Index>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, \"unique\" FROM pragma_index_list(?1) ORDER BY seq")?;
        let listed = stmt
            .query_map([table], |row| {
                let name: String = row.get(0)?;
                let unique: i64 = row.get(1)?;
                Ok((name, unique == 1))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut indexes = Vec::with_capacity(listed.len());
        for (name, unique) in listed {
            let columns = self.index_columns(&name)?;
            indexes.push(Index {
                name,
                columns,
                unique,
            });
        }
        Ok(indexes)
    }

    fn index_columns(&self, index: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
        let cols = stmt
            .query_map([index], |row| row.get::<_, Option<String>>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        // Expression columns have no name
        Ok(cols
            .into_iter()
            .map(|c| c.unwrap_or_else(|| "<expr>".to_string()))
            .collect())
    }
}

impl Introspector for SqliteIntrospector {
    /// SQLite has a single schema
    fn schemas(&self) -> Result<Vec<String>> {
        Ok(vec!["main".to_string()])
    }

    fn tables(&self, schema: &str) -> Result<Vec<Table>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            tables.push(Table {
                columns: self.columns(&name)?,
                foreign_keys: self.foreign_keys(&name)?,
                indexes: self.indexes(&name)?,
                schema: schema.to_string(),
                name,
            });
        }
        tracing::debug!(count = tables.len(), "introspected sqlite tables");
        Ok(tables)
    }
}
