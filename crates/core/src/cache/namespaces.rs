//! Namespace rows: creation, enumeration and destruction.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Handle to one physical namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    logical_name: String,
    version: String,
    physical_name: String,
}

impl Namespace {
    pub fn new(logical_name: impl Into<String>, version: impl Into<String>) -> Self {
        let logical_name = logical_name.into();
        let version = version.into();
        let physical_name = physical_name(&logical_name, &version);
        Self { logical_name, version, physical_name }
    }

    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn physical_name(&self) -> &str {
        &self.physical_name
    }
}

/// `{logical}-{version}`, e.g. `static-v2.1.0`.
pub fn physical_name(logical_name: &str, version: &str) -> String {
    format!("{logical_name}-{version}")
}

/// Stored metadata for a physical namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NamespaceRecord {
    pub physical_name: String,
    pub logical_name: String,
    pub version: String,
    pub created_at: String,
    pub entry_count: i64,
}

impl CacheDb {
    /// Create the namespace row if absent. Idempotent.
    pub async fn ensure_namespace(&self, namespace: &Namespace) -> Result<(), Error> {
        let namespace = namespace.clone();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO namespaces (physical_name, logical_name, version, created_at)
                    VALUES (?1, ?2, ?3, ?4)",
                    params![namespace.physical_name, namespace.logical_name, namespace.version, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// All namespace rows, old and current, ordered by physical name.
    pub async fn namespace_records(&self) -> Result<Vec<NamespaceRecord>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<NamespaceRecord>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT n.physical_name, n.logical_name, n.version, n.created_at,
                        (SELECT COUNT(*) FROM entries e WHERE e.namespace = n.physical_name)
                    FROM namespaces n ORDER BY n.physical_name",
                )?;

                let rows = stmt.query_map([], |row| {
                    Ok(NamespaceRecord {
                        physical_name: row.get(0)?,
                        logical_name: row.get(1)?,
                        version: row.get(2)?,
                        created_at: row.get(3)?,
                        entry_count: row.get(4)?,
                    })
                })?;

                let mut records = Vec::new();
                for row in rows {
                    records.push(row?);
                }
                Ok(records)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a namespace and, through the foreign key cascade, all of its entries.
    ///
    /// Returns whether the namespace existed.
    pub async fn drop_namespace(&self, physical_name: &str) -> Result<bool, Error> {
        let physical_name = physical_name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM namespaces WHERE physical_name = ?1", params![physical_name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
