//! Entry reads and writes.
//!
//! Every write is one transaction containing the namespace row and the full
//! response snapshot, so a reader sees either the previous entry or the new
//! one, never a partial body.

use std::collections::BTreeMap;

use super::connection::CacheDb;
use super::namespaces::Namespace;
use crate::Error;
use crate::model::{CacheEntry, Method, Response};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Raw row before header/timestamp decoding.
struct EntryRow {
    status: i64,
    headers_json: String,
    body: Vec<u8>,
    stored_at: String,
}

impl EntryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self { status: row.get(0)?, headers_json: row.get(1)?, body: row.get(2)?, stored_at: row.get(3)? })
    }

    fn decode(self) -> Result<CacheEntry, Error> {
        let headers: BTreeMap<String, String> =
            serde_json::from_str(&self.headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let status = u16::try_from(self.status).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let stored_at = DateTime::parse_from_rfc3339(&self.stored_at)
            .map_err(|e| Error::CorruptEntry(e.to_string()))?
            .with_timezone(&Utc);

        Ok(CacheEntry { response: Response { status, headers, body: Bytes::from(self.body) }, stored_at })
    }
}

const SELECT_ENTRY: &str =
    "SELECT status, headers_json, body, stored_at FROM entries WHERE namespace = ?1 AND key_hash = ?2";

/// A response ready to be written, with its headers already serialized.
struct PendingEntry {
    key_hash: String,
    method: Method,
    url: String,
    status: i64,
    headers_json: String,
    body: Bytes,
}

impl PendingEntry {
    fn new(key_hash: &str, method: Method, url: &str, response: &Response) -> Result<Self, Error> {
        let headers_json = serde_json::to_string(&response.headers).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        Ok(Self {
            key_hash: key_hash.to_string(),
            method,
            url: url.to_string(),
            status: i64::from(response.status),
            headers_json,
            body: response.body.clone(),
        })
    }
}

/// Write `entries` into `namespace` inside one transaction, creating the namespace row if needed.
fn write_entries(
    conn: &mut rusqlite::Connection, namespace: &Namespace, entries: &[PendingEntry],
) -> Result<(), Error> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT OR IGNORE INTO namespaces (physical_name, logical_name, version, created_at)
        VALUES (?1, ?2, ?3, ?4)",
        params![namespace.physical_name(), namespace.logical_name(), namespace.version(), &now],
    )?;
    for entry in entries {
        tx.execute(
            "INSERT INTO entries (namespace, key_hash, method, url, status, headers_json, body, stored_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(namespace, key_hash) DO UPDATE SET
                method = excluded.method,
                url = excluded.url,
                status = excluded.status,
                headers_json = excluded.headers_json,
                body = excluded.body,
                stored_at = excluded.stored_at",
            params![
                namespace.physical_name(),
                entry.key_hash,
                entry.method.as_str(),
                entry.url,
                entry.status,
                entry.headers_json,
                entry.body.as_ref(),
                now,
            ],
        )?;
    }
    tx.commit()?;
    Ok(())
}

impl CacheDb {
    /// Insert or replace the entry for `key_hash`, creating the namespace row if needed.
    pub async fn put_entry(
        &self, namespace: &Namespace, key_hash: &str, method: Method, url: &str, response: &Response,
    ) -> Result<(), Error> {
        let entry = PendingEntry::new(key_hash, method, url, response)?;
        let namespace = namespace.clone();
        self.conn
            .call(move |conn| write_entries(conn, &namespace, std::slice::from_ref(&entry)))
            .await
            .map_err(Error::from)
    }

    /// Write every `(key_hash, method, url, response)` or none of them.
    pub async fn put_entries(
        &self, namespace: &Namespace, entries: &[(String, Method, String, Response)],
    ) -> Result<(), Error> {
        let pending = entries
            .iter()
            .map(|(key_hash, method, url, response)| PendingEntry::new(key_hash, *method, url, response))
            .collect::<Result<Vec<_>, _>>()?;
        let namespace = namespace.clone();
        self.conn
            .call(move |conn| write_entries(conn, &namespace, &pending))
            .await
            .map_err(Error::from)
    }

    /// Get the entry for `key_hash` in one namespace.
    pub async fn get_entry(&self, physical_name: &str, key_hash: &str) -> Result<Option<CacheEntry>, Error> {
        let physical_name = physical_name.to_string();
        let key_hash = key_hash.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let mut stmt = conn.prepare(SELECT_ENTRY)?;
                match stmt.query_row(params![physical_name, key_hash], EntryRow::from_row) {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::decode).transpose()
    }

    /// First entry for `key_hash` across `physical_names`, searched in order.
    pub async fn match_entry(&self, physical_names: &[String], key_hash: &str) -> Result<Option<CacheEntry>, Error> {
        let physical_names = physical_names.to_vec();
        let key_hash = key_hash.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let mut stmt = conn.prepare(SELECT_ENTRY)?;
                for name in &physical_names {
                    match stmt.query_row(params![name, &key_hash], EntryRow::from_row) {
                        Ok(row) => return Ok(Some(row)),
                        Err(rusqlite::Error::QueryReturnedNoRows) => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(None)
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::decode).transpose()
    }
}
