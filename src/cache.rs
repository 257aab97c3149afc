// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Prefix for the derived keys an oversized value is chunked under.
const CHUNK_KEY_PREFIX: &str = "$$$";

/// The backing store caps entries at ~128 KiB; keep a margin for the
/// descriptor JSON that wraps inline values.
const DESCRIPTOR_MARGIN: usize = 2 * 1024;
pub const MAX_VALUE_LEN: usize = 128 * 1024 - DESCRIPTOR_MARGIN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheValueType {
    String,
    Number,
    Boolean,
    Object,
}

impl fmt::Display for CacheValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CacheValueType::String => "string",
            CacheValueType::Number => "number",
            CacheValueType::Boolean => "boolean",
            CacheValueType::Object => "object",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    /// Requesting a key with a different type than it was stored with is a
    /// caller bug, not a recoverable runtime case.
    #[error("cache type mismatch for '{key}': expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: CacheValueType,
        found: CacheValueType,
    },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Seam to the external key/value store: string values, optional per-key
/// TTL in seconds. Eviction timing belongs to the store; callers must
/// treat "absent" as always possible.
pub trait CacheStore {
    fn put_raw(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<()>;
    fn get_raw(&self, key: &str) -> Result<Option<String>>;
    fn remove_raw(&self, key: &str) -> Result<()>;
}

/// `CacheStore` over the `cache_entries` table. Expired keys are deleted
/// on read and reported as absent.
pub struct SqliteCacheStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCacheStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        SqliteCacheStore { conn }
    }

    pub fn purge_expired(&self) -> Result<usize> {
        let n = self.conn.execute(
            "DELETE FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![Utc::now().timestamp()],
        )?;
        Ok(n)
    }
}

impl CacheStore for SqliteCacheStore<'_> {
    fn put_raw(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<()> {
        let expires_at = ttl.map(|t| Utc::now().timestamp() + t as i64);
        self.conn.execute(
            "INSERT INTO cache_entries(key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value, expires_at=excluded.expires_at",
            params![key, value, expires_at],
        )?;
        Ok(())
    }

    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String, Option<i64>)> = self
            .conn
            .query_row(
                "SELECT value, expires_at FROM cache_entries WHERE key=?1",
                params![key],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        match row {
            Some((_, Some(expiry))) if expiry <= Utc::now().timestamp() => {
                self.conn
                    .execute("DELETE FROM cache_entries WHERE key=?1", params![key])?;
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value)),
            None => Ok(None),
        }
    }

    fn remove_raw(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM cache_entries WHERE key=?1", params![key])?;
        Ok(())
    }
}

/// Wire format of a cache entry. Exactly one of `value`/`keys` is
/// populated at rest; `keys` concatenate in order to rebuild the value.
#[derive(Debug, Serialize, Deserialize)]
struct ValueDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keys: Option<Vec<String>>,
    r#type: CacheValueType,
    ttl: Option<u64>,
    time: i64,
}

/// Typed cache over a raw string store. Values carry a type tag and write
/// timestamp; payloads larger than the store's per-entry ceiling are
/// transparently chunked across derived keys.
pub struct TypedCache<S: CacheStore> {
    store: S,
}

impl<S: CacheStore> TypedCache<S> {
    pub fn new(store: S) -> Self {
        TypedCache { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn put_string(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<(), CacheError> {
        self.put_value(key, value.to_string(), CacheValueType::String, ttl)
    }

    pub fn get_string(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.get_value(key, CacheValueType::String)
    }

    pub fn put_number(&self, key: &str, value: f64, ttl: Option<u64>) -> Result<(), CacheError> {
        self.put_value(key, value.to_string(), CacheValueType::Number, ttl)
    }

    pub fn get_number(&self, key: &str) -> Result<Option<f64>, CacheError> {
        match self.get_value(key, CacheValueType::Number)? {
            Some(s) => match s.parse::<f64>() {
                Ok(n) => Ok(Some(n)),
                // Malformed payload: treat as a miss and drop the entry.
                Err(_) => {
                    self.remove(key)?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub fn put_boolean(&self, key: &str, value: bool, ttl: Option<u64>) -> Result<(), CacheError> {
        self.put_value(key, value.to_string(), CacheValueType::Boolean, ttl)
    }

    pub fn get_boolean(&self, key: &str) -> Result<Option<bool>, CacheError> {
        match self.get_value(key, CacheValueType::Boolean)? {
            Some(s) => match s.parse::<bool>() {
                Ok(b) => Ok(Some(b)),
                Err(_) => {
                    self.remove(key)?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub fn put_object<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<u64>,
    ) -> Result<(), CacheError> {
        let json = serde_json::to_string(value)
            .map_err(|e| CacheError::Store(anyhow::Error::new(e)))?;
        self.put_value(key, json, CacheValueType::Object, ttl)
    }

    pub fn get_object<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get_value(key, CacheValueType::Object)? {
            Some(json) => match serde_json::from_str(&json) {
                Ok(v) => Ok(Some(v)),
                Err(_) => {
                    self.remove(key)?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Remove the entry and, if its value was chunked, every chunk key it
    /// references.
    pub fn remove(&self, key: &str) -> Result<(), CacheError> {
        if let Some(descriptor) = self.read_descriptor(key)? {
            if let Some(keys) = descriptor.keys {
                for chunk_key in keys {
                    self.store.remove_raw(&chunk_key)?;
                }
            }
        }
        self.store.remove_raw(key)?;
        Ok(())
    }

    /// When the entry was written, or `None` if absent.
    pub fn last_updated(&self, key: &str) -> Result<Option<DateTime<Utc>>, CacheError> {
        Ok(self
            .read_descriptor(key)?
            .and_then(|d| DateTime::from_timestamp_millis(d.time)))
    }

    fn put_value(
        &self,
        key: &str,
        payload: String,
        r#type: CacheValueType,
        ttl: Option<u64>,
    ) -> Result<(), CacheError> {
        // Drop any previous chunks so an overwrite never leaks slots.
        self.remove(key)?;

        let mut descriptor = ValueDescriptor {
            value: Some(payload),
            keys: None,
            r#type,
            ttl,
            time: Utc::now().timestamp_millis(),
        };
        self.split_large_value(key, &mut descriptor)?;
        let serialized = serde_json::to_string(&descriptor)
            .map_err(|e| CacheError::Store(anyhow::Error::new(e)))?;
        self.store.put_raw(key, &serialized, ttl)?;
        Ok(())
    }

    fn get_value(
        &self,
        key: &str,
        expected: CacheValueType,
    ) -> Result<Option<String>, CacheError> {
        let Some(descriptor) = self.read_descriptor(key)? else {
            return Ok(None);
        };
        if descriptor.r#type != expected {
            return Err(CacheError::TypeMismatch {
                key: key.to_string(),
                expected,
                found: descriptor.r#type,
            });
        }
        match (descriptor.value, descriptor.keys) {
            (Some(value), _) => Ok(Some(value)),
            (None, Some(keys)) => self.merge_large_value(&keys),
            (None, None) => Ok(None),
        }
    }

    /// Read and decode the descriptor. An undecodable descriptor is
    /// dropped and reported as a miss so callers re-fetch.
    fn read_descriptor(&self, key: &str) -> Result<Option<ValueDescriptor>, CacheError> {
        let Some(raw) = self.store.get_raw(key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<ValueDescriptor>(&raw) {
            Ok(d) => Ok(Some(d)),
            Err(_) => {
                self.store.remove_raw(key)?;
                Ok(None)
            }
        }
    }

    /// Reassemble a chunked value in stored order. Any missing chunk
    /// (evicted or expired independently) makes the whole entry a miss.
    fn merge_large_value(&self, keys: &[String]) -> Result<Option<String>, CacheError> {
        let mut value = String::new();
        for chunk_key in keys {
            match self.store.get_raw(chunk_key)? {
                Some(chunk) => value.push_str(&chunk),
                None => return Ok(None),
            }
        }
        Ok(Some(value))
    }

    /// If the inline payload would blow the store's per-entry ceiling,
    /// move it into `$$$<key><index>` chunks and record the key list in
    /// the descriptor instead.
    fn split_large_value(
        &self,
        key: &str,
        descriptor: &mut ValueDescriptor,
    ) -> Result<(), CacheError> {
        let needs_split = descriptor
            .value
            .as_ref()
            .is_some_and(|v| v.len() > MAX_VALUE_LEN);
        if !needs_split {
            return Ok(());
        }
        let value = descriptor.value.take().unwrap_or_default();
        let mut keys = Vec::new();
        let mut rest = value.as_str();
        while !rest.is_empty() {
            let mut end = rest.len().min(MAX_VALUE_LEN);
            while !rest.is_char_boundary(end) {
                end -= 1;
            }
            let chunk_key = format!("{}{}{}", CHUNK_KEY_PREFIX, key, keys.len());
            self.store.put_raw(&chunk_key, &rest[..end], descriptor.ttl)?;
            keys.push(chunk_key);
            rest = &rest[end..];
        }
        descriptor.keys = Some(keys);
        Ok(())
    }
}
