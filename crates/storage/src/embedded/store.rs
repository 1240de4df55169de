// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSON-lines file with an in-memory index.
//!
//! Each line is a put or delete of one state key. Opening replays the file
//! into the index; a corrupt tail is rotated out to a `.bak` file and the
//! valid rows are written back. Once enough rows have been appended the file
//! is rewritten from the index.
//!
//! The store remembers how many bytes it has written. Anything past that
//! mark, such as the torn half of a failed write, is cut off before the next
//! row goes in, so a new row never lands glued to a partial one.

use crate::error::StateStoreError;
use cf_core::CfEntityKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const MAX_BAK_FILES: u32 = 3;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Row<S> {
    Put { key: CfEntityKey, state: S },
    Delete { key: CfEntityKey },
}

/// Durable map from state key to the state's JSON form.
///
/// States are kept undecoded so one unreadable state never blocks the rest.
pub struct EmbeddedStore {
    path: PathBuf,
    file: File,
    /// Length of the file up to the last fully written row.
    len: u64,
    rows: BTreeMap<CfEntityKey, Value>,
    appended: usize,
    compact_threshold: usize,
}

impl EmbeddedStore {
    /// Open or create the store at `path`.
    ///
    /// A zero `compact_threshold` never compacts.
    pub fn open(path: &Path, compact_threshold: usize) -> Result<Self, StateStoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let (rows, corrupt) = if path.exists() { load(path)? } else { (BTreeMap::new(), false) };
        if corrupt {
            let bak = rotate_bak_path(path);
            fs::rename(path, &bak)?;
            tracing::warn!(
                path = %path.display(),
                backup = %bak.display(),
                rows = rows.len(),
                "state store has a corrupt tail, rotated to backup"
            );
            write_rows(path, &rows)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { path: path.to_path_buf(), file, len, rows, appended: 0, compact_threshold })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &CfEntityKey) -> Option<&Value> {
        self.rows.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CfEntityKey, &Value)> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows appended since the file was last rewritten.
    pub fn appended(&self) -> usize {
        self.appended
    }

    pub fn put(&mut self, key: CfEntityKey, state: Value) -> Result<(), StateStoreError> {
        self.append(&Row::Put { key, state: &state })?;
        self.rows.insert(key, state);
        self.maybe_compact()
    }

    /// Returns whether the key was present.
    pub fn delete(&mut self, key: &CfEntityKey) -> Result<bool, StateStoreError> {
        if !self.rows.contains_key(key) {
            return Ok(false);
        }
        self.append(&Row::<&Value>::Delete { key: *key })?;
        self.rows.remove(key);
        self.maybe_compact()?;
        Ok(true)
    }

    fn append(&mut self, row: &Row<&Value>) -> Result<(), StateStoreError> {
        let mut line = serde_json::to_vec(row)?;
        line.push(b'\n');
        let on_disk = self.file.metadata()?.len();
        if on_disk != self.len {
            tracing::warn!(
                path = %self.path.display(),
                expected = self.len,
                found = on_disk,
                "state store has bytes past the last row, truncating"
            );
            self.file.set_len(self.len)?;
        }
        let written = self.file.write_all(&line).and_then(|()| self.file.sync_data());
        if let Err(e) = written {
            if let Err(undo) = self.file.set_len(self.len) {
                tracing::warn!(path = %self.path.display(), error = %undo, "failed to cut back a partial row");
            }
            return Err(e.into());
        }
        self.len += line.len() as u64;
        self.appended += 1;
        Ok(())
    }

    fn maybe_compact(&mut self) -> Result<(), StateStoreError> {
        if self.compact_threshold > 0 && self.appended >= self.compact_threshold {
            self.compact()?;
        }
        Ok(())
    }

    /// Rewrite the file to hold one put per live key.
    pub fn compact(&mut self) -> Result<(), StateStoreError> {
        let tmp = self.path.with_extension("tmp");
        write_rows(&tmp, &self.rows)?;
        fs::rename(&tmp, &self.path)?;
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        self.len = self.file.metadata()?.len();
        tracing::debug!(path = %self.path.display(), rows = self.rows.len(), appended = self.appended, "compacted state store");
        self.appended = 0;
        Ok(())
    }
}

/// Replay the file. The flag is set when a line fails to parse; rows before
/// it are kept and everything from it on is dropped. A file that does not end
/// in a newline also has a torn tail, even when the last line parses.
fn load(path: &Path) -> Result<(BTreeMap<CfEntityKey, Value>, bool), StateStoreError> {
    let bytes = fs::read(path)?;
    let torn = bytes.last().is_some_and(|b| *b != b'\n');
    let mut rows = BTreeMap::new();
    for line in bytes.split(|b| *b == b'\n') {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<Row<Value>>(line) {
            Ok(Row::Put { key, state }) => {
                rows.insert(key, state);
            }
            Ok(Row::Delete { key }) => {
                rows.remove(&key);
            }
            Err(_) => return Ok((rows, true)),
        }
    }
    Ok((rows, torn))
}

fn write_rows(path: &Path, rows: &BTreeMap<CfEntityKey, Value>) -> Result<(), StateStoreError> {
    let mut out = BufWriter::new(File::create(path)?);
    for (key, state) in rows {
        serde_json::to_writer(&mut out, &Row::Put { key: *key, state })?;
        out.write_all(b"\n")?;
    }
    let file = out.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }
    bak(1)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
