// SPDX-License-Identifier: MIT
//! Task-data archive loader
//!
//! Reads every file entry of a zip archive into memory, keyed by its
//! lowercased base name. ISOXML archives keep all files flat next to
//! TASKDATA.XML, so the directory part of an entry name is irrelevant; when
//! two entries share a base name the first one is kept.
//! Entry names without the UTF-8 flag are decoded as CP437 by `zip`.
//! An entry that fails to read (bad checksum, broken compressed stream) only
//! fails lookups of that entry.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use tracing::{debug, warn};

use crate::config::DecoderConfig;
use crate::error::DecodeError;

enum Entry {
    Loaded(Vec<u8>),
    Skipped { size: u64 },
    Failed(String),
}

/// In-memory view of a task-data archive
pub struct Archive {
    entries: HashMap<String, Entry>,
    max_entry_size: u64,
}

impl Archive {
    /// Open an archive with default limits
    pub fn open(data: &[u8]) -> Result<Self, DecodeError> {
        Self::open_with_config(data, &DecoderConfig::default())
    }

    pub fn open_with_config(data: &[u8], config: &DecoderConfig) -> Result<Self, DecodeError> {
        let mut zip = zip::ZipArchive::new(Cursor::new(data))?;
        let mut entries = HashMap::with_capacity(zip.len());

        for index in 0..zip.len() {
            let (name, key) = match zip.name_for_index(index) {
                Some(name) => (name.to_string(), normalize_name(name)),
                None => continue,
            };
            if key.is_empty() {
                continue;
            }
            if entries.contains_key(&key) {
                warn!(entry = %name, key = %key, "Ignoring archive entry with a duplicate name");
                continue;
            }

            let entry = match read_entry(&mut zip, index, config.max_entry_size) {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    warn!(entry = %key, error = %e, "Skipping unreadable archive entry");
                    Entry::Failed(e.to_string())
                }
            };
            entries.insert(key, entry);
        }

        Ok(Self {
            entries,
            max_entry_size: config.max_entry_size,
        })
    }

    /// Raw bytes of an entry, matched case-insensitively
    pub fn get_bin(&self, name: &str) -> Result<&[u8], DecodeError> {
        match self.entries.get(&normalize_name(name)) {
            Some(Entry::Loaded(content)) => Ok(content),
            Some(Entry::Skipped { size }) => Err(DecodeError::EntryTooLarge {
                name: name.to_string(),
                size: *size,
                limit: self.max_entry_size,
            }),
            Some(Entry::Failed(message)) => Err(DecodeError::Unreadable {
                name: name.to_string(),
                message: message.clone(),
            }),
            None => Err(DecodeError::NotFound(name.to_string())),
        }
    }

    /// UTF-8 text of an XML entry, without a leading byte order mark
    pub fn get_xml(&self, name: &str) -> Result<&str, DecodeError> {
        let content = self.get_bin(name)?;
        let text =
            std::str::from_utf8(content).map_err(|_| DecodeError::Encoding(name.to_string()))?;
        Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize_name(name))
    }

    /// Normalized names of all file entries, sorted
    pub fn entry_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Content of entry `index`, or `None` for a directory
fn read_entry(
    zip: &mut zip::ZipArchive<Cursor<&[u8]>>,
    index: usize,
    max_entry_size: u64,
) -> Result<Option<Entry>, DecodeError> {
    let mut file = zip.by_index(index)?;
    if file.is_dir() {
        return Ok(None);
    }
    let key = normalize_name(file.name());

    let size = file.size();
    if size > max_entry_size {
        warn!(entry = %key, size, limit = max_entry_size, "Skipping oversized archive entry");
        return Ok(Some(Entry::Skipped { size }));
    }

    let mut content = Vec::with_capacity(size as usize);
    file.read_to_end(&mut content)?;
    debug!(entry = %key, bytes = content.len(), "Loaded archive entry");
    Ok(Some(Entry::Loaded(content)))
}

fn normalize_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.to_lowercase()
}
