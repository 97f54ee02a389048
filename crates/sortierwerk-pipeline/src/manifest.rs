// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Insertion-ordered document inventory keyed by content fingerprint.
//
// The manifest file is the workspace's source of truth: a JSON object whose
// key order IS ingestion order. uid numbering, organize, distribute, and the
// inventory export all walk it in that order, so a plain serde map (which
// sorts or scrambles keys) would corrupt the numbering contract. Instead the
// entries live in a vector with a digest index bolted on, and the JSON
// (de)serialization walks the vector by hand.

use std::collections::HashMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use sortierwerk_core::types::ManifestEntry;

/// Digest-keyed inventory of everything one ingest run saw.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<(String, ManifestEntry)>,
    index: HashMap<String, usize>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.index.contains_key(digest)
    }

    pub fn get(&self, digest: &str) -> Option<&ManifestEntry> {
        self.index.get(digest).map(|&at| &self.entries[at].1)
    }

    pub fn get_mut(&mut self, digest: &str) -> Option<&mut ManifestEntry> {
        let at = *self.index.get(digest)?;
        Some(&mut self.entries[at].1)
    }

    /// Insert or replace. The first insertion of a digest fixes the entry's
    /// position for good; replacing never reorders.
    pub fn insert(&mut self, digest: impl Into<String>, entry: ManifestEntry) {
        let digest = digest.into();
        match self.index.get(&digest) {
            Some(&at) => self.entries[at].1 = entry,
            None => {
                self.index.insert(digest.clone(), self.entries.len());
                self.entries.push((digest, entry));
            }
        }
    }

    /// Entries in ingestion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ManifestEntry)> {
        self.entries
            .iter()
            .map(|(digest, entry)| (digest.as_str(), entry))
    }

    /// Mutable walk in ingestion order; used by the ingest tagging pass.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ManifestEntry)> {
        self.entries
            .iter_mut()
            .map(|(digest, entry)| (digest.as_str(), entry))
    }

    /// Count of non-quarantined entries.
    pub fn master_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_quarantined())
            .count()
    }

    /// Count of quarantined entries.
    pub fn quarantine_count(&self) -> usize {
        self.len() - self.master_count()
    }
}

impl Serialize for Manifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (digest, entry) in &self.entries {
            map.serialize_entry(digest, entry)?;
        }
        map.end()
    }
}

struct ManifestVisitor;

impl<'de> Visitor<'de> for ManifestVisitor {
    type Value = Manifest;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object keyed by content fingerprint")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Manifest, A::Error> {
        let mut manifest = Manifest::new();
        while let Some((digest, entry)) = access.next_entry::<String, ManifestEntry>()? {
            manifest.insert(digest, entry);
        }
        Ok(manifest)
    }
}

impl<'de> Deserialize<'de> for Manifest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(ManifestVisitor)
    }
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sortierwerk_core::types::TrustTag;

    fn ok_entry(name: &str) -> ManifestEntry {
        ManifestEntry::Ok {
            master: format!("sub/{name}"),
            copies: vec![format!("sub/{name}")],
            name: name.to_owned(),
            root: "/data/source".to_owned(),
            uid: String::new(),
            id: String::new(),
            trust: TrustTag::Binary,
        }
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut manifest = Manifest::new();
        manifest.insert("ccc", ok_entry("c.pdf"));
        manifest.insert("aaa", ok_entry("a.pdf"));
        manifest.insert("bbb", ok_entry("b.pdf"));

        let keys: Vec<&str> = manifest.iter().map(|(digest, _)| digest).collect();
        assert_eq!(keys, vec!["ccc", "aaa", "bbb"]);
    }

    #[test]
    fn replace_keeps_the_original_position() {
        let mut manifest = Manifest::new();
        manifest.insert("one", ok_entry("first.pdf"));
        manifest.insert("two", ok_entry("second.pdf"));
        manifest.insert("one", ok_entry("replaced.pdf"));

        assert_eq!(manifest.len(), 2);
        let keys: Vec<&str> = manifest.iter().map(|(digest, _)| digest).collect();
        assert_eq!(keys, vec!["one", "two"]);
        assert_eq!(
            manifest.get("one").map(ManifestEntry::display_name),
            Some("replaced.pdf")
        );
    }

    #[test]
    fn json_round_trip_preserves_order_and_entries() {
        let mut manifest = Manifest::new();
        manifest.insert("zzz", ok_entry("z.pdf"));
        manifest.insert(
            "quarantine-key-1",
            ManifestEntry::Quarantine {
                orig_name: "broken.xlsx".into(),
                error_reason: "Zero-Byte File".into(),
            },
        );
        manifest.insert("mmm", ok_entry("m.jpg"));

        let json = serde_json::to_string_pretty(&manifest).expect("serialize");
        let back: Manifest = serde_json::from_str(&json).expect("deserialize");

        let keys: Vec<&str> = back.iter().map(|(digest, _)| digest).collect();
        assert_eq!(keys, vec!["zzz", "quarantine-key-1", "mmm"]);
        assert_eq!(back.master_count(), 2);
        assert_eq!(back.quarantine_count(), 1);
        assert_eq!(
            back.get("quarantine-key-1").map(ManifestEntry::is_quarantined),
            Some(true)
        );
    }

    #[test]
    fn serialized_form_is_a_plain_object() {
        let mut manifest = Manifest::new();
        manifest.insert("abc", ok_entry("doc.pdf"));
        let json = serde_json::to_string(&manifest).expect("serialize");
        assert!(json.starts_with("{\"abc\":{"), "got: {json}");
        assert!(json.contains("\"status\":\"OK\""));
    }
}
