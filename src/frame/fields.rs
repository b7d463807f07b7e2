//! Parent/child view over a full field dump.

use std::collections::HashMap;

use crate::dissect::FieldNode;

/// A field with every value it was reported with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEntry {
    pub key: String,
    pub parent: Option<String>,
    pub description: String,
    /// Values in dissection order; repeated keys append here.
    pub values: Vec<String>,
}

/// Decoded fields of one frame, keyed by name and linked by parent.
#[derive(Debug, Clone, Default)]
pub struct FieldTree {
    entries: Vec<FieldEntry>,
    by_key: HashMap<String, usize>,
}

impl FieldTree {
    /// Build from a field dump, merging repeated keys into one entry.
    ///
    /// The first occurrence fixes parent, description and position. A
    /// description of `Frame 0` is renumbered to the frame's own sequence number.
    pub fn from_nodes(seq: u64, nodes: Vec<FieldNode>) -> Self {
        let mut tree = Self::default();
        for node in nodes {
            if let Some(&idx) = tree.by_key.get(&node.key) {
                tree.entries[idx].values.push(node.value);
                continue;
            }

            let description = node.description.replacen("Frame 0", &format!("Frame {seq}"), 1);
            tree.by_key.insert(node.key.clone(), tree.entries.len());
            tree.entries.push(FieldEntry {
                key: node.key,
                parent: node.parent,
                description,
                values: vec![node.value],
            });
        }
        tree
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&FieldEntry> {
        self.by_key.get(key).map(|&idx| &self.entries[idx])
    }

    /// All entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldEntry> {
        self.entries.iter()
    }

    /// Top-level entries (no parent).
    pub fn roots(&self) -> impl Iterator<Item = &FieldEntry> {
        self.entries.iter().filter(|e| e.parent.is_none())
    }

    /// Direct children of `key`.
    pub fn children<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a FieldEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.parent.as_deref() == Some(key))
    }
}
