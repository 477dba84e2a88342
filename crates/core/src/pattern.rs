// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compiled pattern rules and the folder-indexed registry.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use crate::folder::folder_key;

/// A single `(folder, regex, command, name)` rule, immutable after load.
#[derive(Debug, Clone)]
pub struct PatternRule {
    /// Human label used in logs and metrics.
    pub name: String,
    /// Folder path as configured (used for filesystem I/O).
    pub folder: String,
    /// Normalized lookup key for `folder`.
    pub folder_key: String,
    /// Regex source string as configured.
    pub regex: String,
    /// Absolute path of the command to invoke on a match.
    pub command: String,
    compiled: Regex,
}

impl PatternRule {
    /// Compile a rule. The regex is matched case-insensitively against the
    /// full filename, so `^foo.*\.txt$` and `foo.*\.txt` behave identically.
    pub fn compile(
        name: &str,
        folder: &str,
        regex: &str,
        command: &str,
    ) -> Result<Self, regex::Error> {
        let compiled = RegexBuilder::new(&format!("^(?:{regex})$"))
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            name: name.to_string(),
            folder: folder.to_string(),
            folder_key: folder_key(folder),
            regex: regex.to_string(),
            command: command.to_string(),
            compiled,
        })
    }

    /// Full-string, case-insensitive match against a bare filename.
    pub fn matches_filename(&self, filename: &str) -> bool {
        self.compiled.is_match(filename)
    }
}

/// One distinct watched folder with the rules that apply to it.
#[derive(Debug, Clone)]
pub struct FolderGroup {
    /// Normalized key (identity of the group).
    pub key: String,
    /// Configured spelling of the folder, taken from the first rule that
    /// referenced it. Used for filesystem operations.
    pub path: String,
    /// Indices into the registry's rule list, in declaration order.
    pub rule_indices: Vec<usize>,
}

/// Ordered, immutable collection of pattern rules with a folder index.
///
/// Shared by reference across the watcher tasks and the metrics endpoint;
/// never mutated after load.
#[derive(Debug, Clone)]
pub struct Registry {
    rules: Vec<PatternRule>,
    groups: Vec<FolderGroup>,
    by_folder: HashMap<String, usize>,
}

impl Registry {
    /// Build a registry from rules in declaration order.
    pub fn new(rules: Vec<PatternRule>) -> Self {
        let mut groups: Vec<FolderGroup> = Vec::new();
        let mut by_folder: HashMap<String, usize> = HashMap::new();

        for (idx, rule) in rules.iter().enumerate() {
            match by_folder.get(&rule.folder_key) {
                Some(&group_idx) => groups[group_idx].rule_indices.push(idx),
                None => {
                    by_folder.insert(rule.folder_key.clone(), groups.len());
                    groups.push(FolderGroup {
                        key: rule.folder_key.clone(),
                        path: rule.folder.clone(),
                        rule_indices: vec![idx],
                    });
                }
            }
        }

        Self {
            rules,
            groups,
            by_folder,
        }
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn rule(&self, idx: usize) -> Option<&PatternRule> {
        self.rules.get(idx)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Distinct watched folders in first-seen order.
    pub fn folder_groups(&self) -> &[FolderGroup] {
        &self.groups
    }

    /// Rule indices whose folder equals `folder` (after normalization) and
    /// whose regex fully matches `filename`, in declaration order.
    pub fn matches(&self, filename: &str, folder: &str) -> Vec<usize> {
        let key = folder_key(folder);
        let Some(&group_idx) = self.by_folder.get(&key) else {
            return Vec::new();
        };
        self.groups[group_idx]
            .rule_indices
            .iter()
            .copied()
            .filter(|&idx| self.rules[idx].matches_filename(filename))
            .collect()
    }
}

#[cfg(test)]
#[path = "pattern_tests.rs"]
mod tests;
