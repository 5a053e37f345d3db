//! # Column Selection
//!
//! Include/exclude lists written as dotted names (`name`, `address.city`)
//! parsed into a tree: plain names at this level, nested selections per
//! relation.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSelection {
    pub columns: Vec<String>,
    pub relations: BTreeMap<String, ColumnSelection>,
}

impl ColumnSelection {
    /// Parse dotted names. A name that also has nested entries is kept only
    /// as a relation.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut nested: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for name in names {
            match name.as_ref().split_once('.') {
                None => {
                    let name = name.as_ref().to_string();
                    if !columns.contains(&name) {
                        columns.push(name);
                    }
                }
                Some((head, rest)) => nested
                    .entry(head.to_string())
                    .or_default()
                    .push(rest.to_string()),
            }
        }

        columns.retain(|c| !nested.contains_key(c));
        let relations = nested
            .into_iter()
            .map(|(relation, rest)| (relation, ColumnSelection::parse(&rest)))
            .collect();

        Self { columns, relations }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn relation(&self, name: &str) -> Option<&ColumnSelection> {
        self.relations.get(name)
    }

    /// Relation levels this selection reaches into
    pub fn depth(&self) -> usize {
        self.relations
            .values()
            .map(|r| r.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Every name in dotted form, columns first
    pub fn to_dotted(&self) -> Vec<String> {
        let mut out = self.columns.clone();
        for (relation, nested) in &self.relations {
            out.extend(
                nested
                    .to_dotted()
                    .into_iter()
                    .map(|n| format!("{}.{}", relation, n)),
            );
        }
        out
    }
}
