// src/models/schema.rs
//! Shaped documents: trees whose leaves carry a payload.
//!
//! A transform schema is a [`Shaped`] tree whose leaves are ordered lists of
//! transform-step names, and whose key structure mirrors the attribute
//! document it describes. Children are kept in a `BTreeMap`, so every
//! traversal visits keys in ascending order and a deserialized schema is
//! already in its canonical form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A tree that is either a leaf payload or a node of named children.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Shaped<L> {
    Leaf(L),
    Node(BTreeMap<String, Shaped<L>>),
}

/// Transform schema: every leaf is the list of step names applied to the
/// attribute found at the same path.
pub type TrSchema = Shaped<Vec<String>>;

/// Schema for the attributes part of a proof.
pub type AttributesSchema = TrSchema;

/// Human readable descriptions of attributes, same shape as the attributes.
pub type AttributesDefinitions = Shaped<String>;

impl<L> Shaped<L> {
    /// Empty node.
    pub fn node() -> Self {
        Shaped::Node(BTreeMap::new())
    }

    /// Builder helper: inserts `child` under `key` when `self` is a node.
    pub fn with(mut self, key: impl Into<String>, child: Shaped<L>) -> Self {
        if let Shaped::Node(children) = &mut self {
            children.insert(key.into(), child);
        }
        self
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Shaped::Leaf(_))
    }

    /// Looks a subtree up by path segments.
    pub fn get(&self, path: &[&str]) -> Option<&Shaped<L>> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => match self {
                Shaped::Node(children) => children.get(*head)?.get(rest),
                Shaped::Leaf(_) => None,
            },
        }
    }

    /// Removes and returns the subtree at `path`.
    pub fn remove(&mut self, path: &[&str]) -> Option<Shaped<L>> {
        let (last, parents) = path.split_last()?;
        let mut current = self;
        for segment in parents {
            current = match current {
                Shaped::Node(children) => children.get_mut(*segment)?,
                Shaped::Leaf(_) => return None,
            };
        }
        match current {
            Shaped::Node(children) => children.remove(*last),
            Shaped::Leaf(_) => None,
        }
    }

    /// Visits every leaf depth-first in ascending key order.
    pub fn leaves(&self) -> Vec<(Vec<String>, &L)> {
        let mut out = Vec::new();
        self.collect_leaves(&mut Vec::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: &mut Vec<String>, out: &mut Vec<(Vec<String>, &'a L)>) {
        match self {
            Shaped::Leaf(leaf) => out.push((prefix.clone(), leaf)),
            Shaped::Node(children) => {
                for (key, child) in children {
                    prefix.push(key.clone());
                    child.collect_leaves(prefix, out);
                    prefix.pop();
                }
            }
        }
    }

    /// Applies `f` to every leaf while keeping the shape.
    pub fn map<M>(&self, f: &mut impl FnMut(&L) -> M) -> Shaped<M> {
        match self {
            Shaped::Leaf(leaf) => Shaped::Leaf(f(leaf)),
            Shaped::Node(children) => Shaped::Node(
                children
                    .iter()
                    .map(|(key, child)| (key.clone(), child.map(f)))
                    .collect(),
            ),
        }
    }
}

impl Shaped<Vec<String>> {
    /// Leaf built from step names.
    pub fn steps<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Shaped::Leaf(steps.into_iter().map(Into::into).collect())
    }
}

/// Encoding schema of an [`Identifier`](crate::models::identifier::Identifier).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IdentifierSchema {
    #[serde(rename = "type")]
    pub id_type: Vec<String>,
    pub key: Vec<String>,
}

/// Renders a path for error messages, e.g. `subject.id.key`.
pub fn display_path(path: &[String]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    }
}
