//! Inheritance forest for discriminator-based polymorphic models.
//!
//! Built alongside `allOf` flattening: whenever a model lists
//! `{"$ref": "#/definitions/Parent"}` in its `allOf` and `Parent` declares a
//! `discriminator`, the model is recorded as a child of `Parent`. A model
//! with no parent is a root; multiple roots form a forest. The forest is
//! read-only after flattening.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// One node of the inheritance forest: a model name and its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InheritanceTree {
    pub name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, InheritanceTree>,
}

impl InheritanceTree {
    pub fn new(name: impl Into<String>) -> Self {
        InheritanceTree {
            name: name.into(),
            children: BTreeMap::new(),
        }
    }

    /// Adds a child by name, returning the (possibly pre-existing) node.
    pub fn add_child(&mut self, child_name: &str) -> &mut InheritanceTree {
        self.children
            .entry(child_name.to_string())
            .or_insert_with(|| InheritanceTree::new(child_name))
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Parent/child edges recorded during flattening.
#[derive(Debug, Clone, Default)]
pub struct InheritanceForest {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl InheritanceForest {
    pub fn new() -> Self {
        InheritanceForest::default()
    }

    /// Record `child` as a subtype of `parent`. Re-recording is a no-op.
    pub fn add_child(&mut self, parent: &str, child: &str) {
        self.edges
            .entry(parent.to_string())
            .or_default()
            .insert(child.to_string());
    }

    pub fn children_of(&self, parent: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(parent)
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Parents that are not themselves a child of anything: the forest roots.
    pub fn roots(&self) -> Vec<&str> {
        let children: BTreeSet<&str> = self
            .edges
            .values()
            .flat_map(|set| set.iter().map(String::as_str))
            .collect();
        self.edges
            .keys()
            .map(String::as_str)
            .filter(|name| !children.contains(name))
            .collect()
    }

    /// Materialize the forest as one tree per root.
    pub fn trees(&self) -> Vec<InheritanceTree> {
        self.roots()
            .into_iter()
            .map(|root| {
                let mut seen = BTreeSet::new();
                self.build_tree(root, &mut seen)
            })
            .collect()
    }

    fn build_tree(&self, name: &str, seen: &mut BTreeSet<String>) -> InheritanceTree {
        let mut node = InheritanceTree::new(name);
        // Flattening rejects cyclic allOf chains, so `seen` only guards
        // against a child reachable through two discriminator parents.
        if !seen.insert(name.to_string()) {
            return node;
        }
        if let Some(children) = self.edges.get(name) {
            for child in children {
                node.children
                    .insert(child.clone(), self.build_tree(child, seen));
            }
        }
        seen.remove(name);
        node
    }
}
