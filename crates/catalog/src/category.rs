//! Category hierarchy used by the storefront filter.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use atelier_core::{CategoryId, DomainError, DomainResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub parent: Option<CategoryId>,
}

/// Categories plus an explicit parent→children index.
///
/// Traversals are iterative and guarded by a visited set, so a corrupted
/// index can never loop forever; the tree itself refuses moves that would
/// create a cycle.
#[derive(Debug, Clone, Default)]
pub struct CategoryTree {
    categories: BTreeMap<CategoryId, Category>,
    children: BTreeMap<CategoryId, BTreeSet<CategoryId>>,
}

impl CategoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn contains(&self, id: CategoryId) -> bool {
        self.categories.contains_key(&id)
    }

    pub fn get(&self, id: CategoryId) -> Option<&Category> {
        self.categories.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn add(
        &mut self,
        id: CategoryId,
        name: impl Into<String>,
        parent: Option<CategoryId>,
    ) -> DomainResult<&Category> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("category name cannot be empty"));
        }
        if self.categories.contains_key(&id) {
            return Err(DomainError::conflict(format!("category {id} already exists")));
        }
        if let Some(parent) = parent {
            if !self.categories.contains_key(&parent) {
                return Err(DomainError::not_found("category", parent));
            }
            self.children.entry(parent).or_default().insert(id);
        }

        let category = self.categories.entry(id).or_insert(Category {
            id,
            name: name.trim().to_string(),
            parent,
        });
        Ok(category)
    }

    /// Re-parent `id`. Moving a category under itself or one of its
    /// descendants is rejected.
    pub fn move_category(&mut self, id: CategoryId, new_parent: Option<CategoryId>) -> DomainResult<()> {
        let old_parent = self
            .categories
            .get(&id)
            .ok_or_else(|| DomainError::not_found("category", id))?
            .parent;

        if let Some(target) = new_parent {
            if !self.categories.contains_key(&target) {
                return Err(DomainError::not_found("category", target));
            }
            if self.descendants_of(id)?.contains(&target) {
                return Err(DomainError::validation(format!(
                    "category {id} cannot become its own ancestor"
                )));
            }
        }

        if old_parent == new_parent {
            return Ok(());
        }

        if let Some(old) = old_parent {
            if let Some(siblings) = self.children.get_mut(&old) {
                siblings.remove(&id);
                if siblings.is_empty() {
                    self.children.remove(&old);
                }
            }
        }
        if let Some(target) = new_parent {
            self.children.entry(target).or_default().insert(id);
        }
        if let Some(category) = self.categories.get_mut(&id) {
            category.parent = new_parent;
        }
        Ok(())
    }

    /// The category itself followed by every descendant, breadth first.
    pub fn descendants_of(&self, id: CategoryId) -> DomainResult<Vec<CategoryId>> {
        if !self.categories.contains_key(&id) {
            return Err(DomainError::not_found("category", id));
        }

        let mut out = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            out.push(current);
            if let Some(kids) = self.children.get(&current) {
                queue.extend(kids.iter().copied().filter(|k| !visited.contains(k)));
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_chain() -> (CategoryTree, CategoryId, CategoryId, CategoryId) {
        let mut tree = CategoryTree::new();
        let rings = CategoryId::new();
        let gold = CategoryId::new();
        let engagement = CategoryId::new();
        tree.add(rings, "Anillos", None).unwrap();
        tree.add(gold, "Oro", Some(rings)).unwrap();
        tree.add(engagement, "Compromiso", Some(gold)).unwrap();
        (tree, rings, gold, engagement)
    }

    #[test]
    fn descendants_include_self_and_every_level() {
        let (tree, rings, gold, engagement) = tree_with_chain();

        let ids = tree.descendants_of(rings).unwrap();
        assert_eq!(ids, vec![rings, gold, engagement]);

        assert_eq!(tree.descendants_of(engagement).unwrap(), vec![engagement]);
    }

    #[test]
    fn unknown_parent_is_not_found() {
        let mut tree = CategoryTree::new();
        let err = tree.add(CategoryId::new(), "Collares", Some(CategoryId::new())).unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "category", .. }));
        assert!(tree.is_empty());
    }

    #[test]
    fn move_under_own_descendant_is_rejected() {
        let (mut tree, rings, _gold, engagement) = tree_with_chain();

        let err = tree.move_category(rings, Some(engagement)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = tree.move_category(rings, Some(rings)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        // Tree unchanged.
        assert_eq!(tree.get(rings).unwrap().parent, None);
        assert_eq!(tree.descendants_of(rings).unwrap().len(), 3);
    }

    #[test]
    fn move_updates_children_index() {
        let (mut tree, rings, gold, engagement) = tree_with_chain();

        tree.move_category(engagement, Some(rings)).unwrap();
        assert_eq!(tree.descendants_of(gold).unwrap(), vec![gold]);
        assert!(tree.descendants_of(rings).unwrap().contains(&engagement));

        tree.move_category(gold, None).unwrap();
        assert_eq!(tree.descendants_of(rings).unwrap(), vec![rings, engagement]);
    }

    #[test]
    fn corrupted_index_does_not_loop() {
        let (mut tree, rings, _gold, engagement) = tree_with_chain();
        // Force a cycle behind the tree's back.
        tree.children.entry(engagement).or_default().insert(rings);

        let ids = tree.descendants_of(rings).unwrap();
        assert_eq!(ids.len(), 3);
    }
}
