use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::Requirement;

/// A set of requirements, deduplicated by their canonical line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet(BTreeMap<String, Requirement>);

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a requirement, returning `false` if an equivalent one was already present.
    pub fn insert(&mut self, requirement: Requirement) -> bool {
        match self.0.entry(requirement.constructed_line()) {
            Entry::Vacant(entry) => {
                entry.insert(requirement);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn contains_line(&self, line: &str) -> bool {
        self.0.contains_key(line)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.0.values()
    }

    /// The canonical lines, in sorted order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl Extend<Requirement> for DependencySet {
    fn extend<T: IntoIterator<Item = Requirement>>(&mut self, iter: T) {
        for requirement in iter {
            self.insert(requirement);
        }
    }
}

impl FromIterator<Requirement> for DependencySet {
    fn from_iter<T: IntoIterator<Item = Requirement>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl IntoIterator for DependencySet {
    type Item = Requirement;
    type IntoIter = std::collections::btree_map::IntoValues<String, Requirement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_values()
    }
}

impl<'a> IntoIterator for &'a DependencySet {
    type Item = &'a Requirement;
    type IntoIter = std::collections::btree_map::Values<'a, String, Requirement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.values()
    }
}

#[cfg(test)]
mod tests {
    use crate::{DependencySet, Requirement};

    #[test]
    fn deduplicates_by_line() {
        let mut set = DependencySet::new();
        assert!(set.insert(Requirement::from_line("six>=1.0").unwrap()));
        assert!(!set.insert(Requirement::from_line("six >= 1.0").unwrap()));
        assert!(set.insert(Requirement::from_line("six>=1.0; python_version < '3'").unwrap()));
        assert_eq!(
            set.lines().collect::<Vec<_>>(),
            vec!["six>=1.0", "six>=1.0; python_version < '3'"]
        );
    }
}
