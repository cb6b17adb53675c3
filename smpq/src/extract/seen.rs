//! Names already handled during one mask sweep
//!
//! A prefix tree over name bytes. Nodes live in one arena and refer to
//! their children by index, so the whole tree goes away in a single drop
//! when [`SeenSet::release`] consumes the set.
//!
//! Byte `0xFF` is never stored. Member names are UTF-8, which cannot
//! contain it, but [`SeenSet::insert`] also accepts raw bytes: a name
//! holding `0xFF` is not inserted and [`SeenSet::contains`] reports it as
//! unseen.

const RESERVED_BYTE: u8 = 0xFF;

#[derive(Debug, Default)]
struct Node {
    /// `(byte, node index)` sorted by byte
    children: Vec<(u8, usize)>,
    terminal: bool,
}

impl Node {
    fn child(&self, byte: u8) -> Option<usize> {
        self.children
            .binary_search_by_key(&byte, |&(b, _)| b)
            .ok()
            .map(|slot| self.children[slot].1)
    }
}

/// Set of names, see the module documentation
#[derive(Debug)]
pub struct SeenSet {
    nodes: Vec<Node>,
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SeenSet {
    /// Empty set
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
        }
    }

    /// Record `name`. Returns `true` if it was not in the set before.
    ///
    /// Names containing byte `0xFF` are ignored and return `false`.
    pub fn insert(&mut self, name: impl AsRef<[u8]>) -> bool {
        let name = name.as_ref();
        if name.contains(&RESERVED_BYTE) {
            log::warn!("Name with reserved byte 0xFF not recorded");
            return false;
        }

        let mut current = 0;
        for &byte in name {
            current = match self.nodes[current]
                .children
                .binary_search_by_key(&byte, |&(b, _)| b)
            {
                Ok(slot) => self.nodes[current].children[slot].1,
                Err(slot) => {
                    let index = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[current].children.insert(slot, (byte, index));
                    index
                }
            };
        }

        !std::mem::replace(&mut self.nodes[current].terminal, true)
    }

    /// Whether `name` was inserted before
    pub fn contains(&self, name: impl AsRef<[u8]>) -> bool {
        let mut current = 0;
        for &byte in name.as_ref() {
            if byte == RESERVED_BYTE {
                return false;
            }
            match self.nodes[current].child(byte) {
                Some(next) => current = next,
                None => return false,
            }
        }
        self.nodes[current].terminal
    }

    /// Number of tree nodes, the root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Free the whole tree
    pub fn release(self) {
        log::trace!("Releasing name set with {} nodes", self.nodes.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_insert_is_idempotent() {
        let mut seen = SeenSet::new();
        assert!(seen.insert("data\\a.txt"));
        let nodes = seen.node_count();
        assert!(!seen.insert("data\\a.txt"));
        assert_eq!(seen.node_count(), nodes);
        assert!(seen.contains("data\\a.txt"));
    }

    #[test]
    fn test_prefixes_are_not_members() {
        let mut seen = SeenSet::new();
        seen.insert("data\\a.txt");
        assert!(!seen.contains("data\\a"));
        assert!(!seen.contains("data\\a.txt.bak"));
        assert!(!seen.contains(""));

        seen.insert("data\\a");
        assert!(seen.contains("data\\a"));
    }

    #[test]
    fn test_shared_prefixes_share_nodes() {
        let mut seen = SeenSet::new();
        seen.insert("abc");
        seen.insert("abd");
        assert_eq!(seen.node_count(), 5);
    }

    #[test]
    fn test_reserved_byte() {
        let mut seen = SeenSet::new();
        assert!(!seen.insert([b'a', 0xFF]));
        assert!(!seen.contains([b'a', 0xFF]));
        assert_eq!(seen.node_count(), 1);
    }

    #[test]
    fn test_case_sensitive() {
        let mut seen = SeenSet::new();
        seen.insert("A.txt");
        assert!(!seen.contains("a.txt"));
    }

    proptest! {
        #[test]
        fn prop_no_false_negatives(names in prop::collection::vec("[a-zA-Z\\\\._]{0,24}", 0..40)) {
            let mut seen = SeenSet::new();
            for name in &names {
                seen.insert(name);
            }
            for name in &names {
                prop_assert!(seen.contains(name));
            }
        }

        #[test]
        fn prop_membership_matches_insertions(
            inserted in prop::collection::hash_set("[ab]{0,6}", 0..20),
            candidate in "[ab]{0,6}",
        ) {
            let mut seen = SeenSet::new();
            for name in &inserted {
                seen.insert(name);
            }
            prop_assert_eq!(seen.contains(&candidate), inserted.contains(&candidate));
        }
    }
}
