//! Wildcard search over archive member names

/// One member produced by a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindRecord {
    /// Canonical member name (backslash separated)
    pub name: String,
    /// Decoded size of the member as the patch chain resolves it
    pub size: u64,
    /// Time stamp in archive epoch (100ns ticks since 1601), 0 if unknown
    pub file_time: u64,
}

/// Cursor over the results of one search.
///
/// The results are collected when the search starts, so the cursor does
/// not borrow the chain it came from.
#[derive(Debug)]
pub struct FindCursor {
    records: std::vec::IntoIter<FindRecord>,
}

impl FindCursor {
    pub(crate) fn new(records: Vec<FindRecord>) -> Self {
        Self {
            records: records.into_iter(),
        }
    }

    /// Next matching member, `None` once the search is exhausted
    pub fn next_record(&mut self) -> Option<FindRecord> {
        self.records.next()
    }
}

impl Iterator for FindCursor {
    type Item = FindRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record()
    }
}

/// Match `name` against a wildcard `mask`.
///
/// `*` matches any run of characters (including separators), `?` exactly
/// one character. Comparison folds ASCII case. The masks `*` and `*.*`
/// match every name, with or without a dot.
pub fn wildcard_match(mask: &str, name: &str) -> bool {
    if mask == "*" || mask == "*.*" {
        return true;
    }

    let mask = mask.as_bytes();
    let name = name.as_bytes();

    let (mut m, mut n) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while n < name.len() {
        if m < mask.len() && mask[m] == b'*' {
            star = Some((m, n));
            m += 1;
        } else if m < mask.len()
            && (mask[m] == b'?' || mask[m].eq_ignore_ascii_case(&name[n]))
        {
            m += 1;
            n += 1;
        } else if let Some((star_m, star_n)) = star {
            m = star_m + 1;
            n = star_n + 1;
            star = Some((star_m, star_n + 1));
        } else {
            return false;
        }
    }

    mask[m..].iter().all(|&c| c == b'*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_wildcard_basics() {
        assert!(wildcard_match("*", "data\\a.txt"));
        assert!(wildcard_match("*.*", "README"));
        assert!(wildcard_match("*.txt", "data\\a.txt"));
        assert!(wildcard_match("DATA\\*", "data\\sub\\b.bin"));
        assert!(wildcard_match("a?c", "abc"));
        assert!(!wildcard_match("a?c", "ac"));
        assert!(!wildcard_match("*.txt", "a.txt.bak"));
        assert!(wildcard_match("*.t*t", "x.tabt"));
        assert!(wildcard_match("", ""));
        assert!(!wildcard_match("", "a"));
    }

    #[test]
    fn test_literal_mask_matches_itself_only() {
        assert!(wildcard_match("units\\human\\footman.mdx", "Units\\Human\\Footman.mdx"));
        assert!(!wildcard_match("units\\human\\footman.mdx", "units\\human\\footman.mdl"));
    }

    #[test]
    fn test_cursor_drains_in_order() {
        let record = |name: &str| FindRecord {
            name: name.to_string(),
            size: 1,
            file_time: 0,
        };
        let mut cursor = FindCursor::new(vec![record("a"), record("b")]);
        assert_eq!(cursor.next_record().unwrap().name, "a");
        assert_eq!(cursor.next().unwrap().name, "b");
        assert!(cursor.next_record().is_none());
    }

    proptest! {
        #[test]
        fn prop_name_matches_itself(name in "[a-zA-Z0-9_\\\\.]{0,40}") {
            prop_assert!(wildcard_match(&name, &name));
            prop_assert!(wildcard_match(&name.to_ascii_uppercase(), &name));
        }

        #[test]
        fn prop_prefix_star_matches(prefix in "[a-z\\\\]{0,10}", rest in "[a-z.]{0,10}") {
            let mask = format!("{prefix}*");
            let name = format!("{prefix}{rest}");
            prop_assert!(wildcard_match(&mask, &name));
        }
    }
}
