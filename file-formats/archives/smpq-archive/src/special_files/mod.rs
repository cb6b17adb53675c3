//! Special MPQ files handling: (listfile), (attributes), (signature), etc.

mod attributes;
mod listfile;

pub use attributes::{Attributes, flags as attribute_flags};
pub use listfile::parse_listfile;

/// Name table member
pub const RESERVED_LISTFILE: &str = "(listfile)";
/// Digital signature member
pub const RESERVED_SIGNATURE: &str = "(signature)";
/// Extended attributes member
pub const RESERVED_ATTRIBUTES: &str = "(attributes)";
/// Marker contained in the names of patch metadata members
pub const RESERVED_PATCH_METADATA: &str = "(patch_metadata)";

/// Check whether `name` is one of the members the archive format keeps
/// for its own bookkeeping.
pub fn is_reserved_name(name: &str) -> bool {
    name == RESERVED_LISTFILE
        || name == RESERVED_SIGNATURE
        || name == RESERVED_ATTRIBUTES
        || name.contains(RESERVED_PATCH_METADATA)
}

/// Check whether `name` has the shape of a stub name (`File00000012.xxx`)
/// given to members that no listfile names.
pub fn is_stub_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() == 16 && bytes[..4].eq_ignore_ascii_case(b"File") && bytes[12] == b'.'
}

/// Stub name for the member stored at `block_index`
pub fn stub_name(block_index: usize) -> String {
    format!("File{block_index:08}.xxx")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved_name("(listfile)"));
        assert!(is_reserved_name("(signature)"));
        assert!(is_reserved_name("(attributes)"));
        assert!(is_reserved_name("base\\(patch_metadata)"));
        assert!(!is_reserved_name("(LISTFILE)"));
        assert!(!is_reserved_name("data\\(listfile).txt"));
    }

    #[test]
    fn test_stub_names() {
        assert_eq!(stub_name(12), "File00000012.xxx");
        assert!(is_stub_name(&stub_name(12)));
        assert!(is_stub_name("file12345678.wav"));
        assert!(!is_stub_name("File1234567.xxx"));
        assert!(!is_stub_name("Data00000012.xxx"));
    }
}
