//! `(listfile)` and host listfile text

use std::borrow::Cow;

/// Name on one listfile line, if the line carries one.
///
/// Everything from the first `;` on is a comment, so is a line starting
/// with `#`.
fn entry(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let name = line.split(';').next().unwrap_or_default().trim_end();
    (!name.is_empty()).then_some(name)
}

/// Split listfile text into names, in file order.
///
/// Invalid UTF-8 is replaced rather than rejected; listfiles found in old
/// archives are frequently Latin-1.
pub fn parse_listfile(data: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(data);
    if matches!(text, Cow::Owned(_)) {
        log::warn!("listfile is not valid UTF-8, undecodable bytes replaced");
    }

    let names: Vec<String> = text.lines().filter_map(entry).map(str::to_owned).collect();
    log::debug!("listfile: {} names", names.len());
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_comments_and_line_endings() {
        let text = b"; header comment\r\n\
                     war3map.j\r\n\
                     # another comment\n\
                     units\\footman.mdx;1234\n\
                     \n   \n\
                     ;\n\
                     sound\\ambient.wav  ";

        assert_eq!(
            parse_listfile(text),
            vec!["war3map.j", "units\\footman.mdx", "sound\\ambient.wav"]
        );
    }

    #[test]
    fn test_latin1_bytes_are_replaced() {
        let names = parse_listfile(b"ok.txt\ncaf\xE9.txt\n");
        assert_eq!(names, vec!["ok.txt".to_string(), "caf\u{FFFD}.txt".to_string()]);
    }
}
