//! Multi-document YAML splitting.

/// Split `text` into its YAML documents.
///
/// Documents are separated by a line holding `---`, optionally followed by a
/// `#` comment. Documents made only of blank lines and comments are dropped, so
/// leading and trailing separators never produce empty documents.
#[must_use]
pub fn split_documents(text: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current = String::new();

    for line in text.split_inclusive('\n') {
        if is_separator(line) {
            push_document(&mut documents, std::mem::take(&mut current));
        } else {
            current.push_str(line);
        }
    }
    push_document(&mut documents, current);

    documents
}

/// Number of documents `split_documents` would return for `text`.
#[must_use]
pub fn count_documents(text: &str) -> usize {
    split_documents(text).len()
}

fn is_separator(line: &str) -> bool {
    let line = line.trim_end();
    match line.strip_prefix("---") {
        Some(rest) => rest.is_empty() || rest.trim_start().starts_with('#'),
        None => false,
    }
}

fn push_document(documents: &mut Vec<String>, document: String) {
    let has_content = document.lines().any(|line| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with('#')
    });
    if has_content {
        documents.push(document);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_document() {
        let docs = split_documents("kind: Task\nmetadata:\n  name: a\n");
        assert_eq!(docs.len(), 1);
        assert!(docs[0].contains("name: a"));
    }

    #[test]
    fn test_leading_and_trailing_separators() {
        let docs = split_documents("---\nkind: Task\n---\n");
        assert_eq!(docs, vec!["kind: Task\n".to_string()]);
    }

    #[test]
    fn test_multiple_documents() {
        let docs = split_documents("a: 1\n---\nb: 2\n--- # third\nc: 3");
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[2], "c: 3");
    }

    #[test]
    fn test_comment_only_documents_are_dropped() {
        let docs = split_documents("# header\n---\na: 1\n---\n# nothing here\n\n");
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_dashes_inside_values_do_not_split() {
        let docs = split_documents("args:\n- \"---\"\n- ----x\n");
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_crlf_separator() {
        assert_eq!(count_documents("a: 1\r\n---\r\nb: 2\r\n"), 2);
    }
}
