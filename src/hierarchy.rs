//! Mailbox hierarchy
//!
//! Servers report mailboxes as a nested mapping of names to entries
//! (see [`BoxEntry`]); [`build_tree`] turns that into path-qualified
//! [`MailboxNode`]s, keeping the server's order.

use serde::Serialize;

/// One mailbox as reported by the session, with its sub-mailboxes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxEntry {
    pub name: String,
    /// Separator between this mailbox's path and its children's names.
    pub delimiter: String,
    pub children: Option<Vec<BoxEntry>>,
}

impl BoxEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, delimiter: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delimiter: delimiter.into(),
            children: None,
        }
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<Self>) -> Self {
        self.children = Some(children);
        self
    }
}

/// A mailbox in the tree returned by
/// [`Fetcher::list_boxes`](crate::Fetcher::list_boxes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailboxNode {
    #[serde(rename = "text")]
    pub name: String,
    /// Full path of the mailbox, usable with `list` and `fetch`.
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<MailboxNode>>,
}

/// Build the mailbox tree for `entries`, prefixing every id with
/// `parent_id`.
///
/// ```
/// use imap_fetcher::{BoxEntry, build_tree};
///
/// let entries = vec![
///     BoxEntry::new("INBOX", "/").with_children(vec![BoxEntry::new("test", "/")]),
/// ];
/// let tree = build_tree(&entries, "");
/// assert_eq!(tree[0].id, "INBOX");
/// assert_eq!(tree[0].children.as_ref().unwrap()[0].id, "INBOX/test");
/// ```
#[must_use]
pub fn build_tree(entries: &[BoxEntry], parent_id: &str) -> Vec<MailboxNode> {
    entries
        .iter()
        .map(|entry| {
            let id = format!("{parent_id}{}", entry.name);
            let children = entry.children.as_ref().map(|children| {
                let prefix = format!("{id}{}", entry.delimiter);
                build_tree(children, &prefix)
            });
            MailboxNode {
                name: entry.name.clone(),
                id,
                children,
            }
        })
        .collect()
}

/// Nest a flat listing of `(full path, delimiter)` pairs.
///
/// Order of first appearance is kept at every level. Parents that the
/// listing does not name on their own (unsubscribed parents of
/// subscribed mailboxes) are created on the way.
pub fn nest_flat_names<I>(flat: I) -> Vec<BoxEntry>
where
    I: IntoIterator<Item = (String, Option<String>)>,
{
    let mut roots: Vec<BoxEntry> = Vec::new();

    for (path, delimiter) in flat {
        let delimiter = delimiter.unwrap_or_default();
        let segments: Vec<&str> = if delimiter.is_empty() {
            vec![path.as_str()]
        } else {
            path.split(delimiter.as_str()).collect()
        };

        let mut level = &mut roots;
        for (depth, segment) in segments.iter().enumerate() {
            let idx = match level.iter().position(|e| e.name == *segment) {
                Some(idx) => idx,
                None => {
                    level.push(BoxEntry::new(*segment, delimiter.clone()));
                    level.len() - 1
                }
            };
            if depth + 1 == segments.len() {
                break;
            }
            level = level[idx].children.get_or_insert_with(Vec::new);
        }
    }

    roots
}
