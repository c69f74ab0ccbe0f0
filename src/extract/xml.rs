//! Small helpers shared by the OOXML readers.
//!
//! Both readers walk the XML event stream once and decide what to keep by
//! looking at the chain of open elements, compared by *local* name so that
//! documents using unusual namespace prefixes still parse.

use crate::error::StudyError;
use crate::format::DocumentFormat;
use quick_xml::events::BytesStart;
use std::fmt::Display;

/// Chain of currently open elements, by local name.
#[derive(Debug, Default)]
pub(crate) struct ElementStack {
    names: Vec<Vec<u8>>,
}

impl ElementStack {
    pub fn push(&mut self, local_name: &[u8]) {
        self.names.push(local_name.to_vec());
    }

    pub fn pop(&mut self) {
        self.names.pop();
    }

    pub fn depth(&self) -> usize {
        self.names.len()
    }

    /// Innermost open element.
    pub fn top(&self) -> Option<&[u8]> {
        self.names.last().map(Vec::as_slice)
    }

    /// Element enclosing the innermost one.
    pub fn parent(&self) -> Option<&[u8]> {
        self.names
            .len()
            .checked_sub(2)
            .map(|i| self.names[i].as_slice())
    }

    pub fn top_is(&self, local_name: &[u8]) -> bool {
        self.top() == Some(local_name)
    }

    pub fn parent_is(&self, local_name: &[u8]) -> bool {
        self.parent() == Some(local_name)
    }

    pub fn contains(&self, local_name: &[u8]) -> bool {
        self.names.iter().any(|n| n == local_name)
    }
}

/// Value of the first attribute whose key satisfies `pred`.
pub(crate) fn attr_value(e: &BytesStart<'_>, pred: impl Fn(&[u8]) -> bool) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| pred(a.key.as_ref()))
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Map a quick-xml failure to a corrupt-document error naming the part.
pub(crate) fn malformed(format: DocumentFormat, part: &str, err: impl Display) -> StudyError {
    StudyError::CorruptDocument {
        format,
        detail: format!("malformed XML in '{}': {}", part, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_tracks_parent_and_top() {
        let mut s = ElementStack::default();
        assert!(s.top().is_none());
        s.push(b"body");
        assert_eq!(s.parent(), None);
        s.push(b"p");
        assert!(s.top_is(b"p"));
        assert!(s.parent_is(b"body"));
        assert!(s.contains(b"body"));
        assert!(!s.contains(b"tbl"));
        s.pop();
        assert_eq!(s.depth(), 1);
    }
}
