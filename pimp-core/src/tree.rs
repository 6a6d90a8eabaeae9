//! Message tree substrate: named nodes with attributes, text (de)serialization.
//!
//! The wire format is a minimal XML dialect: nested tags carrying data only in
//! double-quoted attributes. An optional `<?...?>` prolog and comments are
//! skipped on parse for compatibility with peers that emit full documents.

/// One node of a message tree: tag name, ordered attributes (unique keys),
/// ordered children. Children are exclusively owned by their parent; no node
/// is ever shared between two trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<TreeNode>,
}

/// Error parsing wire text into a tree. Malformed input is always a
/// distinguishable failure, never a degenerate node.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unexpected character `{0}` at byte {1}")]
    Unexpected(char, usize),
    #[error("closing tag `{found}` does not match `{expected}`")]
    MismatchedTag { expected: String, found: String },
    #[error("unknown entity `&{0};`")]
    BadEntity(String),
    #[error("trailing data after document root")]
    TrailingData,
}

impl TreeNode {
    /// Create a node with no attributes and no children.
    pub fn new(name: &str) -> Self {
        TreeNode {
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct children in document order. Order is significant for list
    /// sections; callers walking a list iterate this directly.
    pub fn children(&self) -> &[TreeNode] {
        &self.children
    }

    /// First direct child with the given name, if any. When several children
    /// share a name (legal for list sections) the rest are only reachable via
    /// [`children`](Self::children).
    pub fn child(&self, name: &str) -> Option<&TreeNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut TreeNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Append a child; the node takes exclusive ownership.
    pub fn add_child(&mut self, child: TreeNode) {
        self.children.push(child);
    }

    /// Set an attribute, replacing any existing value under the same key.
    /// Keys stay unique per node; insertion order is preserved.
    pub fn set_attribute(&mut self, key: &str, value: &str) {
        if let Some(slot) = self.attributes.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value.to_string();
        } else {
            self.attributes.push((key.to_string(), value.to_string()));
        }
    }

    pub fn set_int_attribute(&mut self, key: &str, value: i64) {
        self.set_attribute(key, &value.to_string());
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attribute(key).is_some()
    }

    /// Numeric read with permissive defaults: absent or non-numeric
    /// attributes read as 0.
    pub fn int_attribute(&self, key: &str) -> i64 {
        self.attribute(key)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0)
    }

    /// Serialize to wire text. Deterministic; round-trips through
    /// [`parse`](Self::parse).
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            escape_into(value, out);
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
        } else {
            out.push('>');
            for child in &self.children {
                child.write(out);
            }
            out.push_str("</");
            out.push_str(&self.name);
            out.push('>');
        }
    }

    /// Parse wire text into a tree.
    pub fn parse(text: &str) -> Result<TreeNode, ParseError> {
        let mut p = Parser {
            src: text.as_bytes(),
            pos: 0,
        };
        p.skip_misc();
        let root = p.element()?;
        p.skip_ws();
        if p.peek().is_some() {
            return Err(ParseError::TrailingData);
        }
        Ok(root)
    }
}

fn escape_into(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn eat(&mut self, prefix: &[u8]) -> bool {
        if self.src[self.pos..].starts_with(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, want: u8) -> Result<(), ParseError> {
        match self.bump() {
            Some(b) if b == want => Ok(()),
            Some(b) => Err(ParseError::Unexpected(b as char, self.pos - 1)),
            None => Err(ParseError::UnexpectedEof),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    /// Skip whitespace, `<?...?>` prologs, and comments before the root.
    fn skip_misc(&mut self) {
        loop {
            self.skip_ws();
            if self.eat(b"<?") {
                while !self.eat(b"?>") {
                    if self.bump().is_none() {
                        return;
                    }
                }
            } else if self.eat(b"<!--") {
                while !self.eat(b"-->") {
                    if self.bump().is_none() {
                        return;
                    }
                }
            } else {
                return;
            }
        }
    }

    fn name(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b':') {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return match self.peek() {
                Some(b) => Err(ParseError::Unexpected(b as char, self.pos)),
                None => Err(ParseError::UnexpectedEof),
            };
        }
        Ok(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    fn element(&mut self) -> Result<TreeNode, ParseError> {
        self.expect(b'<')?;
        let name = self.name()?;
        let mut node = TreeNode::new(&name);
        loop {
            self.skip_ws();
            if self.eat(b"/>") {
                return Ok(node);
            }
            if self.eat(b">") {
                break;
            }
            let key = self.name()?;
            self.skip_ws();
            self.expect(b'=')?;
            self.skip_ws();
            self.expect(b'"')?;
            let value = self.quoted_value()?;
            node.set_attribute(&key, &value);
        }
        loop {
            // Character data carries nothing in this dialect; skip to markup.
            while let Some(b) = self.peek() {
                if b == b'<' {
                    break;
                }
                self.pos += 1;
            }
            if self.peek().is_none() {
                return Err(ParseError::UnexpectedEof);
            }
            if self.eat(b"<!--") {
                while !self.eat(b"-->") {
                    if self.bump().is_none() {
                        return Err(ParseError::UnexpectedEof);
                    }
                }
                continue;
            }
            if self.eat(b"</") {
                let close = self.name()?;
                if close != name {
                    return Err(ParseError::MismatchedTag {
                        expected: name,
                        found: close,
                    });
                }
                self.skip_ws();
                self.expect(b'>')?;
                return Ok(node);
            }
            let child = self.element()?;
            node.add_child(child);
        }
    }

    fn quoted_value(&mut self) -> Result<String, ParseError> {
        let mut out: Vec<u8> = Vec::new();
        loop {
            match self.bump() {
                None => return Err(ParseError::UnexpectedEof),
                Some(b'"') => return Ok(String::from_utf8_lossy(&out).into_owned()),
                Some(b'&') => {
                    let start = self.pos;
                    while matches!(self.peek(), Some(b) if b != b';') {
                        self.pos += 1;
                    }
                    if self.bump().is_none() {
                        return Err(ParseError::UnexpectedEof);
                    }
                    match &self.src[start..self.pos - 1] {
                        b"amp" => out.push(b'&'),
                        b"lt" => out.push(b'<'),
                        b"gt" => out.push(b'>'),
                        b"quot" => out.push(b'"'),
                        b"apos" => out.push(b'\''),
                        other => {
                            return Err(ParseError::BadEntity(
                                String::from_utf8_lossy(other).into_owned(),
                            ))
                        }
                    }
                }
                Some(b) => out.push(b),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_roundtrip() {
        let mut root = TreeNode::new("Doc");
        root.set_attribute("A", "one");
        let mut child = TreeNode::new("Item");
        child.set_attribute("Value", "two");
        child.set_int_attribute("N", 42);
        root.add_child(child);
        root.add_child(TreeNode::new("Empty"));

        let text = root.serialize();
        let parsed = TreeNode::parse(&text).unwrap();
        assert_eq!(parsed, root);
    }

    #[test]
    fn escaping_roundtrip() {
        let mut root = TreeNode::new("Doc");
        root.set_attribute("Value", "a & b <c> \"quoted\"");
        let parsed = TreeNode::parse(&root.serialize()).unwrap();
        assert_eq!(parsed.attribute("Value"), Some("a & b <c> \"quoted\""));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            TreeNode::parse("this is not a document"),
            Err(ParseError::Unexpected(_, _))
        ));
        assert!(matches!(TreeNode::parse(""), Err(ParseError::UnexpectedEof)));
    }

    #[test]
    fn mismatched_close_tag() {
        assert!(matches!(
            TreeNode::parse("<A><B></A></B>"),
            Err(ParseError::MismatchedTag { .. })
        ));
    }

    #[test]
    fn trailing_data_rejected() {
        assert!(matches!(
            TreeNode::parse("<A/>junk"),
            Err(ParseError::TrailingData)
        ));
    }

    #[test]
    fn prolog_comments_and_whitespace_skipped() {
        let text = "<?xml version=\"1.0\"?>\n<!-- hi -->\n<Doc>\n  <Item Value=\"x\"/>\n</Doc>\n";
        let parsed = TreeNode::parse(text).unwrap();
        assert_eq!(parsed.name(), "Doc");
        assert_eq!(parsed.children().len(), 1);
        assert_eq!(parsed.child("Item").unwrap().attribute("Value"), Some("x"));
    }

    #[test]
    fn child_returns_first_match_only() {
        let text = "<L><E Value=\"1\"/><E Value=\"2\"/></L>";
        let parsed = TreeNode::parse(text).unwrap();
        assert_eq!(parsed.child("E").unwrap().attribute("Value"), Some("1"));
        assert_eq!(parsed.children().len(), 2);
    }

    #[test]
    fn set_attribute_replaces_in_place() {
        let mut node = TreeNode::new("N");
        node.set_attribute("A", "1");
        node.set_attribute("B", "2");
        node.set_attribute("A", "3");
        assert_eq!(node.attribute("A"), Some("3"));
        // First-set order preserved.
        assert!(node.serialize().starts_with("<N A=\"3\" B=\"2\""));
    }

    #[test]
    fn int_attribute_defaults_to_zero() {
        let mut node = TreeNode::new("N");
        node.set_attribute("Bad", "not a number");
        assert_eq!(node.int_attribute("Bad"), 0);
        assert_eq!(node.int_attribute("Missing"), 0);
        node.set_int_attribute("Size", 1024);
        assert_eq!(node.int_attribute("Size"), 1024);
    }

    #[test]
    fn unknown_entity_rejected() {
        assert!(matches!(
            TreeNode::parse("<A V=\"&bogus;\"/>"),
            Err(ParseError::BadEntity(_))
        ));
    }
}
