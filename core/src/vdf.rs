//! Parser for the brace-delimited, quoted key/value text Steam writes into
//! `appmanifest_*.acf` and `libraryfolders.vdf`.
//!
//! The parser never fails. Lines it cannot make sense of (unterminated quotes,
//! bare words, braces without a key) are skipped so that a single corrupt
//! manifest cannot abort a directory scan.

use log::debug;

/// A value in a parsed document: either a string leaf or a nested mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(String),
    Object(Object),
}

impl Node {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Leaf(value) => Some(value.as_str()),
            Node::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Node::Object(object) => Some(object),
            Node::Leaf(_) => None,
        }
    }
}

/// Ordered string-keyed mapping. Re-assigning a key replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Object {
    entries: Vec<(String, Node)>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, node)| node)
    }

    /// Lookup for files whose casing varies between client versions.
    pub fn get_ignore_case(&self, key: &str) -> Option<&Node> {
        self.get(key).or_else(|| {
            self.entries
                .iter()
                .find(|(existing, _)| existing.eq_ignore_ascii_case(key))
                .map(|(_, node)| node)
        })
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Node::as_str)
    }

    pub fn get_object(&self, key: &str) -> Option<&Object> {
        self.get(key).and_then(Node::as_object)
    }

    pub fn insert(&mut self, key: String, node: Node) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = node,
            None => self.entries.push((key, node)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(key, node)| (key.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn absorb(&mut self, other: Object) {
        for (key, node) in other.entries {
            self.insert(key, node);
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Quoted(String),
    Open,
    Close,
}

struct Frame {
    key: Option<String>,
    object: Object,
}

/// Parses `text` into its root mapping.
pub fn parse(text: &str) -> Object {
    let mut root = Object::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut pending_key: Option<String> = None;

    for (index, line) in text.lines().enumerate() {
        let tokens = match tokenize(line) {
            Some(tokens) => tokens,
            None => {
                debug!("skipping malformed line {}: {}", index + 1, line.trim());
                continue;
            }
        };

        let mut quoted: Vec<String> = Vec::new();
        for token in tokens {
            match token {
                Token::Quoted(value) => quoted.push(value),
                Token::Open => {
                    flush_quoted(&mut quoted, &mut pending_key, top(&mut root, &mut stack));
                    if pending_key.is_none() {
                        debug!("block on line {} has no key; merging into parent", index + 1);
                    }
                    stack.push(Frame {
                        key: pending_key.take(),
                        object: Object::new(),
                    });
                }
                Token::Close => {
                    flush_quoted(&mut quoted, &mut pending_key, top(&mut root, &mut stack));
                    close_frame(&mut root, &mut stack);
                }
            }
        }
        flush_quoted(&mut quoted, &mut pending_key, top(&mut root, &mut stack));
    }

    while !stack.is_empty() {
        close_frame(&mut root, &mut stack);
    }

    root
}

fn top<'a>(root: &'a mut Object, stack: &'a mut [Frame]) -> &'a mut Object {
    match stack.last_mut() {
        Some(frame) => &mut frame.object,
        None => root,
    }
}

fn flush_quoted(quoted: &mut Vec<String>, pending_key: &mut Option<String>, target: &mut Object) {
    let mut drained = quoted.drain(..);
    match (drained.next(), drained.next()) {
        (Some(key), Some(value)) => {
            target.insert(key, Node::Leaf(value));
            *pending_key = None;
        }
        (Some(key), None) => *pending_key = Some(key),
        _ => {}
    }
}

fn close_frame(root: &mut Object, stack: &mut Vec<Frame>) {
    let Some(frame) = stack.pop() else {
        return;
    };
    let parent = top(root, stack);
    match frame.key {
        Some(key) => parent.insert(key, Node::Object(frame.object)),
        None => parent.absorb(frame.object),
    }
}

/// Splits one line into tokens. `//` outside of quotes ends the line.
/// Returns `None` when the line holds an unterminated quote or bare text.
fn tokenize(line: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = line.trim().chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            c if c.is_whitespace() => {}
            '{' => tokens.push(Token::Open),
            '}' => tokens.push(Token::Close),
            '/' if chars.peek() == Some(&'/') => break,
            // platform conditionals such as [$WIN32]
            '[' => {
                if !chars.by_ref().any(|c| c == ']') {
                    return None;
                }
            }
            '"' => {
                let mut value = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some('\\') => value.push('\\'),
                            Some('"') => value.push('"'),
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some(other) => {
                                value.push('\\');
                                value.push(other);
                            }
                            None => value.push('\\'),
                        },
                        other => value.push(other),
                    }
                }
                if !closed {
                    return None;
                }
                tokens.push(Token::Quoted(value));
            }
            _ => return None,
        }
    }

    Some(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
// written by the client
"AppState"
{
    "appid"        "620"   // trailing comment
    "name"         "Portal 2"

    "UserConfig"
    {
        "language"     "english"
    }
    "StateFlags"   "4"
}
"#;

    #[test]
    fn parses_nested_sample_with_comments() {
        let root = parse(SAMPLE);
        let app = root.get_object("AppState").expect("AppState block");
        assert_eq!(app.get_str("appid"), Some("620"));
        assert_eq!(app.get_str("name"), Some("Portal 2"));
        assert_eq!(app.get_str("StateFlags"), Some("4"));
        let user = app.get_object("UserConfig").expect("UserConfig block");
        assert_eq!(user.get_str("language"), Some("english"));
        assert_eq!(root.len(), 1);
    }

    #[test]
    fn preserves_key_order() {
        let root = parse(SAMPLE);
        let app = root.get_object("AppState").unwrap();
        let keys: Vec<&str> = app.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["appid", "name", "UserConfig", "StateFlags"]);
    }

    #[test]
    fn unescapes_windows_paths() {
        let root =
            parse("\"libraryfolders\"\n{\n\"0\"\n{\n\"path\" \"D:\\\\SteamLibrary\"\n}\n}\n");
        let path = root
            .get_object("libraryfolders")
            .and_then(|folders| folders.get_object("0"))
            .and_then(|entry| entry.get_str("path"));
        assert_eq!(path, Some("D:\\SteamLibrary"));
    }

    #[test]
    fn keeps_double_slash_inside_quotes() {
        let root = parse(r#""homepage" "https://example.com/game" // comment"#);
        assert_eq!(root.get_str("homepage"), Some("https://example.com/game"));
    }

    #[test]
    fn survives_unbalanced_braces() {
        let root = parse("}\n}\n\"a\"\n{\n\"b\" \"1\"\n");
        assert_eq!(
            root.get_object("a").and_then(|a| a.get_str("b")),
            Some("1")
        );
    }

    #[test]
    fn skips_malformed_lines_and_continues() {
        let text = "\"root\"\n{\n\"broken \"value\n garbage here\n\"ok\" \"yes\"\n}\n";
        let root = parse(text);
        let block = root.get_object("root").unwrap();
        assert_eq!(block.get_str("ok"), Some("yes"));
        assert_eq!(block.len(), 1);
    }

    #[test]
    fn key_and_brace_on_one_line() {
        let root = parse("\"outer\" {\n\"inner\" { \"k\" \"v\" }\n}");
        let inner = root
            .get_object("outer")
            .and_then(|outer| outer.get_object("inner"))
            .unwrap();
        assert_eq!(inner.get_str("k"), Some("v"));
    }

    #[test]
    fn later_assignment_replaces_earlier() {
        let root = parse("\"k\" \"1\"\n\"k\" \"2\"");
        assert_eq!(root.get_str("k"), Some("2"));
        assert_eq!(root.len(), 1);
    }

    #[test]
    fn keyless_block_merges_into_parent() {
        let root = parse("\"outer\"\n{\n{\n\"k\" \"v\"\n}\n\"after\" \"x\"\n}");
        let outer = root.get_object("outer").unwrap();
        assert_eq!(outer.get_str("k"), Some("v"));
        assert_eq!(outer.get_str("after"), Some("x"));
    }

    #[test]
    fn case_insensitive_lookup_prefers_exact_match() {
        let root = parse("\"LibraryFolders\" { \"a\" \"1\" }\n\"libraryfolders\" { \"b\" \"2\" }");
        let exact = root.get_ignore_case("libraryfolders").and_then(Node::as_object).unwrap();
        assert_eq!(exact.get_str("b"), Some("2"));
        assert!(root.get_ignore_case("LIBRARYFOLDERS").is_some());
        assert!(root.get_ignore_case("missing").is_none());
    }

    #[test]
    fn empty_input_yields_empty_root() {
        assert!(parse("").is_empty());
        assert!(parse("\n\n   // nothing\n").is_empty());
    }
}
