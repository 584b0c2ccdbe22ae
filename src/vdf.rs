//! Minimal text VDF (Valve KeyValues) decoding.
//!
//! Only what the two metadata files need: nested `"key" { ... }` blocks and
//! `"key" "value"` pairs, with `//` comments and backslash escapes. This is
//! a decode-only collaborator; the tool never writes VDF.

use std::collections::BTreeMap;

/// A decoded VDF node.
#[derive(Debug, Clone, PartialEq)]
pub enum VdfValue {
    Str(String),
    Map(BTreeMap<String, VdfValue>),
}

impl VdfValue {
    pub fn get(&self, key: &str) -> Option<&VdfValue> {
        match self {
            VdfValue::Map(m) => m.get(key),
            VdfValue::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            VdfValue::Str(s) => Some(s),
            VdfValue::Map(_) => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VdfError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unexpected token at offset {0}")]
    UnexpectedToken(usize),
}

/// Parse a VDF document into its root map.
pub fn parse(text: &str) -> Result<VdfValue, VdfError> {
    let mut lexer = Lexer::new(text);
    let mut root = BTreeMap::new();
    loop {
        match lexer.next_token()? {
            None => break,
            Some(Token::Str(key)) => {
                let value = parse_value(&mut lexer)?;
                root.insert(key, value);
            }
            Some(_) => return Err(VdfError::UnexpectedToken(lexer.pos)),
        }
    }
    Ok(VdfValue::Map(root))
}

/// Display name from an `appinfo.vdf` document (`common.name`).
pub fn app_name(text: &str) -> Result<Option<String>, VdfError> {
    let root = parse(text)?;
    Ok(root
        .get("common")
        .and_then(|c| c.get("name"))
        .and_then(|n| n.as_str())
        .map(str::to_string))
}

/// Depot id to decryption key mapping from a `key.vdf` document
/// (`depots.<id>.DecryptionKey`). Non-numeric depot ids are skipped.
pub fn depot_keys(text: &str) -> Result<Vec<(u32, String)>, VdfError> {
    let root = parse(text)?;
    let mut keys = Vec::new();
    if let Some(VdfValue::Map(depots)) = root.get("depots") {
        for (id, entry) in depots {
            let Ok(depot_id) = id.parse::<u32>() else {
                continue;
            };
            if let Some(key) = entry.get("DecryptionKey").and_then(|k| k.as_str()) {
                keys.push((depot_id, key.to_string()));
            }
        }
    }
    Ok(keys)
}

fn parse_value(lexer: &mut Lexer) -> Result<VdfValue, VdfError> {
    match lexer.next_token()? {
        Some(Token::Str(s)) => Ok(VdfValue::Str(s)),
        Some(Token::Open) => {
            let mut map = BTreeMap::new();
            loop {
                match lexer.next_token()? {
                    Some(Token::Close) => return Ok(VdfValue::Map(map)),
                    Some(Token::Str(key)) => {
                        let value = parse_value(lexer)?;
                        map.insert(key, value);
                    }
                    Some(Token::Open) => return Err(VdfError::UnexpectedToken(lexer.pos)),
                    None => return Err(VdfError::UnexpectedEof),
                }
            }
        }
        Some(Token::Close) => Err(VdfError::UnexpectedToken(lexer.pos)),
        None => Err(VdfError::UnexpectedEof),
    }
}

enum Token {
    Str(String),
    Open,
    Close,
}

struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, VdfError> {
        self.skip_trivia();
        let Some(&b) = self.bytes.get(self.pos) else {
            return Ok(None);
        };
        match b {
            b'{' => {
                self.pos += 1;
                Ok(Some(Token::Open))
            }
            b'}' => {
                self.pos += 1;
                Ok(Some(Token::Close))
            }
            b'"' => {
                self.pos += 1;
                let mut s = String::new();
                loop {
                    match self.bytes.get(self.pos) {
                        None => return Err(VdfError::UnexpectedEof),
                        Some(b'"') => {
                            self.pos += 1;
                            return Ok(Some(Token::Str(s)));
                        }
                        Some(b'\\') => {
                            self.pos += 1;
                            match self.bytes.get(self.pos) {
                                Some(b'n') => s.push('\n'),
                                Some(b't') => s.push('\t'),
                                Some(&c) => s.push(c as char),
                                None => return Err(VdfError::UnexpectedEof),
                            }
                            self.pos += 1;
                        }
                        Some(&c) => {
                            s.push(c as char);
                            self.pos += 1;
                        }
                    }
                }
            }
            _ => {
                // Unquoted token: runs until whitespace or a brace.
                let start = self.pos;
                while let Some(&c) = self.bytes.get(self.pos) {
                    if c.is_ascii_whitespace() || c == b'{' || c == b'}' || c == b'"' {
                        break;
                    }
                    self.pos += 1;
                }
                if self.pos == start {
                    return Err(VdfError::UnexpectedToken(self.pos));
                }
                let s = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
                Ok(Some(Token::Str(s)))
            }
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            while self
                .bytes
                .get(self.pos)
                .is_some_and(|b| b.is_ascii_whitespace())
            {
                self.pos += 1;
            }
            if self.bytes.get(self.pos) == Some(&b'/') && self.bytes.get(self.pos + 1) == Some(&b'/')
            {
                while self.bytes.get(self.pos).is_some_and(|&b| b != b'\n') {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_vdf() {
        let text = r#"
        "depots"
        {
            "228990"
            {
                "DecryptionKey" "a1b2c3"
            }
            "440"
            {
                "DecryptionKey" "deadbeef"
            }
        }
        "#;
        let mut keys = depot_keys(text).unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec![(440, "deadbeef".to_string()), (228990, "a1b2c3".to_string())]
        );
    }

    #[test]
    fn test_parse_appinfo_name() {
        let text = r#"
        "common"
        {
            "name" "Team Fortress 2"
            "type" "game"
        }
        "#;
        assert_eq!(app_name(text).unwrap().as_deref(), Some("Team Fortress 2"));
    }

    #[test]
    fn test_comments_and_unquoted_tokens() {
        let text = "// header\ndepots { 10 { DecryptionKey cafe } }";
        assert_eq!(depot_keys(text).unwrap(), vec![(10, "cafe".to_string())]);
    }

    #[test]
    fn test_truncated_document_errors() {
        assert!(parse("\"depots\" {").is_err());
    }

    #[test]
    fn test_missing_sections_yield_empty() {
        assert!(depot_keys("\"other\" \"x\"").unwrap().is_empty());
        assert!(app_name("\"other\" \"x\"").unwrap().is_none());
    }
}
