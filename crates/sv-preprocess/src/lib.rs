//! Comment-stripping transform over raw SystemVerilog text.
//!
//! Operates on characters, not tokens: string literals are respected,
//! newlines are always preserved so line numbers survive the transform.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StripError {
    #[error("Replacement must be a single character.")]
    ReplacementTooLong,
}

/// How to rewrite comment text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    /// Delete comment contents and delimiters (newlines kept).
    Delete,
    /// Replace comment contents *and* delimiters with spaces.
    Spaces,
    /// Keep the delimiters, fill the contents with this character.
    Fill(char),
}

impl Replacement {
    /// Interpret a CLI replacement argument: absent means spaces, an
    /// empty string means delete, a single character fills with it.
    pub fn from_arg(arg: Option<&str>) -> Result<Self, StripError> {
        match arg {
            None => Ok(Replacement::Spaces),
            Some("") => Ok(Replacement::Delete),
            Some(" ") => Ok(Replacement::Spaces),
            Some(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Replacement::Fill(c)),
                    _ => Err(StripError::ReplacementTooLong),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    InString,
    InLineComment,
    InBlockComment,
}

/// Strip `//` and `/* */` comments from `source`.
///
/// Newlines inside comments are always kept. `//` sequences inside
/// string literals are left untouched.
#[must_use]
pub fn strip_comments(source: &str, replacement: Replacement) -> String {
    let mut out = String::with_capacity(source.len());
    let chars: Vec<char> = source.chars().collect();
    let mut state = State::Normal;
    let mut i = 0;

    let emit_delimiter = |out: &mut String, text: &str| match replacement {
        Replacement::Delete => {}
        Replacement::Spaces => out.push_str(&" ".repeat(text.chars().count())),
        Replacement::Fill(_) => out.push_str(text),
    };
    let emit_content = |out: &mut String, c: char| {
        if c == '\n' {
            out.push('\n');
            return;
        }
        match replacement {
            Replacement::Delete => {}
            Replacement::Spaces => out.push(' '),
            Replacement::Fill(fill) => out.push(fill),
        }
    };

    while i < chars.len() {
        let c = chars[i];
        match state {
            State::Normal => {
                if c == '/' && chars.get(i + 1) == Some(&'/') {
                    state = State::InLineComment;
                    emit_delimiter(&mut out, "//");
                    i += 2;
                } else if c == '/' && chars.get(i + 1) == Some(&'*') {
                    state = State::InBlockComment;
                    emit_delimiter(&mut out, "/*");
                    i += 2;
                } else {
                    if c == '"' {
                        state = State::InString;
                    }
                    out.push(c);
                    i += 1;
                }
            }
            State::InString => {
                if c == '\\' && i + 1 < chars.len() {
                    out.push(c);
                    out.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                if c == '"' {
                    state = State::Normal;
                }
                out.push(c);
                i += 1;
            }
            State::InLineComment => {
                if c == '\n' {
                    state = State::Normal;
                    out.push('\n');
                } else {
                    emit_content(&mut out, c);
                }
                i += 1;
            }
            State::InBlockComment => {
                if c == '*' && chars.get(i + 1) == Some(&'/') {
                    state = State::Normal;
                    emit_delimiter(&mut out, "*/");
                    i += 2;
                } else {
                    emit_content(&mut out, c);
                    i += 1;
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spaces_replace_contents_and_delimiters() {
        let out = strip_comments("wire w; // note\n", Replacement::Spaces);
        assert_eq!(out, "wire w;        \n");
        assert_eq!(out.len(), "wire w; // note\n".len());
    }

    #[test]
    fn test_delete_removes_comment_but_keeps_newlines() {
        let out = strip_comments("a /* x\ny */ b", Replacement::Delete);
        assert_eq!(out, "a \n b");
    }

    #[test]
    fn test_fill_keeps_delimiters() {
        let out = strip_comments("a /*xy*/ b", Replacement::Fill('.'));
        assert_eq!(out, "a /*..*/ b");
        let out = strip_comments("a // xy\n", Replacement::Fill('.'));
        assert_eq!(out, "a //...\n");
    }

    #[test]
    fn test_string_literals_untouched() {
        let src = "s = \"// not a comment\"; // real\n";
        let out = strip_comments(src, Replacement::Spaces);
        assert_eq!(out, "s = \"// not a comment\";        \n");
    }

    #[test]
    fn test_escaped_quote_in_string() {
        let src = "s = \"a\\\"b// still string\";";
        let out = strip_comments(src, Replacement::Spaces);
        assert_eq!(out, src);
    }

    #[test]
    fn test_block_comment_newlines_preserved_in_all_modes() {
        for replacement in [Replacement::Delete, Replacement::Spaces, Replacement::Fill('#')] {
            let out = strip_comments("/* a\nb\nc */", replacement);
            assert_eq!(out.matches('\n').count(), 2, "{replacement:?}");
        }
    }

    #[test]
    fn test_replacement_from_arg() {
        assert_eq!(Replacement::from_arg(None), Ok(Replacement::Spaces));
        assert_eq!(Replacement::from_arg(Some("")), Ok(Replacement::Delete));
        assert_eq!(Replacement::from_arg(Some(" ")), Ok(Replacement::Spaces));
        assert_eq!(Replacement::from_arg(Some(".")), Ok(Replacement::Fill('.')));
        assert_eq!(
            Replacement::from_arg(Some("ab")),
            Err(StripError::ReplacementTooLong)
        );
    }

    #[test]
    fn test_unterminated_block_comment_consumed() {
        let out = strip_comments("a /* open", Replacement::Delete);
        assert_eq!(out, "a ");
    }
}
