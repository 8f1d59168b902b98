//! IRC formatting code handling.
//!
//! Services decorate their replies with bold and color codes
//! (`*** \x02End of Info\x02 ***`); matching on the visible text needs them
//! stripped first.
//!
//! # IRC Format Codes
//! - 0x02 (^B): Bold
//! - 0x03 (^C): Color (followed by optional foreground,background)
//! - 0x0F (^O): Reset all formatting
//! - 0x11: Monospace
//! - 0x16 (^V): Reverse/Inverse
//! - 0x1D: Italic
//! - 0x1E: Strikethrough
//! - 0x1F (^_): Underline

use std::borrow::Cow;

/// IRC format control characters (color handled separately).
const FORMAT_CHARS: &[char] = &[
    '\x02', // Bold
    '\x03', // Color
    '\x0F', // Reset
    '\x11', // Monospace
    '\x16', // Reverse
    '\x1D', // Italic
    '\x1E', // Strikethrough
    '\x1F', // Underline
];

/// Extension trait for handling formatted IRC strings.
pub trait FormattedStringExt<'a> {
    /// Check if the string contains any IRC formatting codes.
    fn is_formatted(&self) -> bool;

    /// Strip all IRC formatting codes from the string.
    ///
    /// Returns `Cow::Borrowed` if no formatting was present.
    fn strip_formatting(self) -> Cow<'a, str>;
}

impl<'a> FormattedStringExt<'a> for &'a str {
    fn is_formatted(&self) -> bool {
        self.contains(FORMAT_CHARS)
    }

    fn strip_formatting(self) -> Cow<'a, str> {
        if !self.is_formatted() {
            return Cow::Borrowed(self);
        }

        let mut result = String::with_capacity(self.len());
        let mut parser = ColorParser::new();

        for c in self.chars() {
            if parser.consume(c) {
                result.push(c);
            }
        }

        Cow::Owned(result)
    }
}

enum State {
    Text,
    /// Just saw ^C
    ColorStart,
    /// One foreground digit seen
    Foreground1,
    /// Two foreground digits seen
    Foreground2,
    /// Comma after foreground
    Comma,
    /// One background digit seen
    Background1,
}

struct ColorParser {
    state: State,
}

impl ColorParser {
    fn new() -> Self {
        Self { state: State::Text }
    }

    /// Consume a character, returning true if it should be kept.
    fn consume(&mut self, c: char) -> bool {
        use State::*;

        match self.state {
            _ if c == '\x03' => {
                self.state = ColorStart;
                false
            }
            Text => !FORMAT_CHARS.contains(&c),
            ColorStart if c.is_ascii_digit() => {
                self.state = Foreground1;
                false
            }
            Foreground1 if c.is_ascii_digit() => {
                self.state = Foreground2;
                false
            }
            Foreground1 | Foreground2 if c == ',' => {
                self.state = Comma;
                false
            }
            Comma if c.is_ascii_digit() => {
                self.state = Background1;
                false
            }
            Background1 if c.is_ascii_digit() => {
                self.state = Text;
                false
            }
            _ => {
                self.state = Text;
                !FORMAT_CHARS.contains(&c)
            }
        }
    }
}
