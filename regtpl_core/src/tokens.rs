use std::fmt::Display;
use std::ops::Range;

use serde::Serialize;

/// The kinds of token that can appear in the directive text of a
/// `#region TEMPLATE ...` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
	/// A bare word, e.g. `REPLACE` or `REMOVE_IF_NULL`.
	Identifier,
	/// `$` optionally followed by a dotted path, e.g. `$item.name`.
	FieldAccessor,
	/// `(`
	OpenParen,
	/// `)`
	CloseParen,
	/// A double quoted string, e.g. `"name"`.
	QuotedString,
	/// A backtick delimited pattern source, e.g. `` `\d+` ``.
	BacktickString,
	/// `,`
	Comma,
	/// `:`
	Colon,
	/// Terminates every token list.
	EndOfLine,
}

impl TokenKind {
	/// A readable name used in diagnostics.
	pub fn description(self) -> &'static str {
		match self {
			Self::Identifier => "identifier",
			Self::FieldAccessor => "field accessor (`$name.path`)",
			Self::OpenParen => "`(`",
			Self::CloseParen => "`)`",
			Self::QuotedString => "quoted string",
			Self::BacktickString => "backtick string",
			Self::Comma => "`,`",
			Self::Colon => "`:`",
			Self::EndOfLine => "end of line",
		}
	}
}

impl Display for TokenKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.description())
	}
}

/// A token referencing the source buffer by byte offsets.
///
/// `line` and `column` are 0-based and only used for diagnostics; `column` is
/// a byte offset from the start of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Token {
	pub kind: TokenKind,
	pub begin: usize,
	pub end: usize,
	pub line: usize,
	pub column: usize,
}

impl Token {
	pub fn span(&self) -> Range<usize> {
		self.begin..self.end
	}

	/// The slice of `source` this token covers.
	pub fn text<'a>(&self, source: &'a str) -> &'a str {
		&source[self.span()]
	}

	/// The token text without its first and last byte. Used for quoted and
	/// backtick strings whose delimiters are single ASCII characters.
	pub fn inner_text<'a>(&self, source: &'a str) -> &'a str {
		&source[self.begin + 1..self.end - 1]
	}
}
