use serde::Serialize;
use snailquote::unescape;

use crate::TemplateError;
use crate::TemplateResult;
use crate::tokens::Token;
use crate::tokens::TokenKind;

/// A structured instruction taken from a `#region TEMPLATE ...` line.
///
/// The directive opens a region that lasts until the matching `#endregion`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Directive {
	pub kind: DirectiveKind,
	/// 0-based line of the directive keyword.
	pub line: usize,
	/// 0-based byte column of the directive keyword.
	pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum DirectiveKind {
	/// `DEFINE("name")` introduces a named sub template.
	Define { name: String },
	/// ``REPLACE(`pattern`, $field.path, FLAG...)`` substitutes every match of
	/// `pattern` inside the region with the value of `variable`.
	Replace {
		pattern: String,
		variable: String,
		flags: ReplaceFlags,
	},
	/// `FOREACH($item : $collection)` repeats the region per element.
	Foreach {
		variable: String,
		collection: String,
	},
	/// `INSERT($field.path)` replaces the whole region with a value. Insert
	/// regions can't contain other regions.
	Insert { variable: String },
}

impl DirectiveKind {
	/// The keyword that introduces this directive.
	pub fn keyword(&self) -> &'static str {
		match self {
			Self::Define { .. } => "DEFINE",
			Self::Replace { .. } => "REPLACE",
			Self::Foreach { .. } => "FOREACH",
			Self::Insert { .. } => "INSERT",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[non_exhaustive]
pub enum ReplaceFlag {
	/// Remove the whole output line when the replacement value is null.
	RemoveIfNull,
}

impl ReplaceFlag {
	pub fn from_keyword(keyword: &str) -> Option<Self> {
		match keyword {
			"REMOVE_IF_NULL" => Some(Self::RemoveIfNull),
			_ => None,
		}
	}
}

impl std::fmt::Display for ReplaceFlag {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::RemoveIfNull => write!(f, "REMOVE_IF_NULL"),
		}
	}
}

/// The set of flags attached to a `REPLACE` directive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaceFlags {
	remove_if_null: bool,
}

impl ReplaceFlags {
	pub fn insert(&mut self, flag: ReplaceFlag) {
		match flag {
			ReplaceFlag::RemoveIfNull => self.remove_if_null = true,
		}
	}

	pub fn contains(&self, flag: ReplaceFlag) -> bool {
		match flag {
			ReplaceFlag::RemoveIfNull => self.remove_if_null,
		}
	}

	pub fn is_empty(&self) -> bool {
		!self.remove_if_null
	}
}

/// Parse the tokens of a single directive line.
///
/// `line_begin` is the byte offset of the start of the line and is used to
/// compute directive columns. Tokens that don't start a known directive are
/// skipped, so a line without any directive keyword yields an empty list.
pub fn parse_directives(
	source: &str,
	line: usize,
	line_begin: usize,
	tokens: &[Token],
) -> TemplateResult<Vec<Directive>> {
	if tokens.is_empty() {
		return Ok(vec![]);
	}

	debug_assert_eq!(
		tokens.last().map(|token| token.kind),
		Some(TokenKind::EndOfLine),
		"token lists are terminated by `EndOfLine`"
	);

	let mut parser = DirectiveParser {
		source,
		tokens,
		cursor: 0,
	};
	let mut directives = vec![];

	while parser.peek().kind != TokenKind::EndOfLine {
		let token = parser.advance();

		if token.kind != TokenKind::Identifier {
			continue;
		}

		let kind = match token.text(source) {
			"DEFINE" => parser.parse_define()?,
			"REPLACE" => parser.parse_replace()?,
			"FOREACH" => parser.parse_foreach()?,
			"INSERT" => parser.parse_insert()?,
			_ => continue,
		};

		directives.push(Directive {
			kind,
			line,
			column: token.begin - line_begin,
		});
	}

	Ok(directives)
}

/// Recursive descent over one line of tokens.
struct DirectiveParser<'a> {
	source: &'a str,
	tokens: &'a [Token],
	cursor: usize,
}

impl DirectiveParser<'_> {
	fn peek(&self) -> Token {
		self.tokens[self.cursor]
	}

	/// Return the current token and move past it. The cursor never moves
	/// beyond the terminating `EndOfLine`.
	fn advance(&mut self) -> Token {
		let token = self.peek();

		if token.kind != TokenKind::EndOfLine {
			self.cursor += 1;
		}

		token
	}

	fn consume(&mut self, expected: TokenKind) -> TemplateResult<Token> {
		let token = self.peek();

		if token.kind != expected {
			return Err(TemplateError::parse(
				token.line,
				token.column,
				format!("expected {expected}, found {}", token.kind),
			));
		}

		Ok(self.advance())
	}

	/// The accessor path without its leading `$`.
	fn field_name(&self, token: &Token) -> String {
		token.text(self.source)[1..].to_string()
	}

	fn parse_define(&mut self) -> TemplateResult<DirectiveKind> {
		self.consume(TokenKind::OpenParen)?;
		let token = self.consume(TokenKind::QuotedString)?;
		self.consume(TokenKind::CloseParen)?;

		let name = if token.inner_text(self.source).contains('\\') {
			unescape(token.text(self.source)).map_err(|e| {
				TemplateError::parse(
					token.line,
					token.column,
					format!("invalid escape sequence in template name: {e}"),
				)
			})?
		} else {
			token.inner_text(self.source).to_string()
		};

		Ok(DirectiveKind::Define { name })
	}

	fn parse_replace(&mut self) -> TemplateResult<DirectiveKind> {
		self.consume(TokenKind::OpenParen)?;
		let pattern = self.consume(TokenKind::BacktickString)?;
		self.consume(TokenKind::Comma)?;
		let variable = self.consume(TokenKind::FieldAccessor)?;

		let mut flags = ReplaceFlags::default();

		while self.peek().kind == TokenKind::Comma {
			self.advance();
			let flag_token = self.consume(TokenKind::Identifier)?;
			let keyword = flag_token.text(self.source);
			let Some(flag) = ReplaceFlag::from_keyword(keyword) else {
				return Err(TemplateError::parse(
					flag_token.line,
					flag_token.column,
					format!("unknown replace flag `{keyword}`"),
				));
			};
			flags.insert(flag);
		}

		self.consume(TokenKind::CloseParen)?;

		Ok(DirectiveKind::Replace {
			pattern: pattern.inner_text(self.source).to_string(),
			variable: self.field_name(&variable),
			flags,
		})
	}

	fn parse_foreach(&mut self) -> TemplateResult<DirectiveKind> {
		self.consume(TokenKind::OpenParen)?;
		let variable = self.consume(TokenKind::FieldAccessor)?;
		self.consume(TokenKind::Colon)?;
		let collection = self.consume(TokenKind::FieldAccessor)?;
		self.consume(TokenKind::CloseParen)?;

		Ok(DirectiveKind::Foreach {
			variable: self.field_name(&variable),
			collection: self.field_name(&collection),
		})
	}

	fn parse_insert(&mut self) -> TemplateResult<DirectiveKind> {
		self.consume(TokenKind::OpenParen)?;
		let variable = self.consume(TokenKind::FieldAccessor)?;
		self.consume(TokenKind::CloseParen)?;

		Ok(DirectiveKind::Insert {
			variable: self.field_name(&variable),
		})
	}
}
