use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::TemplateError;
use crate::TemplateResult;
use crate::tokens::Token;
use crate::tokens::TokenKind;

/// One entry of the directive lexer. Rules without a kind are recognised but
/// not emitted.
struct LexicalRule {
	kind: Option<TokenKind>,
	pattern: Regex,
}

/// The rules are tried in this exact order and the first one that matches at
/// the current position wins, regardless of match length.
static RULES: LazyLock<Vec<LexicalRule>> = LazyLock::new(|| {
	[
		(None, r"\A\s+"),
		(Some(TokenKind::Identifier), r"\A[A-Za-z_][A-Za-z0-9_]*"),
		(
			Some(TokenKind::FieldAccessor),
			r"\A\$(?:[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)?",
		),
		(Some(TokenKind::QuotedString), r#"\A"(?:[^"\\]|\\.)*""#),
		(Some(TokenKind::BacktickString), r"\A`[^`]*`"),
		(Some(TokenKind::OpenParen), r"\A\("),
		(Some(TokenKind::CloseParen), r"\A\)"),
		(Some(TokenKind::Comma), r"\A,"),
		(Some(TokenKind::Colon), r"\A:"),
	]
	.into_iter()
	.map(|(kind, source)| {
		LexicalRule {
			kind,
			pattern: Regex::new(source)
				.unwrap_or_else(|e| panic!("invalid lexical rule `{source}`: {e}")),
		}
	})
	.collect()
});

/// Tokenize the directive text found in `range` of `source`.
///
/// `line` and `column` locate the start of `range` for diagnostics. The
/// returned list always ends with a single [`TokenKind::EndOfLine`] token.
pub fn tokenize_directives(
	source: &str,
	range: Range<usize>,
	line: usize,
	column: usize,
) -> TemplateResult<Vec<Token>> {
	let mut tokens = Vec::new();
	let mut position = range.start;

	while position < range.end {
		let remaining = &source[position..range.end];
		let token_column = column + (position - range.start);

		let Some((rule, length)) = RULES.iter().find_map(|rule| {
			rule.pattern
				.find(remaining)
				.map(|found| (rule, found.end()))
		}) else {
			let character = remaining.chars().next().unwrap_or_default();
			return Err(TemplateError::lex(
				line,
				token_column,
				format!("unexpected character `{}`", character.escape_default()),
			));
		};

		if let Some(kind) = rule.kind {
			tokens.push(Token {
				kind,
				begin: position,
				end: position + length,
				line,
				column: token_column,
			});
		}

		position += length;
	}

	tokens.push(Token {
		kind: TokenKind::EndOfLine,
		begin: range.end,
		end: range.end,
		line,
		column: column + (range.end - range.start),
	});

	Ok(tokens)
}
