use std::ops::Range;

use logos::Logos;
use serde::Serialize;

use crate::TemplateError;
use crate::TemplateResult;
use crate::config::MarkerConfig;
use crate::lexer::tokenize_directives;
use crate::patterns::RegionMatch;
use crate::patterns::RegionPatterns;
use crate::tokens::Token;

/// Raw character classes the line scanner cares about.
#[derive(Logos, Debug, PartialEq)]
enum RawToken {
	#[token("\n")]
	Newline,
	#[token("\r")]
	CarriageReturn,
	#[token("\t")]
	Tab,
	#[token(" ")]
	Space,
	#[regex(r"[^\r\n\t ]+")]
	Text,
}

/// One logical line of the input, without its line terminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Line {
	/// 0-based line number, counted from the start of the scanned range.
	pub number: usize,
	pub begin: usize,
	pub end: usize,
	/// Count of leading spaces. `None` for empty lines.
	pub indentation: Option<usize>,
	pub kind: LineKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LineKind {
	/// Zero length or whitespace only.
	Empty,
	/// A region start without directive text, e.g. `#region Helpers`.
	RegionStart,
	/// `#region TEMPLATE <directives>`. The tokens cover the directive text.
	RegionStartWithDirectives {
		directives_begin: usize,
		tokens: Vec<Token>,
	},
	RegionEnd,
	Regular,
}

/// Split `range` of `source` into classified lines using the default region
/// markers.
pub fn classify_lines(source: &str, range: Range<usize>) -> TemplateResult<Vec<Line>> {
	let patterns = RegionPatterns::new(&MarkerConfig::default())?;
	classify_lines_with(source, range, &patterns)
}

pub(crate) fn classify_lines_with(
	source: &str,
	range: Range<usize>,
	patterns: &RegionPatterns,
) -> TemplateResult<Vec<Line>> {
	let mut walker = LineWalker {
		source,
		patterns,
		line_begin: range.start,
		indentation: 0,
		content_started: false,
		lines: vec![],
	};

	walker.process(range)?;

	Ok(walker.lines)
}

/// Walks the raw token stream, tracking indentation and line boundaries.
struct LineWalker<'a> {
	source: &'a str,
	patterns: &'a RegionPatterns,
	/// Byte offset of the start of the current line.
	line_begin: usize,
	/// Leading spaces seen on the current line so far.
	indentation: usize,
	/// Whether a character other than a leading space was seen.
	content_started: bool,
	lines: Vec<Line>,
}

impl LineWalker<'_> {
	fn process(&mut self, range: Range<usize>) -> TemplateResult<()> {
		let slice = &self.source[range.clone()];

		for (result, span) in RawToken::lexer(slice).spanned() {
			let offset = range.start + span.start;

			match result {
				Ok(RawToken::Newline) => {
					self.finish_line(offset)?;
					self.line_begin = offset + 1;
					self.indentation = 0;
					self.content_started = false;
				}
				Ok(RawToken::Tab) => {
					return Err(TemplateError::lex(
						self.lines.len(),
						offset - self.line_begin,
						"tab characters are not allowed in templates",
					));
				}
				Ok(RawToken::Space) => {
					if !self.content_started {
						self.indentation += 1;
					}
				}
				Ok(RawToken::CarriageReturn | RawToken::Text) | Err(()) => {
					self.content_started = true;
				}
			}
		}

		// A final line of a single character is not processed.
		if self.source[self.line_begin..range.end].chars().nth(1).is_some() {
			self.finish_line(range.end)?;
		}

		Ok(())
	}

	/// Classify the line that started at `line_begin` and ends at `end`
	/// (exclusive, before the `\n`).
	fn finish_line(&mut self, mut end: usize) -> TemplateResult<()> {
		let begin = self.line_begin;
		let number = self.lines.len();

		if end > begin && self.source.as_bytes()[end - 1] == b'\r' {
			end -= 1;
		}

		let text = &self.source[begin..end];

		if text.trim().is_empty() {
			self.lines.push(Line {
				number,
				begin,
				end,
				indentation: None,
				kind: LineKind::Empty,
			});
			return Ok(());
		}

		let kind = match self.patterns.match_line(text) {
			RegionMatch::Start {
				directives: Some(group),
			} => {
				let directives_begin = begin + group.start;
				let tokens = tokenize_directives(
					self.source,
					directives_begin..begin + group.end,
					number,
					group.start,
				)?;
				LineKind::RegionStartWithDirectives {
					directives_begin,
					tokens,
				}
			}
			RegionMatch::Start { directives: None } => LineKind::RegionStart,
			RegionMatch::End => LineKind::RegionEnd,
			RegionMatch::None => LineKind::Regular,
		};

		self.lines.push(Line {
			number,
			begin,
			end,
			indentation: Some(self.indentation),
			kind,
		});

		Ok(())
	}
}
