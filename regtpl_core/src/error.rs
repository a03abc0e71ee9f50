use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum TemplateError {
	#[error(transparent)]
	#[diagnostic(code(regtpl::io_error))]
	Io(#[from] std::io::Error),

	/// A character sequence that no lexical rule accepts, or a tab inside the
	/// scanned range.
	#[error("lex error at {line}:{column}: {message}")]
	#[diagnostic(
		code(regtpl::lex),
		help("template bodies are indented with spaces; tabs are not allowed")
	)]
	Lex {
		line: usize,
		column: usize,
		message: String,
	},

	/// The token stream of a directive line does not follow the directive
	/// grammar.
	#[error("parse error at {line}:{column}: {message}")]
	#[diagnostic(
		code(regtpl::parse),
		help(
			"supported directives: DEFINE(\"name\"), REPLACE(`pattern`, $field, FLAG...), \
			 FOREACH($item : $collection), INSERT($field)"
		)
	)]
	Parse {
		line: usize,
		column: usize,
		message: String,
	},

	/// The directives are well formed but break a structural rule of the
	/// template file.
	#[error("validation error at {line}:{column}: {message}")]
	#[diagnostic(code(regtpl::validation))]
	Validation {
		line: usize,
		column: usize,
		message: String,
	},

	#[error("invalid source range {begin}..{end} for text of length {len}")]
	#[diagnostic(
		code(regtpl::invalid_range),
		help("the range must lie within the text and start and end on character boundaries")
	)]
	InvalidRange { begin: usize, end: usize, len: usize },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(regtpl::config_parse),
		help("check that regtpl.toml is valid TOML with a [markers] section")
	)]
	ConfigParse(String),
}

impl TemplateError {
	pub(crate) fn lex(line: usize, column: usize, message: impl Into<String>) -> Self {
		Self::Lex {
			line,
			column,
			message: message.into(),
		}
	}

	pub(crate) fn parse(line: usize, column: usize, message: impl Into<String>) -> Self {
		Self::Parse {
			line,
			column,
			message: message.into(),
		}
	}

	pub(crate) fn validation(line: usize, column: usize, message: impl Into<String>) -> Self {
		Self::Validation {
			line,
			column,
			message: message.into(),
		}
	}

	/// The 0-based `(line, column)` of lexical, syntactic and validation
	/// errors.
	pub fn location(&self) -> Option<(usize, usize)> {
		match self {
			Self::Lex { line, column, .. }
			| Self::Parse { line, column, .. }
			| Self::Validation { line, column, .. } => Some((*line, *column)),
			Self::Io(_) | Self::InvalidRange { .. } | Self::ConfigParse(_) => None,
		}
	}
}

pub type TemplateResult<T> = Result<T, TemplateError>;
