use std::ops::Range;

use regex::Regex;
use regex::escape;

use crate::TemplateError;
use crate::TemplateResult;
use crate::config::MarkerConfig;

/// The anchored line patterns used to recognise region boundaries.
#[derive(Debug, Clone)]
pub(crate) struct RegionPatterns {
	start: Regex,
	end: Regex,
}

/// How a single line matched the region patterns. Offsets are relative to
/// the start of the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RegionMatch {
	/// A region start, with the span of the directive text when the line
	/// carries the template marker.
	Start { directives: Option<Range<usize>> },
	End,
	None,
}

impl RegionPatterns {
	pub(crate) fn new(markers: &MarkerConfig) -> TemplateResult<Self> {
		let start = format!(
			r"^\s*{}(?:\s+{}\s+(?P<directives>.*\S))?(?:\s|$)",
			escape(&markers.region_start),
			escape(&markers.template),
		);
		let end = format!(r"^\s*{}(?:\s|$)", escape(&markers.region_end));

		Ok(Self {
			start: compile(&start)?,
			end: compile(&end)?,
		})
	}

	/// Classify the text of one line, which must not contain the line
	/// terminator.
	pub(crate) fn match_line(&self, line: &str) -> RegionMatch {
		if let Some(captures) = self.start.captures(line) {
			return RegionMatch::Start {
				directives: captures.name("directives").map(|group| group.range()),
			};
		}

		if self.end.is_match(line) {
			return RegionMatch::End;
		}

		RegionMatch::None
	}
}

fn compile(pattern: &str) -> TemplateResult<Regex> {
	Regex::new(pattern).map_err(|e| TemplateError::ConfigParse(e.to_string()))
}
