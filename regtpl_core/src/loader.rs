use std::collections::BTreeMap;
use std::ops::Range;

use derive_more::Deref;
use regex::Captures;
use regex::Regex;
use serde::Serialize;

use crate::ReplaceFlags;
use crate::TemplateConfig;
use crate::TemplateError;
use crate::TemplateResult;
use crate::lines::Line;
use crate::lines::LineKind;
use crate::lines::classify_lines_with;
use crate::parser::Directive;
use crate::parser::DirectiveKind;
use crate::parser::parse_directives;
use crate::patterns::RegionPatterns;

/// The capture groups of a `REPLACE` pattern match, as absolute byte spans
/// into the source. Group 0 is the whole match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternMatch {
	pub groups: Vec<Option<Range<usize>>>,
}

impl PatternMatch {
	fn from_captures(captures: &Captures<'_>, offset: usize) -> Self {
		let groups = captures
			.iter()
			.map(|group| group.map(|found| offset + found.start()..offset + found.end()))
			.collect();

		Self { groups }
	}

	pub fn group(&self, index: usize) -> Option<Range<usize>> {
		self.groups.get(index).cloned().flatten()
	}
}

/// A newline free slice of template text, either literal or matched by an
/// active `REPLACE` pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextRange {
	pub begin: usize,
	pub end: usize,
	/// Set on the first range of each output line to the line's indentation
	/// relative to the template.
	pub indentation: Option<usize>,
	/// A line break follows this range.
	pub starts_new_line: bool,
	/// Present when the range is a replacement site.
	pub pattern: Option<PatternMatch>,
}

impl TextRange {
	fn literal(begin: usize, end: usize) -> Self {
		Self {
			begin,
			end,
			indentation: None,
			starts_new_line: false,
			pattern: None,
		}
	}

	pub fn span(&self) -> Range<usize> {
		self.begin..self.end
	}

	pub fn is_match(&self) -> bool {
		self.pattern.is_some()
	}
}

/// Links a matched range to the `REPLACE` region that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplaceRangeRef {
	/// Index into [`LoadedTemplate::ranges`].
	pub range_index: usize,
	/// Value of the template's replace range counter when the match was
	/// emitted.
	pub replace_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RegionKind {
	Foreach {
		variable: String,
		collection: String,
	},
	Replace {
		variable: String,
		flags: ReplaceFlags,
		replace_ranges: Vec<ReplaceRangeRef>,
	},
	Insert {
		indentation: usize,
		variable: String,
	},
}

/// A flat region boundary event. Nesting is recovered by pairing `Begin` and
/// `End` markers with a stack, see [`LoadedTemplate::regions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RegionMarker {
	Begin {
		range_index: usize,
		replace_range_index: usize,
		region: RegionKind,
	},
	End {
		range_index: usize,
		replace_range_index: usize,
	},
}

impl RegionMarker {
	pub fn range_index(&self) -> usize {
		match self {
			Self::Begin { range_index, .. } | Self::End { range_index, .. } => *range_index,
		}
	}

	pub fn region(&self) -> Option<&RegionKind> {
		match self {
			Self::Begin { region, .. } => Some(region),
			Self::End { .. } => None,
		}
	}
}

/// A matched pair of region markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegionSpan {
	pub begin_marker: usize,
	pub end_marker: usize,
	/// Number of regions enclosing this one.
	pub depth: usize,
}

/// The immutable result of loading one template body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedTemplate<'a> {
	source: &'a str,
	markers: Vec<RegionMarker>,
	ranges: Vec<TextRange>,
	replace_range_count: usize,
}

impl<'a> LoadedTemplate<'a> {
	pub fn source(&self) -> &'a str {
		self.source
	}

	pub fn markers(&self) -> &[RegionMarker] {
		&self.markers
	}

	pub fn ranges(&self) -> &[TextRange] {
		&self.ranges
	}

	/// Total number of replacement sites across all `REPLACE` regions.
	pub fn replace_range_count(&self) -> usize {
		self.replace_range_count
	}

	/// The source text covered by `range`.
	pub fn text(&self, range: &TextRange) -> &'a str {
		&self.source[range.span()]
	}

	/// Pair up the region markers, ordered by their `Begin` marker.
	///
	/// # Panics
	///
	/// Panics if the markers are unbalanced, which a successful load never
	/// produces.
	pub fn regions(&self) -> Vec<RegionSpan> {
		let mut open = vec![];
		let mut spans = vec![];

		for (index, marker) in self.markers.iter().enumerate() {
			match marker {
				RegionMarker::Begin { .. } => open.push(index),
				RegionMarker::End { .. } => {
					let begin_marker = open
						.pop()
						.unwrap_or_else(|| panic!("region end marker {index} has no begin marker"));
					spans.push(RegionSpan {
						begin_marker,
						end_marker: index,
						depth: open.len(),
					});
				}
			}
		}

		assert!(open.is_empty(), "unbalanced region markers");
		spans.sort_by_key(|span| span.begin_marker);

		spans
	}
}

/// Named templates produced by [`TemplateLoader::load_all`], in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deref)]
pub struct TemplateSet<'a>(BTreeMap<String, LoadedTemplate<'a>>);

impl<'a> TemplateSet<'a> {
	pub fn into_inner(self) -> BTreeMap<String, LoadedTemplate<'a>> {
		self.0
	}
}

impl<'a> IntoIterator for TemplateSet<'a> {
	type IntoIter = std::collections::btree_map::IntoIter<String, LoadedTemplate<'a>>;
	type Item = (String, LoadedTemplate<'a>);

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}

/// Loads annotated source text into [`LoadedTemplate`]s.
///
/// The region patterns are compiled once and reused for every load.
#[derive(Debug, Clone)]
pub struct TemplateLoader {
	patterns: RegionPatterns,
}

impl TemplateLoader {
	pub fn new(config: &TemplateConfig) -> TemplateResult<Self> {
		Ok(Self {
			patterns: RegionPatterns::new(&config.markers)?,
		})
	}

	/// Load `range` of `source` as one anonymous template. `DEFINE`
	/// directives are rejected.
	#[tracing::instrument(skip_all, fields(begin = range.start, end = range.end))]
	pub fn load<'a>(
		&self,
		source: &'a str,
		range: Range<usize>,
	) -> TemplateResult<LoadedTemplate<'a>> {
		let lines = self.classify(source, range)?;
		let mut loader = Loader::new(source, LoadMode::Single);
		loader.body = Some(TemplateBody::new(String::new(), 0));
		loader.walk(&lines)?;

		Ok(loader.take_body())
	}

	/// Load every `DEFINE` region in `range` of `source` as a named template.
	/// Every top level directive region must be a `DEFINE`.
	#[tracing::instrument(skip_all, fields(begin = range.start, end = range.end))]
	pub fn load_all<'a>(
		&self,
		source: &'a str,
		range: Range<usize>,
	) -> TemplateResult<TemplateSet<'a>> {
		let lines = self.classify(source, range)?;
		let mut loader = Loader::new(source, LoadMode::Multiple);
		loader.walk(&lines)?;

		Ok(TemplateSet(loader.templates))
	}

	fn classify(&self, source: &str, range: Range<usize>) -> TemplateResult<Vec<Line>> {
		let valid = range.start <= range.end
			&& range.end <= source.len()
			&& source.is_char_boundary(range.start)
			&& source.is_char_boundary(range.end);

		if !valid {
			return Err(TemplateError::InvalidRange {
				begin: range.start,
				end: range.end,
				len: source.len(),
			});
		}

		classify_lines_with(source, range, &self.patterns)
	}
}

/// Load `range` of `source` as one anonymous template using the default
/// markers.
pub fn load_template(source: &str, range: Range<usize>) -> TemplateResult<LoadedTemplate<'_>> {
	TemplateLoader::new(&TemplateConfig::default())?.load(source, range)
}

/// Load the named templates in `range` of `source` using the default markers.
pub fn load_templates(source: &str, range: Range<usize>) -> TemplateResult<TemplateSet<'_>> {
	TemplateLoader::new(&TemplateConfig::default())?.load_all(source, range)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadMode {
	/// The whole input is one anonymous template.
	Single,
	/// Templates are introduced by top level `DEFINE` regions.
	Multiple,
}

/// A template body under construction.
struct TemplateBody {
	name: String,
	base_indentation: usize,
	markers: Vec<RegionMarker>,
	ranges: Vec<TextRange>,
	replace_range_count: usize,
}

impl TemplateBody {
	fn new(name: String, base_indentation: usize) -> Self {
		Self {
			name,
			base_indentation,
			markers: vec![],
			ranges: vec![],
			replace_range_count: 0,
		}
	}

	fn push_range(&mut self, source: &str, range: TextRange) {
		debug_assert!(
			!source[range.span()].contains('\n'),
			"text ranges never contain a newline"
		);
		self.ranges.push(range);
	}

	fn push_begin(&mut self, region: RegionKind) -> usize {
		self.markers.push(RegionMarker::Begin {
			range_index: self.ranges.len(),
			replace_range_index: self.replace_range_count,
			region,
		});

		self.markers.len() - 1
	}

	fn push_end(&mut self) {
		self.markers.push(RegionMarker::End {
			range_index: self.ranges.len(),
			replace_range_index: self.replace_range_count,
		});
	}

	/// Attach the most recently pushed range to the `REPLACE` region that
	/// begins at `marker_index`.
	fn record_replace(&mut self, marker_index: usize) {
		let reference = ReplaceRangeRef {
			range_index: self.ranges.len() - 1,
			replace_index: self.replace_range_count,
		};

		match &mut self.markers[marker_index] {
			RegionMarker::Begin {
				region: RegionKind::Replace { replace_ranges, .. },
				..
			} => replace_ranges.push(reference),
			marker => panic!("active replace points at a non replace marker: {marker:?}"),
		}

		self.replace_range_count += 1;
	}
}

/// The pattern of a `REPLACE` region that is currently open.
struct ActiveReplace {
	pattern: Regex,
	/// Index of the region's `Begin` marker in the current body.
	marker_index: usize,
}

/// The directives opened by one region start line.
struct Frame {
	line: usize,
	column: usize,
	directives: Vec<Directive>,
}

/// Single use state machine that walks classified lines.
struct Loader<'a> {
	source: &'a str,
	mode: LoadMode,
	body: Option<TemplateBody>,
	templates: BTreeMap<String, LoadedTemplate<'a>>,
	frames: Vec<Frame>,
	active_replaces: Vec<ActiveReplace>,
	nesting_level: usize,
	in_insert: bool,
}

impl<'a> Loader<'a> {
	fn new(source: &'a str, mode: LoadMode) -> Self {
		Self {
			source,
			mode,
			body: None,
			templates: BTreeMap::new(),
			frames: vec![],
			active_replaces: vec![],
			nesting_level: 0,
			in_insert: false,
		}
	}

	fn walk(&mut self, lines: &[Line]) -> TemplateResult<()> {
		for (index, line) in lines.iter().enumerate() {
			let is_last_line = index + 1 == lines.len();

			match &line.kind {
				LineKind::Empty => self.push_empty_line(line, is_last_line),
				LineKind::Regular => self.push_regular_line(line, is_last_line)?,
				LineKind::RegionStart => {
					self.push_frame(line, vec![]);
					self.push_regular_line(line, is_last_line)?;
				}
				LineKind::RegionStartWithDirectives { tokens, .. } => {
					let directives = parse_directives(self.source, line.number, line.begin, tokens)?;

					if self.body.is_some() {
						self.relative_indentation(line)?;
					}

					if directives.is_empty() {
						self.push_frame(line, directives);
						continue;
					}

					for directive in &directives {
						self.enter_region(line, directive)?;
						self.nesting_level += 1;
					}

					self.push_frame(line, directives);
				}
				LineKind::RegionEnd => {
					let Some(frame) = self.frames.pop() else {
						return Err(TemplateError::validation(
							line.number,
							line.indentation.unwrap_or(0),
							"region end without a matching region start",
						));
					};

					if frame.directives.is_empty() {
						self.push_regular_line(line, is_last_line)?;
						continue;
					}

					if self.body.is_some() {
						self.relative_indentation(line)?;
					}

					for directive in frame.directives.iter().rev() {
						self.nesting_level -= 1;
						self.exit_region(directive);
					}
				}
			}
		}

		if let Some(frame) = self.frames.last() {
			return Err(TemplateError::validation(
				frame.line,
				frame.column,
				"region is never closed",
			));
		}

		Ok(())
	}

	fn push_frame(&mut self, line: &Line, directives: Vec<Directive>) {
		self.frames.push(Frame {
			line: line.number,
			column: line.indentation.unwrap_or(0),
			directives,
		});
	}

	fn body_mut(&mut self) -> &mut TemplateBody {
		self.body
			.as_mut()
			.unwrap_or_else(|| panic!("directive regions are only entered inside a template body"))
	}

	/// Move the current body out into a finished template.
	fn take_body(&mut self) -> LoadedTemplate<'a> {
		let body = self
			.body
			.take()
			.unwrap_or_else(|| panic!("no template body is open"));

		tracing::debug!(
			name = %body.name,
			ranges = body.ranges.len(),
			markers = body.markers.len(),
			replace_ranges = body.replace_range_count,
			"loaded template"
		);

		LoadedTemplate {
			source: self.source,
			markers: body.markers,
			ranges: body.ranges,
			replace_range_count: body.replace_range_count,
		}
	}

	fn enter_region(&mut self, line: &Line, directive: &Directive) -> TemplateResult<()> {
		let expecting_define = self.mode == LoadMode::Multiple && self.nesting_level == 0;
		let is_define = matches!(directive.kind, DirectiveKind::Define { .. });

		tracing::trace!(
			keyword = directive.kind.keyword(),
			line = directive.line,
			"enter region"
		);

		if expecting_define && !is_define {
			return Err(TemplateError::validation(
				directive.line,
				directive.column,
				format!(
					"expected define directive, found {}",
					directive.kind.keyword()
				),
			));
		}

		match &directive.kind {
			DirectiveKind::Define { name } => {
				if !expecting_define {
					return Err(TemplateError::validation(
						directive.line,
						directive.column,
						"can't define sub template here; DEFINE is only allowed at the top level \
						 of a multi template file",
					));
				}

				if name.is_empty() {
					return Err(TemplateError::validation(
						directive.line,
						directive.column,
						"template name must not be empty",
					));
				}

				if self.templates.contains_key(name) {
					return Err(TemplateError::validation(
						directive.line,
						directive.column,
						format!("duplicate template name `{name}`"),
					));
				}

				self.body = Some(TemplateBody::new(
					name.clone(),
					line.indentation.unwrap_or(0),
				));
			}
			_ if self.in_insert => {
				return Err(TemplateError::validation(
					directive.line,
					directive.column,
					"can't have any regions inside an insert region",
				));
			}
			DirectiveKind::Foreach {
				variable,
				collection,
			} => {
				self.body_mut().push_begin(RegionKind::Foreach {
					variable: variable.clone(),
					collection: collection.clone(),
				});
			}
			DirectiveKind::Replace {
				pattern,
				variable,
				flags,
			} => {
				let compiled = Regex::new(pattern).map_err(|e| {
					TemplateError::validation(
						directive.line,
						directive.column,
						format!("invalid replace pattern `{pattern}`: {e}"),
					)
				})?;
				let marker_index = self.body_mut().push_begin(RegionKind::Replace {
					variable: variable.clone(),
					flags: *flags,
					replace_ranges: vec![],
				});
				self.active_replaces.push(ActiveReplace {
					pattern: compiled,
					marker_index,
				});
			}
			DirectiveKind::Insert { variable } => {
				let indentation = self.relative_indentation(line)?;
				self.body_mut().push_begin(RegionKind::Insert {
					indentation,
					variable: variable.clone(),
				});
				self.in_insert = true;
			}
		}

		Ok(())
	}

	fn exit_region(&mut self, directive: &Directive) {
		tracing::trace!(keyword = directive.kind.keyword(), "exit region");

		match &directive.kind {
			DirectiveKind::Define { name } => {
				debug_assert!(self.active_replaces.is_empty());
				let template = self.take_body();
				self.templates.insert(name.clone(), template);
				return;
			}
			DirectiveKind::Replace { .. } => {
				let popped = self.active_replaces.pop();
				assert!(popped.is_some(), "replace region exit without an active pattern");
			}
			DirectiveKind::Insert { .. } => self.in_insert = false,
			DirectiveKind::Foreach { .. } => {}
		}

		self.body_mut().push_end();
	}

	/// The line's indentation relative to the current template body.
	fn relative_indentation(&self, line: &Line) -> TemplateResult<usize> {
		let indentation = line.indentation.unwrap_or(0);
		let base = self.body.as_ref().map_or(0, |body| body.base_indentation);

		indentation.checked_sub(base).ok_or_else(|| {
			TemplateError::validation(
				line.number,
				indentation,
				format!(
					"indentation {indentation} is smaller than template region indentation {base}"
				),
			)
		})
	}

	fn push_empty_line(&mut self, line: &Line, is_last_line: bool) {
		if is_last_line {
			return;
		}

		let source = self.source;

		if let Some(body) = self.body.as_mut() {
			let mut range = TextRange::literal(line.begin, line.begin);
			range.starts_new_line = true;
			body.push_range(source, range);
		}
	}

	/// Split a content line into literal and matched ranges.
	fn push_regular_line(&mut self, line: &Line, is_last_line: bool) -> TemplateResult<()> {
		if self.in_insert || self.body.is_none() {
			return Ok(());
		}

		let relative = self.relative_indentation(line)?;
		let source = self.source;
		let text = &source[line.begin..line.end];
		let Some(body) = self.body.as_mut() else {
			return Ok(());
		};

		let first_range = body.ranges.len();
		let mut cursor = line.indentation.unwrap_or(0);

		loop {
			let next = self
				.active_replaces
				.iter()
				.filter_map(|active| {
					next_match(&active.pattern, text, cursor)
						.map(|captures| (active.marker_index, captures))
				})
				.min_by_key(|(_, captures)| captures.get_match().start());

			let Some((marker_index, captures)) = next else {
				if cursor < text.len() {
					body.push_range(source, TextRange::literal(line.begin + cursor, line.end));
				}
				break;
			};

			let found = captures.get_match();

			if found.start() > cursor {
				body.push_range(
					source,
					TextRange::literal(line.begin + cursor, line.begin + found.start()),
				);
			}

			let mut range = TextRange::literal(line.begin + found.start(), line.begin + found.end());
			range.pattern = Some(PatternMatch::from_captures(&captures, line.begin));
			body.push_range(source, range);
			body.record_replace(marker_index);

			cursor = found.end();
		}

		if let Some(first) = body.ranges.get_mut(first_range) {
			first.indentation = Some(relative);
		}

		if !is_last_line && body.ranges.len() > first_range {
			if let Some(last) = body.ranges.last_mut() {
				last.starts_new_line = true;
			}
		}

		Ok(())
	}
}

/// The first non-empty match of `pattern` in `text` at or after `from`.
fn next_match<'t>(pattern: &Regex, text: &'t str, from: usize) -> Option<Captures<'t>> {
	let mut position = from;

	while position <= text.len() {
		let captures = pattern.captures_at(text, position)?;
		let found = captures.get_match();

		if !found.is_empty() {
			return Some(captures);
		}

		position = found.end() + text[found.end()..].chars().next()?.len_utf8();
	}

	None
}
