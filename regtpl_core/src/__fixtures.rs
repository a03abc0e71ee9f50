use crate::Directive;
use crate::LoadedTemplate;
use crate::RegionMarker;
use crate::TemplateResult;
use crate::parse_directives;
use crate::tokenize_directives;

/// One `DEFINE` with a `REPLACE` stacked on the same start line.
pub const FOO_TEMPLATE: &str =
	"#region TEMPLATE DEFINE(\"Foo\") REPLACE(`VALUE`, $v)\nvalue = VALUE;\n#endregion\n";

/// A single template with nested replace, foreach and plain regions.
pub const CLASS_TEMPLATE: &str = r"#region TEMPLATE REPLACE(`NAME`, $name)
class NAME
{
#region TEMPLATE FOREACH($field : $fields)
#region TEMPLATE REPLACE(`TYPE`, $field.type) REPLACE(`FIELD`, $field.name)
    public TYPE FIELD;
#endregion
#endregion

#region Helpers
    int count;
#endregion
}
#endregion
";

/// The text [`CLASS_TEMPLATE`] expands to before any substitution.
pub const CLASS_TEMPLATE_BODY: &str = "class NAME\n{\n    public TYPE FIELD;\n\n#region Helpers\n    \
                                       int count;\n#endregion\n}\n";

/// Tokenize and parse a standalone directive line starting at offset 0.
pub fn parse_line(text: &str) -> TemplateResult<Vec<Directive>> {
	let tokens = tokenize_directives(text, 0..text.len(), 0, 0)?;
	parse_directives(text, 0, 0, &tokens)
}

/// Rebuild the template text from its ranges: indentation, text and line
/// breaks.
pub fn render_literal(template: &LoadedTemplate<'_>) -> String {
	let mut output = String::new();

	for range in template.ranges() {
		if let Some(indentation) = range.indentation {
			output.push_str(&" ".repeat(indentation));
		}

		output.push_str(template.text(range));

		if range.starts_new_line {
			output.push('\n');
		}
	}

	output
}

/// The running nesting depth after each marker.
pub fn marker_depths(template: &LoadedTemplate<'_>) -> Vec<isize> {
	let mut depth = 0;

	template
		.markers()
		.iter()
		.map(|marker| {
			match marker {
				RegionMarker::Begin { .. } => depth += 1,
				RegionMarker::End { .. } => depth -= 1,
			}
			depth
		})
		.collect()
}

/// The source text of every range.
pub fn range_texts<'a>(template: &LoadedTemplate<'a>) -> Vec<&'a str> {
	template
		.ranges()
		.iter()
		.map(|range| template.text(range))
		.collect()
}
