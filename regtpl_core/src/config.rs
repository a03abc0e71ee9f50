use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::TemplateError;
use crate::TemplateResult;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["regtpl.toml", ".regtpl.toml", ".config/regtpl.toml"];

/// Configuration loaded from a `regtpl.toml` file.
///
/// ```toml
/// [markers]
/// region_start = "#region"
/// region_end = "#endregion"
/// template = "TEMPLATE"
/// ```
///
/// Every field is optional; an empty file yields [`TemplateConfig::default`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
	/// The words that mark template regions in the host source.
	#[serde(default)]
	pub markers: MarkerConfig,
}

/// Region marker words. They are matched literally at the start of a line,
/// after any leading whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerConfig {
	/// Opens a region, e.g. `#region`.
	#[serde(default = "default_region_start")]
	pub region_start: String,
	/// Closes the most recently opened region, e.g. `#endregion`.
	#[serde(default = "default_region_end")]
	pub region_end: String,
	/// Follows `region_start` when the rest of the line carries directives.
	#[serde(default = "default_template")]
	pub template: String,
}

impl Default for MarkerConfig {
	fn default() -> Self {
		Self {
			region_start: default_region_start(),
			region_end: default_region_end(),
			template: default_template(),
		}
	}
}

impl MarkerConfig {
	fn validate(&self) -> TemplateResult<()> {
		for (field, value) in [
			("region_start", &self.region_start),
			("region_end", &self.region_end),
			("template", &self.template),
		] {
			if value.is_empty() || value.chars().any(char::is_whitespace) {
				return Err(TemplateError::ConfigParse(format!(
					"`markers.{field}` must be a non-empty word without whitespace, got `{value}`"
				)));
			}
		}

		if self.region_start == self.region_end {
			return Err(TemplateError::ConfigParse(
				"`markers.region_start` and `markers.region_end` must differ".to_string(),
			));
		}

		Ok(())
	}
}

fn default_region_start() -> String {
	"#region".to_string()
}

fn default_region_end() -> String {
	"#endregion".to_string()
}

fn default_template() -> String {
	"TEMPLATE".to_string()
}

impl TemplateConfig {
	/// Parse and validate a TOML configuration document.
	pub fn from_toml(content: &str) -> TemplateResult<Self> {
		let config: TemplateConfig =
			toml::from_str(content).map_err(|e| TemplateError::ConfigParse(e.to_string()))?;
		config.markers.validate()?;

		Ok(config)
	}

	/// Resolve the first existing config file under `root`.
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if no config file exists.
	pub fn load(root: &Path) -> TemplateResult<Option<TemplateConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		tracing::debug!(path = %config_path.display(), "loading template config");

		Self::from_toml(&content).map(Some)
	}
}
