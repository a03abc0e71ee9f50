//! `regtpl_core` is the front end of the regtpl source templating engine. It
//! turns ordinary source files that contain marked template regions into a
//! flat, position addressed model that a later instantiation step can fill
//! with values.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Annotated source text + byte range
//!   → Line classifier (splits lines, measures indentation, finds #region / #endregion)
//!   → Directive lexer (tokenizes the text after `#region TEMPLATE`)
//!   → Directive parser (DEFINE / REPLACE / FOREACH / INSERT)
//!   → Template loader (tracks open regions, emits text ranges + region markers)
//!   → LoadedTemplate (one anonymous template, or one per DEFINE)
//! ```
//!
//! ## Template Syntax
//!
//! ```text
//! #region TEMPLATE DEFINE("Point")
//! #region TEMPLATE REPLACE(`NAME`, $name) REPLACE(`TYPE`, $type, REMOVE_IF_NULL)
//! struct NAME { x: TYPE, y: TYPE }
//! #endregion
//! #region TEMPLATE FOREACH($field : $fields)
//! #region TEMPLATE INSERT($field.doc)
//! /// placeholder docs
//! #endregion
//! #endregion
//! #endregion
//! ```
//!
//! Plain `#region` / `#endregion` pairs are kept as template text. Tabs are
//! not allowed anywhere in the loaded range.
//!
//! ## Key Types
//!
//! - [`TemplateLoader`]: Loads a byte range of a source buffer, either as a
//!   single template ([`TemplateLoader::load`]) or as a set of `DEFINE`d
//!   templates ([`TemplateLoader::load_all`]).
//! - [`LoadedTemplate`]: The ordered [`TextRange`]s and [`RegionMarker`]s of
//!   one template.
//! - [`Directive`]: A parsed `DEFINE`, `REPLACE`, `FOREACH` or `INSERT`
//!   instruction.
//! - [`TemplateConfig`]: Region marker words, loaded from `regtpl.toml`.
//! - [`TemplateError`]: Lexical, syntactic and validation errors with 0-based
//!   line and column.
//!
//! ## Quick Start
//!
//! ```rust
//! use regtpl_core::load_templates;
//!
//! let source = "#region TEMPLATE DEFINE(\"Foo\") REPLACE(`VALUE`, $v)\nvalue = \
//!               VALUE;\n#endregion\n";
//! let templates = load_templates(source, 0..source.len()).unwrap();
//! let foo = &templates["Foo"];
//!
//! let texts: Vec<_> = foo.ranges().iter().map(|range| foo.text(range)).collect();
//! assert_eq!(texts, ["value = ", "VALUE", ";"]);
//! assert_eq!(foo.replace_range_count(), 1);
//! ```

pub use config::*;
pub use error::*;
pub use lexer::tokenize_directives;
pub use lines::*;
pub use loader::*;
pub use parser::*;
pub use tokens::*;

pub mod config;
#[allow(unused_assignments)]
mod error;
mod lexer;
mod lines;
mod loader;
mod parser;
pub(crate) mod patterns;
mod tokens;

#[cfg(test)]
mod __fixtures;
