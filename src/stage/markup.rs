//! Markup minification ahead of template packaging.

use super::{Stage, StageError, StageKind};
use crate::artifact::Artifact;
use crate::config::ConfigError;
use crate::options::{merge, template_minify_defaults, TaskOptions};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static START_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<[A-Za-z][^>"']*(?:(?:"[^"]*"|'[^']*')[^>"']*)*>"#).expect("valid regex")
});
// Double-quoted values are matched whole so nothing inside them is rewritten.
static ATTRIBUTE_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'=<>/]+)\s*=\s*'([^']*)'|"[^"]*""#).expect("valid regex")
});
static INDENT_BETWEEN_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s*\n\s*<").expect("valid regex"));
static LEADING_INDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\n\s*<").expect("valid regex"));
static TRAILING_INDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s*\n\s*$").expect("valid regex"));
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static PRESERVED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<pre\b.*?</pre>|<textarea\b.*?</textarea>").expect("valid regex")
});

/// Minification switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinifyOptions {
    /// Collapse whitespace runs and drop indentation between tags
    pub collapse_whitespace: bool,
    /// Strip `<!-- -->` comments
    pub remove_comments: bool,
    /// Rewrite `attr='value'` as `attr="value"`
    pub normalize_quotes: bool,
}

impl Default for MinifyOptions {
    fn default() -> Self {
        Self { collapse_whitespace: true, remove_comments: true, normalize_quotes: true }
    }
}

impl MinifyOptions {
    /// Read the switches from a `minify` option table, over the defaults.
    pub fn from_options(overrides: Option<&TaskOptions>) -> Result<Self, ConfigError> {
        let options = merge(&template_minify_defaults(), overrides);
        Ok(Self {
            collapse_whitespace: options.get_bool_or("collapseWhitespace", true)?,
            remove_comments: options.get_bool_or("removeComments", true)?,
            normalize_quotes: options.get_bool_or("normalizeQuotes", true)?,
        })
    }
}

/// Minify markup text.
///
/// `<pre>` and `<textarea>` blocks keep their whitespace.
pub fn minify(source: &str, options: &MinifyOptions) -> String {
    let mut text = source.to_string();

    if options.remove_comments {
        text = COMMENT.replace_all(&text, "").into_owned();
    }

    if options.normalize_quotes {
        text = normalize_quotes(&text);
    }

    if options.collapse_whitespace {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for block in PRESERVED_BLOCK.find_iter(&text) {
            out.push_str(&collapse(&text[last..block.start()]));
            out.push_str(block.as_str());
            last = block.end();
        }
        out.push_str(&collapse(&text[last..]));
        text = out.trim().to_string();
    }

    text
}

/// Rewrite `name='value'` as `name="value"` inside start tags.
fn normalize_quotes(text: &str) -> String {
    START_TAG
        .replace_all(text, |tag: &Captures| {
            ATTRIBUTE_VALUE
                .replace_all(&tag[0], |attr: &Captures| match (attr.get(1), attr.get(2)) {
                    (Some(name), Some(value)) if !value.as_str().contains('"') => {
                        format!("{}=\"{}\"", name.as_str(), value.as_str())
                    }
                    _ => attr[0].to_string(),
                })
                .into_owned()
        })
        .into_owned()
}

fn collapse(fragment: &str) -> String {
    let fragment = INDENT_BETWEEN_TAGS.replace_all(fragment, "><");
    let fragment = LEADING_INDENT.replace(&fragment, "<");
    let fragment = TRAILING_INDENT.replace(&fragment, ">");
    WHITESPACE_RUN.replace_all(&fragment, " ").into_owned()
}

/// Stage wrapper around [`minify`].
#[derive(Debug)]
pub struct MarkupMinifier {
    options: MinifyOptions,
}

impl MarkupMinifier {
    pub fn new(options: MinifyOptions) -> Self {
        Self { options }
    }
}

impl Stage for MarkupMinifier {
    fn name(&self) -> &str {
        "HTML minifier"
    }

    fn kind(&self) -> StageKind {
        StageKind::MarkupMinify
    }

    fn process(&mut self, artifact: Artifact) -> Result<Vec<Artifact>, StageError> {
        let minified = minify(&artifact.contents, &self.options);
        Ok(vec![artifact.with_contents(minified)])
    }
}
