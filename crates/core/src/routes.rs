//! Route patterns.
//!
//! A template such as
//! `gecko.v2.{repository}.revision.{revision}.mobile-l10n.{architecture}.multi`
//! is both rendered into index namespaces and compiled into a regex that
//! pulls the same fields back out of a task definition's routes.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use regex_lite::Regex;
use tracing::debug;

use crate::error::PublishError;
use crate::types::TaskDefinition;

/// Prefix the index service puts in front of namespaces in task routes
pub const INDEX_ROUTE_PREFIX: &str = "index.";

/// A value a route pattern can capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteField {
    Repository,
    Revision,
    Architecture,
}

impl RouteField {
    pub const ALL: [RouteField; 3] = [
        RouteField::Repository,
        RouteField::Revision,
        RouteField::Architecture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteField::Repository => "repository",
            RouteField::Revision => "revision",
            RouteField::Architecture => "architecture",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }

    fn placeholder(&self) -> String {
        format!("{{{}}}", self.as_str())
    }
}

impl fmt::Display for RouteField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled route template
#[derive(Debug, Clone)]
pub struct RoutePattern {
    template: String,
    regex: Regex,
    /// Capture group index of each field present in the template
    groups: HashMap<RouteField, usize>,
}

impl RoutePattern {
    /// Compile a template. Literal text is matched verbatim, each known
    /// placeholder matches one dot-free segment.
    pub fn compile(template: &str) -> Result<Self, PublishError> {
        let invalid = |message: String| PublishError::InvalidPattern {
            pattern: template.to_string(),
            message,
        };

        let mut source = String::from("^");
        let mut groups = HashMap::new();
        let mut group = 0;
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            source.push_str(&regex_lite::escape(&rest[..start]));

            let after = &rest[start + 1..];
            let end = after
                .find('}')
                .ok_or_else(|| invalid("unclosed placeholder".to_string()))?;
            let name = &after[..end];
            let field = RouteField::from_name(name)
                .ok_or_else(|| invalid(format!("unknown placeholder {{{}}}", name)))?;

            group += 1;
            source.push_str("([^.]+)");
            groups.entry(field).or_insert(group);
            rest = &after[end + 1..];
        }

        if rest.contains('}') {
            return Err(invalid("unmatched closing brace".to_string()));
        }
        source.push_str(&regex_lite::escape(rest));
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            template: template.to_string(),
            regex,
            groups,
        })
    }

    /// Compile the pattern matching task routes for an index namespace template
    pub fn for_index_routes(namespace_template: &str) -> Result<Self, PublishError> {
        Self::compile(&format!("{}{}", INDEX_ROUTE_PREFIX, namespace_template))
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn has_field(&self, field: RouteField) -> bool {
        self.groups.contains_key(&field)
    }

    /// Fill the template's placeholders
    pub fn render(&self, repository: &str, revision: &str, architecture: &str) -> String {
        self.template
            .replace(&RouteField::Repository.placeholder(), repository)
            .replace(&RouteField::Revision.placeholder(), revision)
            .replace(&RouteField::Architecture.placeholder(), architecture)
    }

    /// Value of `field` in `route`, if the whole route matches
    pub fn capture<'r>(&self, field: RouteField, route: &'r str) -> Option<&'r str> {
        let group = *self.groups.get(&field)?;
        self.regex
            .captures(route)
            .and_then(|captures| captures.get(group))
            .map(|m| m.as_str())
    }
}

/// Extract `field` from the first route of `task_definition` matching `pattern`
pub fn extract(
    field: RouteField,
    task_definition: &TaskDefinition,
    pattern: &RoutePattern,
) -> Result<String, PublishError> {
    let matches: Vec<&str> = task_definition
        .routes
        .iter()
        .filter_map(|route| pattern.capture(field, route))
        .collect();

    match matches.first() {
        Some(value) => {
            if matches.len() > 1 {
                debug!(
                    field = field.as_str(),
                    matches = ?matches,
                    "Several routes matched, using the first one"
                );
            }
            Ok((*value).to_string())
        }
        None => Err(PublishError::UnmatchedRoute {
            field,
            task_definition: task_definition.to_json(),
        }),
    }
}

pub fn pluck_repository(
    task_definition: &TaskDefinition,
    pattern: &RoutePattern,
) -> Result<String, PublishError> {
    extract(RouteField::Repository, task_definition, pattern)
}

pub fn pluck_revision(
    task_definition: &TaskDefinition,
    pattern: &RoutePattern,
) -> Result<String, PublishError> {
    extract(RouteField::Revision, task_definition, pattern)
}

pub fn pluck_architecture(
    task_definition: &TaskDefinition,
    pattern: &RoutePattern,
) -> Result<String, PublishError> {
    extract(RouteField::Architecture, task_definition, pattern)
}

/// Compiled patterns keyed by template
#[derive(Debug, Default)]
pub struct PatternCache {
    patterns: Mutex<HashMap<String, Arc<RoutePattern>>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile(&self, template: &str) -> Result<Arc<RoutePattern>, PublishError> {
        let mut patterns = self
            .patterns
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(pattern) = patterns.get(template) {
            return Ok(Arc::clone(pattern));
        }

        let pattern = Arc::new(RoutePattern::compile(template)?);
        debug!(template = template, "Compiled route pattern");
        patterns.insert(template.to_string(), Arc::clone(&pattern));
        Ok(pattern)
    }

    /// Cached [`RoutePattern::for_index_routes`]
    pub fn index_routes(&self, namespace_template: &str) -> Result<Arc<RoutePattern>, PublishError> {
        self.get_or_compile(&format!("{}{}", INDEX_ROUTE_PREFIX, namespace_template))
    }

    pub fn len(&self) -> usize {
        self.patterns
            .lock()
            .map(|patterns| patterns.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
