//! Identifier manager for generated output
//!
//! Every emitter renders against one of these per output unit. It hands out
//! deterministic, collision-free aliases for referenced module paths, so a
//! generated file never spells the same path two ways and never lets two
//! paths share one alias. A fresh instance is created per output unit;
//! aliases are never reused across files.

use std::collections::HashMap;

/// One registered `(alias, path)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// The alias emitted into generated code.
    pub alias: String,
    /// The fully-qualified path the alias stands for.
    pub path: String,
}

/// Per-output-unit alias allocator.
#[derive(Debug)]
pub struct Importer {
    own: String,
    bindings: Vec<Binding>,
    by_path: HashMap<String, usize>,
}

impl Importer {
    /// A manager for an output unit belonging to `own_package`.
    pub fn new(own_package: &str) -> Self {
        Self {
            own: normalize(own_package).to_string(),
            bindings: Vec::new(),
            by_path: HashMap::new(),
        }
    }

    /// Register a path and return its alias.
    ///
    /// Repeated calls with the same path (modulo trailing separators)
    /// return the same alias. A new path whose candidate alias collides
    /// with an existing one gets a `_1`, `_2`, ... suffix.
    pub fn alias(&mut self, path: &str) -> String {
        let key = normalize(path).to_string();
        if let Some(&index) = self.by_path.get(&key) {
            return self.bindings[index].alias.clone();
        }

        let candidate = sanitize(last_segment(&key));
        let alias = self.disambiguate(candidate);
        self.by_path.insert(key.clone(), self.bindings.len());
        self.bindings.push(Binding {
            alias: alias.clone(),
            path: key,
        });
        alias
    }

    /// Qualifier for referencing a symbol under `path` from this unit:
    /// empty for the unit's own package, `alias::` otherwise.
    pub fn prefix(&mut self, path: &str) -> String {
        if normalize(path) == self.own {
            return String::new();
        }
        format!("{}::", self.alias(path))
    }

    /// All registered bindings, in registration order, for rendering the
    /// unit's import block.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    fn disambiguate(&self, candidate: String) -> String {
        if !self.taken(&candidate) {
            return candidate;
        }
        let mut n = 1usize;
        loop {
            let attempt = format!("{candidate}_{n}");
            if !self.taken(&attempt) {
                return attempt;
            }
            n += 1;
        }
    }

    fn taken(&self, alias: &str) -> bool {
        self.bindings.iter().any(|b| b.alias == alias)
    }
}

/// Strip trailing path separators so `a/b/c/` and `a/b/c` are one path.
fn normalize(path: &str) -> &str {
    path.trim_end_matches(['/', ':'])
}

/// Last non-empty `/`- or `::`-separated segment of a path.
fn last_segment(path: &str) -> &str {
    path.rsplit(['/', ':'])
        .find(|segment| !segment.is_empty())
        .unwrap_or(path)
}

/// Replace non-identifier characters and shield a leading digit.
fn sanitize(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for ch in segment.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_separator_is_same_path() {
        let mut imp = Importer::new("out");
        let a = imp.alias("a/b/c");
        let b = imp.alias("a/b/c/");
        assert_eq!(a, "c");
        assert_eq!(b, "c");
        assert_eq!(imp.bindings().len(), 1);
    }

    #[test]
    fn test_collision_gets_numeric_suffix() {
        let mut imp = Importer::new("out");
        assert_eq!(imp.alias("a/b/c"), "c");
        assert_eq!(imp.alias("x/y/c"), "c_1");
        assert_eq!(imp.alias("z/c"), "c_2");
        // Re-registration stays stable.
        assert_eq!(imp.alias("x/y/c"), "c_1");
    }

    #[test]
    fn test_sanitize_replaces_and_shields() {
        let mut imp = Importer::new("out");
        assert_eq!(imp.alias("pkg/some-mod"), "some_mod");
        assert_eq!(imp.alias("pkg/9lives"), "_9lives");
    }

    #[test]
    fn test_prefix_empty_for_own_package() {
        let mut imp = Importer::new("gen/blog");
        assert_eq!(imp.prefix("gen/blog"), "");
        assert_eq!(imp.prefix("gen/blog/"), "");
        assert_eq!(imp.prefix("gen/iam"), "iam::");
    }

    #[test]
    fn test_rust_path_separator_accepted() {
        let mut imp = Importer::new("out");
        assert_eq!(imp.alias("axon_runtime::scalar"), "scalar");
        assert_eq!(imp.prefix("axon_runtime::scalar"), "scalar::");
    }
}
