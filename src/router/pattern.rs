//! Path template compilation.
//!
//! Templates are split on `/`. A segment `:name` captures exactly one path
//! segment, a segment `*` captures one or more whole segments (slashes
//! included) under the name [`WILDCARD`], and anything else must match
//! literally. Paths are not normalised: empty segments from leading,
//! trailing or doubled slashes take part in the comparison like any other.
//!
//! Wildcards are greedy and give segments back when later parts of the
//! template fail. Matching stays quadratic in the number of path segments
//! however many wildcards a template has.

use std::collections::HashSet;

/// Parameter name under which a `*` segment is captured.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

/// Parameters captured by a successful match, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    /// Looks a parameter up by name. If a template declares the same name
    /// twice, the later capture wins.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Pattern {
    template: String,
    segments: Vec<Segment>,
    param_names: Vec<String>,
}

pub fn compile(template: &str) -> Pattern {
    let mut param_names = Vec::new();
    let segments = template
        .split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                param_names.push(name.to_string());
                Segment::Param(name.to_string())
            } else if segment == WILDCARD {
                param_names.push(WILDCARD.to_string());
                Segment::Wildcard
            } else {
                Segment::Literal(segment.to_string())
            }
        })
        .collect();

    Pattern {
        template: template.to_string(),
        segments,
        param_names,
    }
}

impl Pattern {
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn matches(&self, path: &str) -> Option<Params> {
        let parts: Vec<&str> = path.split('/').collect();
        let mut captures = Vec::with_capacity(self.param_names.len());
        let mut failed = HashSet::new();
        if !self.match_from(0, &parts, 0, &mut captures, &mut failed) {
            return None;
        }

        let entries = self
            .param_names
            .iter()
            .cloned()
            .zip(captures.into_iter().map(|(from, to)| parts[from..to].join("/")))
            .collect();
        Some(Params { entries })
    }

    // Captures are `parts` ranges. `failed` holds (segment, part) positions
    // already known not to match, which keeps several wildcards in one
    // template polynomial in the path length.
    fn match_from(
        &self,
        si: usize,
        parts: &[&str],
        pi: usize,
        captures: &mut Vec<(usize, usize)>,
        failed: &mut HashSet<(usize, usize)>,
    ) -> bool {
        let Some(segment) = self.segments.get(si) else {
            return pi == parts.len();
        };
        if failed.contains(&(si, pi)) {
            return false;
        }

        let matched = match segment {
            Segment::Literal(literal) => {
                pi < parts.len()
                    && parts[pi] == literal
                    && self.match_from(si + 1, parts, pi + 1, captures, failed)
            }
            Segment::Param(_) => {
                pi < parts.len() && self.capture(si, parts, pi, pi + 1, captures, failed)
            }
            Segment::Wildcard => {
                // Every later segment needs at least one path segment.
                let reserved = self.segments.len() - si - 1;
                let available = parts.len().saturating_sub(pi).saturating_sub(reserved);
                (1..=available)
                    .rev()
                    .any(|take| self.capture(si, parts, pi, pi + take, captures, failed))
            }
        };

        if !matched {
            failed.insert((si, pi));
        }
        matched
    }

    fn capture(
        &self,
        si: usize,
        parts: &[&str],
        from: usize,
        to: usize,
        captures: &mut Vec<(usize, usize)>,
        failed: &mut HashSet<(usize, usize)>,
    ) -> bool {
        captures.push((from, to));
        if self.match_from(si + 1, parts, to, captures, failed) {
            return true;
        }
        captures.pop();
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captured(template: &str, path: &str) -> Option<Vec<(String, String)>> {
        compile(template).matches(path).map(|params| {
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
    }

    #[test]
    fn literal_templates_match_exactly() {
        assert!(compile("/hello").matches("/hello").is_some());
        assert!(compile("/hello").matches("/hello/").is_none());
        assert!(compile("/hello").matches("/Hello").is_none());
        assert!(compile("/").matches("/").is_some());
        assert!(compile("/").matches("").is_none());
    }

    #[test]
    fn params_capture_one_segment_in_order() {
        let pattern = compile("/users/:id/posts/:post");
        assert_eq!(pattern.param_names(), &["id".to_string(), "post".to_string()]);

        let params = pattern.matches("/users/7/posts/hello-world").unwrap();
        assert_eq!(params.get("id"), Some("7"));
        assert_eq!(params.get("post"), Some("hello-world"));
        assert_eq!(
            params.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            vec!["id", "post"]
        );

        assert!(pattern.matches("/users/7/posts").is_none());
        assert!(pattern.matches("/users/7/8/posts/x").is_none());
    }

    #[test]
    fn params_may_capture_empty_segments() {
        assert_eq!(
            captured("/users/:id", "/users/"),
            Some(vec![("id".into(), "".into())])
        );
    }

    #[test]
    fn trailing_wildcard_takes_the_remainder() {
        assert_eq!(
            captured("/static/*", "/static/css/site/main.css"),
            Some(vec![("*".into(), "css/site/main.css".into())])
        );
        assert_eq!(
            captured("/static/*", "/static/"),
            Some(vec![("*".into(), "".into())])
        );
        assert!(compile("/static/*").matches("/static").is_none());
    }

    #[test]
    fn inner_wildcard_leaves_room_for_later_segments() {
        assert_eq!(
            captured("/files/*/raw/:name", "/files/a/b/raw/readme.md"),
            Some(vec![
                ("*".into(), "a/b".into()),
                ("name".into(), "readme.md".into())
            ])
        );
        assert!(compile("/files/*/raw").matches("/files/raw").is_none());
    }

    #[test]
    fn duplicate_names_resolve_to_the_last_capture() {
        let params = compile("/:x/:x").matches("/a/b").unwrap();
        assert_eq!(params.get("x"), Some("b"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn several_wildcards_split_greedily() {
        assert_eq!(
            captured("/*/mid/*", "/a/mid/b/mid/c"),
            Some(vec![("*".into(), "a/mid/b".into()), ("*".into(), "c".into())])
        );
    }

    #[test]
    fn many_wildcards_fail_fast_on_long_paths() {
        let path = format!("/{}", vec!["seg"; 500].join("/"));
        let pattern = compile("/*/*/*/*/x");
        assert!(pattern.matches(&path).is_none());

        let hit = format!("{}/x", path);
        let params = pattern.matches(&hit).unwrap();
        assert_eq!(params.len(), 4);
        assert_eq!(params.get("*"), Some("seg"));
    }
}
