//! Action route matching.
//!
//! A request is a mock candidate when its path ends in one of the configured
//! action suffixes (".action" by default) and its method is registered.
//! Everything else belongs to whatever serves static content.

use hyper::Method;

/// A successful route match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionMatch {
    /// Request path with the query string and the action suffix removed.
    /// May be empty when the path is nothing but the suffix; resolvers decide
    /// whether that is meaningful.
    pub logical_path: String,
    /// The suffix that matched.
    pub suffix: String,
}

impl ActionMatch {
    /// Logical path with the suffix re-attached: the key upstream and custom
    /// strategies address (the request path minus any query string).
    pub fn action_key(&self) -> String {
        format!("{}{}", self.logical_path, self.suffix)
    }
}

struct ActionRule {
    suffix: String,
    method: Method,
}

/// Ordered suffix router. One rule per (suffix, method) pair, suffixes in the
/// order supplied, each paired with every configured method. Rules never
/// change after construction.
pub struct ActionRouter {
    rules: Vec<ActionRule>,
}

impl ActionRouter {
    pub fn new(suffixes: &[String], methods: &[Method]) -> Result<Self, anyhow::Error> {
        if suffixes.is_empty() {
            anyhow::bail!("at least one action suffix is required");
        }
        if methods.is_empty() {
            anyhow::bail!("at least one HTTP method is required");
        }

        let mut rules = Vec::with_capacity(suffixes.len() * methods.len());
        for suffix in suffixes {
            if suffix.is_empty() {
                anyhow::bail!("action suffixes must be non-empty");
            }
            for method in methods {
                rules.push(ActionRule {
                    suffix: suffix.clone(),
                    method: method.clone(),
                });
            }
        }

        Ok(ActionRouter { rules })
    }

    /// Match a request against the registered rules, first hit wins. The
    /// query string is stripped before suffix comparison. Pure function of
    /// the inputs.
    pub fn match_request(&self, method: &Method, path_and_query: &str) -> Option<ActionMatch> {
        let path = path_and_query
            .split_once('?')
            .map_or(path_and_query, |(path, _)| path);

        self.rules.iter().find_map(|rule| {
            if &rule.method != method {
                return None;
            }
            path.strip_suffix(rule.suffix.as_str())
                .map(|logical| ActionMatch {
                    logical_path: logical.to_string(),
                    suffix: rule.suffix.clone(),
                })
        })
    }
}
