//! Namespace allocation for scenario runs.

/// Allocates an isolated namespace name per scenario run.
pub trait NamespaceProvisioner: Send + Sync {
    fn allocate(&self, scenario: &str) -> String;
}

/// Generates `{prefix}-{scenario}-{short_uuid}` names.
#[derive(Debug, Clone)]
pub struct GeneratedNamespaces {
    prefix: String,
}

/// Kubernetes names are capped at 63 characters.
const MAX_NAME_LEN: usize = 63;

impl GeneratedNamespaces {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for GeneratedNamespaces {
    fn default() -> Self {
        Self::new("e2e")
    }
}

impl NamespaceProvisioner for GeneratedNamespaces {
    fn allocate(&self, scenario: &str) -> String {
        let short_uuid = &uuid::Uuid::new_v4().simple().to_string()[..8];
        let sanitized = sanitize(scenario);
        let name = if sanitized.is_empty() {
            format!("{}-{}", self.prefix, short_uuid)
        } else {
            format!("{}-{}-{}", self.prefix, sanitized, short_uuid)
        };
        let name = truncate(name, short_uuid);
        tracing::debug!(namespace = %name, scenario = %scenario, "allocated namespace");
        name
    }
}

/// Lowercases and replaces anything that is not alphanumeric with a dash.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() {
            c.to_ascii_lowercase()
        } else {
            '-'
        };
        if !(c == '-' && out.ends_with('-')) {
            out.push(c);
        }
    }
    out.trim_matches('-').to_string()
}

fn truncate(name: String, suffix: &str) -> String {
    if name.len() <= MAX_NAME_LEN {
        return name;
    }
    let keep = MAX_NAME_LEN - suffix.len() - 1;
    format!("{}-{}", name[..keep].trim_end_matches('-'), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_collapses_separators() {
        assert_eq!(sanitize("Happy Path"), "happy-path");
        assert_eq!(sanitize("nbe__neg!"), "nbe-neg");
        assert_eq!(sanitize("--"), "");
    }

    #[test]
    fn allocated_names_are_unique_and_prefixed() {
        let namespaces = GeneratedNamespaces::new("nbe-e2e");
        let a = namespaces.allocate("happy path");
        let b = namespaces.allocate("happy path");

        assert_ne!(a, b);
        assert!(a.starts_with("nbe-e2e-happy-path-"));
        assert_eq!(a.len(), "nbe-e2e-happy-path-".len() + 8);
    }

    #[test]
    fn long_names_stay_within_limit() {
        let namespaces = GeneratedNamespaces::default();
        let name = namespaces.allocate(&"very-long-scenario-name".repeat(5));
        assert!(name.len() <= MAX_NAME_LEN);
        assert!(name.starts_with("e2e-very-long"));
    }
}
