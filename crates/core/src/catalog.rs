//! Service Catalog: name normalization, resolution cascade, and suggestions.

use crate::types::{Catalog, ServiceDescriptor};

const LOCALE_PREFIXES: &[&str] =
    &["hub-ca-", "hub-us-", "hub-na-", "edr-na-", "edrtier3-na-", "hub-"];

const MAX_SUGGESTIONS: usize = 5;

/// Lowercase, collapse `_`/whitespace to `-`, trim.
pub fn normalize_service_name(name: &str) -> String {
    name.trim().to_lowercase().replace('_', "-").replace(' ', "-")
}

/// Strip the longest matching locale-qualified prefix. Prefixes are tried
/// in a fixed order (locale-qualified families first, the bare `hub-`
/// fallback last) so e.g. `hub-na-auth` strips to `auth` via `hub-na-`
/// rather than being left with `na-auth` via the bare `hub-` prefix.
pub fn base_service_name(name: &str) -> String {
    let normalized = normalize_service_name(name);
    for prefix in LOCALE_PREFIXES {
        if let Some(stripped) = normalized.strip_prefix(prefix) {
            return stripped.to_string();
        }
    }
    normalized
}

fn locale_candidates<'a>(catalog: &'a Catalog, locale: Option<&str>) -> Vec<&'a ServiceDescriptor> {
    match locale {
        None => catalog.services.iter().collect(),
        Some(locale) => {
            let locale = locale.to_lowercase();
            if locale == "na" {
                catalog
                    .services
                    .iter()
                    .filter(|s| {
                        s.name.starts_with("hub-na-")
                            || s.name.starts_with("edr-na-")
                            || s.name.starts_with("edrtier3-na-")
                    })
                    .collect()
            } else {
                let prefix = format!("hub-{locale}-");
                catalog.services.iter().filter(|s| s.name.starts_with(&prefix)).collect()
            }
        }
    }
}

/// Resolve a single query token against the catalog, honoring an optional
/// locale filter. Tries each strategy in order and returns on the first
/// one that yields any match.
pub fn resolve_one<'a>(
    catalog: &'a Catalog,
    query: &str,
    locale: Option<&str>,
) -> Vec<&'a ServiceDescriptor> {
    let normalized_query = normalize_service_name(query);
    let candidates = locale_candidates(catalog, locale);

    // Strategy 1: exact normalized name match.
    let matches: Vec<_> =
        candidates.iter().copied().filter(|s| normalize_service_name(&s.name) == normalized_query).collect();
    if !matches.is_empty() {
        return matches;
    }

    // Strategy 2: exact normalized alternate-name match.
    let matches: Vec<_> = candidates
        .iter()
        .copied()
        .filter(|s| s.alternate_names.iter().any(|alt| normalize_service_name(alt) == normalized_query))
        .collect();
    if !matches.is_empty() {
        return matches;
    }

    // Strategy 3: base-name equality.
    let query_base = base_service_name(&normalized_query);
    let matches: Vec<_> =
        candidates.iter().copied().filter(|s| base_service_name(&s.name) == query_base).collect();
    if !matches.is_empty() {
        return matches;
    }

    // Strategy 4: substring containment, either direction, over
    // name/base-name/alternate-name.
    candidates
        .into_iter()
        .filter(|s| {
            let normalized_name = normalize_service_name(&s.name);
            let service_base = base_service_name(&s.name);
            if normalized_query.contains(&normalized_name) || normalized_name.contains(&normalized_query) {
                return true;
            }
            if normalized_query.contains(&service_base) || service_base.contains(&normalized_query) {
                return true;
            }
            s.alternate_names.iter().any(|alt| {
                let alt_norm = normalize_service_name(alt);
                normalized_query.contains(&alt_norm) || alt_norm.contains(&normalized_query)
            })
        })
        .collect()
}

/// Resolve one or more query tokens (the `service_name` parameter accepts
/// either a single string or a list). Returns the union of resolved
/// descriptor names, deduplicated, in first-seen order. Any unresolved
/// token is reported separately so the caller can surface a terminal
/// `ServiceNotFound` with suggestions before running anything.
pub fn resolve(
    catalog: &Catalog,
    queries: &[String],
    locale: Option<&str>,
) -> (Vec<String>, Vec<String>) {
    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();
    for query in queries {
        let matches = resolve_one(catalog, query, locale);
        if matches.is_empty() {
            unresolved.push(query.clone());
        } else {
            for m in matches {
                if !resolved.contains(&m.name) {
                    resolved.push(m.name.clone());
                }
            }
        }
    }
    (resolved, unresolved)
}

/// Up to 5 suggested service names for an unresolved query, via substring
/// containment in either direction over name and base name.
pub fn suggest(catalog: &Catalog, query: &str) -> Vec<String> {
    let normalized_query = normalize_service_name(query);
    let mut suggestions = Vec::new();
    for service in &catalog.services {
        let normalized_name = normalize_service_name(&service.name);
        let service_base = base_service_name(&service.name);
        let is_similar = normalized_query.contains(&normalized_name)
            || normalized_name.contains(&normalized_query)
            || normalized_query.contains(&service_base)
            || service_base.contains(&normalized_query);
        if is_similar {
            suggestions.push(service.name.clone());
            if suggestions.len() >= MAX_SUGGESTIONS {
                break;
            }
        }
    }
    suggestions
}

/// Load a catalog from a TOML document of the form:
/// ```toml
/// [[services]]
/// name = "hub-ca-auth"
/// alternate_names = ["auth-service"]
/// path_template = "/logs/hub-ca/auth/{YYYY}/{MM}/{DD}/{HH}/*.log"
/// ```
pub fn load_catalog(path: &std::path::Path) -> Result<Catalog, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read catalog {}: {e}", path.display()))?;
    let catalog: Catalog =
        toml::from_str(&text).map_err(|e| format!("failed to parse catalog {}: {e}", path.display()))?;
    for service in &catalog.services {
        for placeholder in extract_placeholders(&service.path_template) {
            if !matches!(placeholder.as_str(), "YYYY" | "MM" | "DD" | "HH" | "guid") {
                return Err(format!(
                    "service '{}' path_template has unrecognized placeholder '{{{}}}'",
                    service.name, placeholder
                ));
            }
        }
    }
    Ok(catalog)
}

fn extract_placeholders(template: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut chars = template.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '{' {
            if let Some(end) = template[i..].find('}') {
                out.push(template[i + 1..i + end].to_string());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog {
            services: vec![
                ServiceDescriptor {
                    name: "hub-ca-auth".into(),
                    alternate_names: vec!["auth-service".into()],
                    path_template: "/logs/hub-ca/auth/{YYYY}/{MM}/{DD}/{HH}/*.log".into(),
                },
                ServiceDescriptor {
                    name: "hub-us-auth".into(),
                    alternate_names: vec!["auth-service".into()],
                    path_template: "/logs/hub-us/auth/{YYYY}/{MM}/{DD}/{HH}/*.log".into(),
                },
                ServiceDescriptor {
                    name: "hub-na-edr-proxy-service".into(),
                    alternate_names: vec![],
                    path_template: "/logs/hub-na/edr-proxy/{YYYY}/{MM}/{DD}/{HH}/*.log".into(),
                },
                ServiceDescriptor {
                    name: "edr-na-software-updater-service".into(),
                    alternate_names: vec![],
                    path_template: "/logs/edr-na/software-updater/{YYYY}/{MM}/{DD}/{HH}/*.log".into(),
                },
            ],
        }
    }

    #[test]
    fn normalization_is_symmetric() {
        assert_eq!(normalize_service_name("EDR_Proxy"), normalize_service_name("edr proxy"));
        assert_eq!(normalize_service_name("edr_proxy"), "edr-proxy");
    }

    #[test]
    fn exact_name_match() {
        let cat = catalog();
        let (resolved, unresolved) = resolve(&cat, &["hub-ca-auth".to_string()], None);
        assert_eq!(resolved, vec!["hub-ca-auth".to_string()]);
        assert!(unresolved.is_empty());
    }

    #[test]
    fn alternate_name_match() {
        let cat = catalog();
        let (resolved, _) = resolve(&cat, &["auth-service".to_string()], None);
        assert_eq!(resolved.len(), 2);
        assert!(resolved.contains(&"hub-ca-auth".to_string()));
        assert!(resolved.contains(&"hub-us-auth".to_string()));
    }

    #[test]
    fn base_name_match_across_locales() {
        let cat = catalog();
        let (resolved, _) = resolve(&cat, &["auth".to_string()], None);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn locale_na_covers_three_families() {
        let cat = catalog();
        let (resolved, _) = resolve(&cat, &["software-updater-service".to_string()], Some("na"));
        assert_eq!(resolved, vec!["edr-na-software-updater-service".to_string()]);
    }

    #[test]
    fn locale_ca_is_single_family() {
        let cat = catalog();
        let (resolved, _) = resolve(&cat, &["auth".to_string()], Some("ca"));
        assert_eq!(resolved, vec!["hub-ca-auth".to_string()]);
    }

    #[test]
    fn unresolved_query_yields_suggestions() {
        let cat = catalog();
        let (resolved, unresolved) = resolve(&cat, &["nonexistent-service".to_string()], None);
        assert!(resolved.is_empty());
        assert_eq!(unresolved, vec!["nonexistent-service".to_string()]);
        // "proxy" is a substring neither direction of "nonexistent-service", so empty is fine;
        // check a query that should actually produce suggestions instead.
        let suggestions = suggest(&cat, "edr-proxy");
        assert!(suggestions.contains(&"hub-na-edr-proxy-service".to_string()));
    }

    #[test]
    fn rejects_unknown_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.toml");
        std::fs::write(
            &path,
            r#"
[[services]]
name = "bad"
path_template = "/logs/{WEEK}/*.log"
"#,
        )
        .unwrap();
        let err = load_catalog(&path).unwrap_err();
        assert!(err.contains("WEEK"));
    }
}
