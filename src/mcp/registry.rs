//! MCP server registry parsed from a single delimited string
//!
//! Format: `name1=url1,name2=url2`. Example:
//! `prometheus=http://localhost:8001/sse,kubernetes=http://localhost:8002/sse`

use serde::Serialize;

/// Environment variable holding the server list
pub const MCP_SERVERS_ENV: &str = "MCP_SERVERS";

/// One named MCP endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectorSpec {
    pub name: String,
    pub endpoint: String,
}

impl ConnectorSpec {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// Ordered name -> endpoint mapping
///
/// Order is first occurrence; a repeated name replaces the endpoint in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectorRegistry {
    specs: Vec<ConnectorSpec>,
}

impl ConnectorRegistry {
    /// Parse the registry from `MCP_SERVERS`; unset means empty
    pub fn from_env() -> Self {
        parse_registry(std::env::var(MCP_SERVERS_ENV).ok().as_deref())
    }

    /// Insert or overwrite (last write wins, position of first write kept)
    pub fn insert(&mut self, name: impl Into<String>, endpoint: impl Into<String>) {
        let name = name.into();
        let endpoint = endpoint.into();
        match self.specs.iter_mut().find(|s| s.name == name) {
            Some(existing) => existing.endpoint = endpoint,
            None => self.specs.push(ConnectorSpec::new(name, endpoint)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.specs
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.endpoint.as_str())
    }

    pub fn names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectorSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl<'a> IntoIterator for &'a ConnectorRegistry {
    type Item = &'a ConnectorSpec;
    type IntoIter = std::slice::Iter<'a, ConnectorSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.iter()
    }
}

/// Parse `name=endpoint` pairs separated by commas
///
/// Only the first `=` splits a pair, so endpoints may carry query strings.
/// Pairs with a missing `=`, an empty name or an empty endpoint are dropped;
/// the parse itself never fails.
pub fn parse_registry(input: Option<&str>) -> ConnectorRegistry {
    let mut registry = ConnectorRegistry::default();

    let Some(input) = input else {
        return registry;
    };

    for token in input.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        match token.split_once('=') {
            Some((name, endpoint)) if !name.trim().is_empty() && !endpoint.trim().is_empty() => {
                registry.insert(name.trim(), endpoint.trim());
            }
            _ => log::warn!("Ignoring malformed {} entry: {:?}", MCP_SERVERS_ENV, token),
        }
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(registry: &ConnectorRegistry) -> Vec<(&str, &str)> {
        registry
            .iter()
            .map(|s| (s.name.as_str(), s.endpoint.as_str()))
            .collect()
    }

    #[test]
    fn test_parse_none_is_empty() {
        assert!(parse_registry(None).is_empty());
    }

    #[test]
    fn test_parse_empty_string_is_empty() {
        assert!(parse_registry(Some("")).is_empty());
        assert!(parse_registry(Some("   ")).is_empty());
    }

    #[test]
    fn test_parse_preserves_order() {
        let registry = parse_registry(Some("a=1,b=2"));
        assert_eq!(pairs(&registry), vec![("a", "1"), ("b", "2")]);
    }

    #[test]
    fn test_parse_drops_empty_tokens() {
        let registry = parse_registry(Some("a=1,,b=2"));
        assert_eq!(pairs(&registry), vec![("a", "1"), ("b", "2")]);
    }

    #[test]
    fn test_parse_drops_empty_name_or_value() {
        let registry = parse_registry(Some("a=,=1,b=2"));
        assert_eq!(pairs(&registry), vec![("b", "2")]);
    }

    #[test]
    fn test_parse_drops_token_without_equals() {
        let registry = parse_registry(Some("justaname,b=2"));
        assert_eq!(pairs(&registry), vec![("b", "2")]);
    }

    #[test]
    fn test_parse_splits_on_first_equals_only() {
        let registry = parse_registry(Some("a=http://x?y=1"));
        assert_eq!(registry.get("a"), Some("http://x?y=1"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_parse_last_write_wins() {
        let registry = parse_registry(Some("a=1,a=2"));
        assert_eq!(pairs(&registry), vec![("a", "2")]);
    }

    #[test]
    fn test_parse_duplicate_keeps_first_position() {
        let registry = parse_registry(Some("a=1,b=2,a=3"));
        assert_eq!(pairs(&registry), vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let registry = parse_registry(Some(" prometheus = http://prom:8001/sse , k8s=http://k8s/sse "));
        assert_eq!(
            pairs(&registry),
            vec![("prometheus", "http://prom:8001/sse"), ("k8s", "http://k8s/sse")]
        );
    }

    #[test]
    fn test_parse_whitespace_only_value_dropped() {
        let registry = parse_registry(Some("a=   ,b=2"));
        assert_eq!(pairs(&registry), vec![("b", "2")]);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let input = "prometheus=http://p/sse,kubernetes=http://k/sse?token=a=b";
        assert_eq!(parse_registry(Some(input)), parse_registry(Some(input)));
    }

    #[test]
    fn test_names_in_order() {
        let registry = parse_registry(Some("z=1,a=2,m=3"));
        assert_eq!(registry.names(), vec!["z", "a", "m"]);
    }
}
