use std::collections::HashMap;

use crate::{
    FlowmendError, Result,
    catalog::{NodeCatalog, NodeTypeInfo, normalize_node_type},
};

const BUILTIN_CATALOG: &str = include_str!("nodes.json");

/// Catalog loaded once from JSON and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    types: HashMap<String, NodeTypeInfo>,
}

impl StaticCatalog {
    /// The catalog shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Load a catalog from a JSON array of node type entries.
    pub fn from_json(s: &str) -> Result<Self> {
        let entries = serde_json::from_str::<Vec<NodeTypeInfo>>(s).map_err(|e| FlowmendError::Catalog(format!("invalid node catalog: {}", e)))?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries<I: IntoIterator<Item = NodeTypeInfo>>(entries: I) -> Self {
        let types = entries
            .into_iter()
            .map(|mut info| {
                info.node_type = normalize_node_type(&info.node_type);
                (info.node_type.clone(), info)
            })
            .collect();
        Self { types }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl NodeCatalog for StaticCatalog {
    fn lookup(
        &self,
        node_type: &str,
    ) -> Option<&NodeTypeInfo> {
        self.types.get(&normalize_node_type(node_type))
    }

    fn node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.types.keys().cloned().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Version;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = StaticCatalog::builtin().unwrap();
        assert!(catalog.len() > 10);
        let webhook = catalog.lookup("webhook").unwrap();
        assert_eq!(webhook.latest_version, "2.1".parse::<Version>().unwrap());
        assert!(webhook.webhook);
        assert!(catalog.lookup("nodes-base.httpRequest").is_some());
        assert!(catalog.lookup("n8n-nodes-base.doesNotExist").is_none());
    }

    #[test]
    fn test_custom_catalog() {
        let catalog = StaticCatalog::from_json(r#"[{"nodeType": "acme.widget", "latestVersion": "3"}]"#).unwrap();
        assert_eq!(catalog.latest_version("acme.widget"), Some(Version::new(vec![3])));
        assert_eq!(catalog.node_types(), vec!["acme.widget".to_string()]);
    }

    #[test]
    fn test_invalid_catalog() {
        assert!(matches!(StaticCatalog::from_json("{}"), Err(FlowmendError::Catalog(_))));
    }
}
