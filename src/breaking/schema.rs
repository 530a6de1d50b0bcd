use std::collections::BTreeMap;

use crate::{
    breaking::{ChangeSource, ChangeType, DetectedChange, MigrationStrategy, Severity},
    catalog::PropertySchema,
    common::path,
};

/// Flatten a property schema into dotted paths. Children of collections
/// appear under their parent's path (`options.rawBody`).
pub fn flatten_schema(properties: &[PropertySchema]) -> BTreeMap<String, &PropertySchema> {
    let mut flat = BTreeMap::new();
    flatten_into(properties, "", &mut flat);
    flat
}

fn flatten_into<'a>(
    properties: &'a [PropertySchema],
    prefix: &str,
    flat: &mut BTreeMap<String, &'a PropertySchema>,
) {
    for property in properties {
        let key = path::join(prefix, &property.name);
        flatten_into(&property.options, &key, flat);
        flat.insert(key, property);
    }
}

/// Classify the differences between two versions of a property schema.
pub fn detect_schema_changes(
    old: &[PropertySchema],
    new: &[PropertySchema],
) -> Vec<DetectedChange> {
    let old = flatten_schema(old);
    let new = flatten_schema(new);
    let mut changes = Vec::new();

    for (key, property) in new.iter() {
        match old.get(key) {
            None => changes.push(added(key, property)),
            Some(before) if before.required != property.required => changes.push(requirement_changed(key, before, property)),
            Some(_) => {}
        }
    }

    for key in old.keys().filter(|k| !new.contains_key(*k)) {
        changes.push(DetectedChange {
            property_name: key.clone(),
            change_type: ChangeType::Removed,
            is_breaking: true,
            old_value: None,
            new_value: None,
            migration_hint: format!("'{}' no longer exists and will be removed", key),
            auto_migratable: true,
            migration_strategy: Some(MigrationStrategy::RemoveProperty { path: key.clone() }),
            severity: Severity::Medium,
            source: ChangeSource::Dynamic,
        });
    }

    changes
}

fn added(
    key: &str,
    property: &PropertySchema,
) -> DetectedChange {
    let strategy = match (&property.default, property.required) {
        (Some(default), true) => Some(MigrationStrategy::AddProperty {
            path: key.to_string(),
            default_value: default.clone(),
        }),
        _ => None,
    };
    let migration_hint = match (property.required, &strategy) {
        (false, _) => format!("optional property '{}' was added", key),
        (true, Some(_)) => format!("required property '{}' was added and will be set to its default", key),
        (true, None) => format!("required property '{}' was added; set a value for it", key),
    };
    DetectedChange {
        property_name: key.to_string(),
        change_type: ChangeType::Added,
        is_breaking: property.required,
        old_value: None,
        new_value: property.default.clone(),
        migration_hint,
        auto_migratable: strategy.is_some(),
        migration_strategy: strategy,
        severity: if property.required { Severity::High } else { Severity::Low },
        source: ChangeSource::Dynamic,
    }
}

fn requirement_changed(
    key: &str,
    before: &PropertySchema,
    after: &PropertySchema,
) -> DetectedChange {
    let now_required = after.required && !before.required;
    DetectedChange {
        property_name: key.to_string(),
        change_type: ChangeType::RequirementChanged,
        is_breaking: now_required,
        old_value: Some(before.required.into()),
        new_value: Some(after.required.into()),
        migration_hint: if now_required {
            format!("'{}' is now required; choose a value for it", key)
        } else {
            format!("'{}' is now optional", key)
        },
        auto_migratable: false,
        migration_strategy: None,
        severity: if now_required { Severity::High } else { Severity::Low },
        source: ChangeSource::Dynamic,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        catalog::{NodeCatalog, StaticCatalog},
        common::Version,
    };

    fn schema(v: serde_json::Value) -> Vec<PropertySchema> {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_flatten_nested() {
        let props = schema(json!([
            {"name": "url", "type": "string"},
            {"name": "options", "type": "collection", "options": [{"name": "timeout", "type": "number"}]}
        ]));
        let flat = flatten_schema(&props);
        assert_eq!(flat.keys().cloned().collect::<Vec<_>>(), vec!["options", "options.timeout", "url"]);
    }

    #[test]
    fn test_classification() {
        let old = schema(json!([
            {"name": "a", "type": "string"},
            {"name": "b", "type": "string"},
            {"name": "c", "type": "string", "required": true}
        ]));
        let new = schema(json!([
            {"name": "a", "type": "string", "required": true},
            {"name": "c", "type": "string"},
            {"name": "d", "type": "string"},
            {"name": "e", "type": "string", "required": true, "default": "x"}
        ]));
        let changes = detect_schema_changes(&old, &new);
        let by_name = |n: &str| changes.iter().find(|c| c.property_name == n).unwrap();

        assert_eq!(by_name("a").change_type, ChangeType::RequirementChanged);
        assert!(by_name("a").is_breaking);
        assert!(!by_name("a").auto_migratable);
        assert!(!by_name("c").is_breaking);
        assert_eq!(by_name("b").change_type, ChangeType::Removed);
        assert!(by_name("b").is_breaking && by_name("b").auto_migratable);
        assert!(!by_name("d").is_breaking);
        assert!(by_name("e").is_breaking);
        assert_eq!(
            by_name("e").migration_strategy,
            Some(MigrationStrategy::AddProperty {
                path: "e".into(),
                default_value: json!("x")
            })
        );
    }

    #[test]
    fn test_removed_parent_reports_children() {
        let old = schema(json!([{"name": "options", "type": "collection", "options": [{"name": "x", "type": "string"}]}]));
        let changes = detect_schema_changes(&old, &[]);
        let removed: Vec<&str> = changes.iter().map(|c| c.property_name.as_str()).collect();
        assert_eq!(removed, vec!["options", "options.x"]);
        assert!(changes.iter().all(|c| c.change_type == ChangeType::Removed));
    }

    #[test]
    fn test_webhook_catalog_diff() {
        let catalog = StaticCatalog::builtin().unwrap();
        let old = catalog.property_schema("webhook", &Version::from_f64(2.0)).unwrap();
        let new = catalog.property_schema("webhook", &Version::from_f64(2.1)).unwrap();
        let changes = detect_schema_changes(&old, &new);
        let removed: Vec<&str> = changes.iter().filter(|c| c.change_type == ChangeType::Removed).map(|c| c.property_name.as_str()).collect();
        assert_eq!(removed, vec!["options.rawBody"]);
    }
}
