//! JSON model definitions.
//!
//! A definition describes one model: its fields, keys, storage and the
//! dependencies and transformers wired into it. Sub-model transformers carry
//! a full definition of their child model.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use std::path::PathBuf;

/// A complete model definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Model name, also used for array storage
    pub name: String,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Key fields, in key order
    #[serde(default)]
    pub keys: Vec<String>,

    /// Fields in declaration order
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,

    #[serde(default)]
    pub storage: StorageDefinition,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyDefinition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformers: Vec<TransformerDefinition>,

    /// Default filter, PHP-array shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<JsonValue>,

    /// Default sort, `{"field": "asc"}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<JsonValue>,
}

/// One field: its settings and optionally a named type handler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,

    /// Type handler name (`date`, `concatenated`, ...)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,

    /// Raw settings; also the options of the type handler
    #[serde(default)]
    pub settings: JsonMap<String, JsonValue>,
}

/// Where rows live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageDefinition {
    /// In-memory rows
    Array {
        #[serde(default)]
        rows: Vec<JsonValue>,
    },

    /// A CSV file, relative paths resolved against the definition file
    Csv { path: PathBuf },
}

impl Default for StorageDefinition {
    fn default() -> Self {
        StorageDefinition::Array { rows: Vec::new() }
    }
}

/// A dependency by class name; remaining keys are class options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyDefinition {
    pub class: String,

    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_on_change: Option<bool>,

    #[serde(flatten)]
    pub options: JsonMap<String, JsonValue>,
}

/// A transformer by class name; sub-model classes need `join` and `model`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerDefinition {
    pub class: String,

    /// Name of the embedding field, defaults to the child model name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Parent field to child field
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub join: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Box<ModelDefinition>>,

    #[serde(flatten)]
    pub options: JsonMap<String, JsonValue>,
}

/// A small definition exercising types, dependencies and a sub model.
pub fn example_definition() -> JsonValue {
    json!({
        "name": "works",
        "description": "Musical works with their creators",
        "keys": ["id"],
        "fields": [
            { "name": "id", "settings": { "label": "ID" } },
            { "name": "title", "settings": { "label": "Title" } },
            { "name": "kind", "settings": {
                "label": "Kind",
                "multiOptions": { "song": "Song", "instrumental": "Instrumental" }
            } },
            { "name": "lyrics_by", "settings": { "label": "Lyricist" } },
            { "name": "registered", "type": "date", "settings": { "label": "Registered" } },
            { "name": "published", "type": "yes_no", "settings": { "label": "Published" } },
            { "name": "tags", "type": "concatenated", "settings": { "label": "Tags", "padded": true } }
        ],
        "storage": { "kind": "array", "rows": [
            { "id": 1, "title": "Blue Train", "kind": "instrumental", "lyrics_by": "",
              "registered": "1957-09-15", "published": 1, "tags": "|jazz|hard bop|" },
            { "id": 2, "title": "Naima", "kind": "song", "lyrics_by": "J. Hendricks",
              "registered": "1959-05-04", "published": 0, "tags": "|jazz|" }
        ] },
        "dependencies": [
            { "class": "readonly", "depends_on": ["published"], "fields": ["title", "kind"] },
            { "class": "value_switch", "depends_on": ["kind"], "switches": {
                "instrumental": { "lyrics_by": { "readonly": "readonly", "label": "Lyricist (n/a)" } },
                "song": { "lyrics_by": { "readonly": null, "label": "Lyricist" } }
            } }
        ],
        "transformers": [
            { "class": "one_to_many", "name": "creators", "join": { "id": "work_id" }, "model": {
                "name": "creators",
                "keys": ["work_id", "creator"],
                "fields": [
                    { "name": "work_id" },
                    { "name": "creator", "settings": { "label": "Creator" } },
                    { "name": "role", "settings": { "label": "Role" } }
                ],
                "storage": { "kind": "array", "rows": [
                    { "work_id": 1, "creator": "John Coltrane", "role": "composer" },
                    { "work_id": 2, "creator": "John Coltrane", "role": "composer" }
                ] }
            } }
        ],
        "sort": { "title": "asc" }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_parses() {
        let definition: ModelDefinition = serde_json::from_value(example_definition()).unwrap();
        assert_eq!(definition.keys, vec!["id"]);
        assert_eq!(definition.fields[4].field_type.as_deref(), Some("date"));
        assert_eq!(definition.dependencies[1].options["switches"]["song"]["lyrics_by"]["label"], "Lyricist");

        let sub = &definition.transformers[0];
        assert_eq!(sub.join["id"], "work_id");
        assert_eq!(sub.model.as_ref().unwrap().name, "creators");
    }

    #[test]
    fn test_storage_defaults_to_empty_array() {
        let definition: ModelDefinition = serde_json::from_value(json!({ "name": "empty" })).unwrap();
        assert!(matches!(definition.storage, StorageDefinition::Array { ref rows } if rows.is_empty()));

        let csv: StorageDefinition = serde_json::from_value(json!({ "kind": "csv", "path": "works.csv" })).unwrap();
        assert!(matches!(csv, StorageDefinition::Csv { .. }));
    }
}
