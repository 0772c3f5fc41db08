//! Serde model of a Swagger/OpenAPI v2 document
//!
//! Deliberately partial: only the surface the front-end consumes. Unknown
//! keys are ignored by serde; structural problems surface when the builder
//! walks the document, with the offending route in the error.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Document {
    #[serde(default)]
    pub swagger: String,
    #[serde(default)]
    pub tags: Vec<TagDecl>,
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
    #[serde(default)]
    pub definitions: BTreeMap<String, Schema>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TagDecl {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct PathItem {
    pub get: Option<Operation>,
    pub put: Option<Operation>,
    pub post: Option<Operation>,
    pub delete: Option<Operation>,
    pub patch: Option<Operation>,
}

impl PathItem {
    /// Declared operations with their verbs, in a fixed verb order.
    pub fn operations(&self) -> impl Iterator<Item = (crate::ir::HttpVerb, &Operation)> {
        use crate::ir::HttpVerb;
        [
            (HttpVerb::Get, self.get.as_ref()),
            (HttpVerb::Put, self.put.as_ref()),
            (HttpVerb::Post, self.post.as_ref()),
            (HttpVerb::Delete, self.delete.as_ref()),
            (HttpVerb::Patch, self.patch.as_ref()),
        ]
        .into_iter()
        .filter_map(|(verb, op)| op.map(|o| (verb, o)))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Operation {
    #[serde(default)]
    pub tags: Vec<String>,
    pub operation_id: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub responses: BTreeMap<String, Response>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct Parameter {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "in", default)]
    pub location: String,
    #[serde(default)]
    pub required: bool,
    pub schema: Option<Schema>,
    #[serde(rename = "type")]
    pub ty: Option<String>,
    #[serde(default)]
    pub format: String,
    pub items: Option<Box<Schema>>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct Response {
    pub schema: Option<Schema>,
}

/// `additionalProperties` is either a bool toggle or a value schema.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum AdditionalProps {
    Flag(bool),
    Schema(Box<Schema>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Schema {
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
    #[serde(rename = "type")]
    pub ty: Option<String>,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Schema>,
    #[serde(default)]
    pub required: Vec<String>,
    pub items: Option<Box<Schema>>,
    pub additional_properties: Option<AdditionalProps>,
    #[serde(rename = "enum", default)]
    pub enumeration: Vec<serde_json::Value>,
}

impl Schema {
    /// Whether this schema describes an object with named properties.
    pub fn is_object(&self) -> bool {
        self.ty.as_deref() == Some("object") || !self.properties.is_empty()
    }

    /// The value schema of a map-shaped object, if any.
    pub fn map_values(&self) -> Option<&Schema> {
        match &self.additional_properties {
            Some(AdditionalProps::Schema(value)) => Some(value),
            _ => None,
        }
    }

    /// Enum values as strings, dropping non-string entries.
    pub fn enum_values(&self) -> Vec<String> {
        self.enumeration
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}
