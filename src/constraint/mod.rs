//! Typed codec for attribute values.
//!
//! Each attribute may declare a [`Constraint`]. Values are encoded into their
//! storage representation on write and decoded back before being handed to a
//! caller. The codec is best effort: a value the constraint cannot interpret
//! is stored untouched rather than failing the write.

mod codec;

use serde::{Deserialize, Serialize};

use crate::types::{Attribute, DataRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Constraint {
    Text,
    Number,
    Percentage,
    DateTime {
        /// chrono format string accepted on input besides RFC 3339.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    Boolean,
    Duration,
    FileAttachment,
    Select {
        #[serde(default)]
        options: Vec<String>,
    },
    Color,
    User,
}

impl Constraint {
    pub fn name(&self) -> &'static str {
        match self {
            Constraint::Text => "text",
            Constraint::Number => "number",
            Constraint::Percentage => "percentage",
            Constraint::DateTime { .. } => "date_time",
            Constraint::Boolean => "boolean",
            Constraint::Duration => "duration",
            Constraint::FileAttachment => "file_attachment",
            Constraint::Select { .. } => "select",
            Constraint::Color => "color",
            Constraint::User => "user",
        }
    }
}

/// Stateless encoder/decoder driven by an attribute list.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintManager;

impl ConstraintManager {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Converts every present value with a constrained attribute into its
    /// storage encoding. Unconstrained or unknown attributes pass through.
    /// Non-finite floats become `Null` everywhere, matching what storage
    /// keeps of them.
    pub fn encode(&self, attributes: &[Attribute], data: &mut DataRecord) {
        for (id, value) in data.iter_mut() {
            let raw = std::mem::take(value).normalized();
            *value = match constraint_for(attributes, id) {
                Some(constraint) => codec::encode(constraint, raw),
                None => raw,
            };
        }
    }

    /// Inverse of [`encode`](Self::encode), applied to data leaving the core.
    pub fn decode(&self, attributes: &[Attribute], data: &mut DataRecord) {
        for (id, value) in data.iter_mut() {
            if let Some(constraint) = constraint_for(attributes, id) {
                let stored = std::mem::take(value);
                *value = codec::decode(constraint, stored);
            }
        }
    }

    /// Ids of attributes whose values reference file attachments.
    #[must_use]
    pub fn file_attribute_ids(&self, attributes: &[Attribute]) -> Vec<String> {
        attributes
            .iter()
            .filter(|a| matches!(a.constraint, Some(Constraint::FileAttachment)))
            .map(|a| a.id.clone())
            .collect()
    }
}

fn constraint_for<'a>(attributes: &'a [Attribute], id: &str) -> Option<&'a Constraint> {
    attributes
        .iter()
        .find(|a| a.id == id)
        .and_then(|a| a.constraint.as_ref())
}
