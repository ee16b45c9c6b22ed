//! The materialised timeline graph and its renderings

use serde::Serialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};

use super::records::{Event, EventClass, Guid, Label, Relationship};
use crate::ProfilingError;

/// Attribute keys that label links set on entities.
pub mod roles {
    pub const NAME: &str = "name";
    pub const TYPE: &str = "type";
    pub const BACKEND_ID: &str = "backendId";
    pub const CONNECTION: &str = "connection";
}

/// Entity type value marking an inference run.
pub const INFERENCE_TYPE: &str = "inference";

/// An entity together with everything relationships have attached to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JsonEntity {
    pub(super) guid: Guid,
    pub(super) attributes: BTreeMap<String, String>,
    pub(super) children: BTreeSet<Guid>,
    pub(super) executions: BTreeSet<Guid>,
    pub(super) events: BTreeSet<Guid>,
    /// Connection relationship guid to `(from, to)` entity guids.
    pub(super) connections: BTreeMap<Guid, (Guid, Guid)>,
}

impl JsonEntity {
    pub(super) fn new(guid: Guid) -> Self {
        Self { guid, ..Self::default() }
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn name(&self) -> Option<&str> {
        self.attribute(roles::NAME)
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.attribute(roles::TYPE)
    }

    pub fn backend_id(&self) -> Option<&str> {
        self.attribute(roles::BACKEND_ID)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn children(&self) -> &BTreeSet<Guid> {
        &self.children
    }

    pub fn executions(&self) -> &BTreeSet<Guid> {
        &self.executions
    }

    pub fn events(&self) -> &BTreeSet<Guid> {
        &self.events
    }

    pub fn connections(&self) -> &BTreeMap<Guid, (Guid, Guid)> {
        &self.connections
    }

    /// `Entity [<guid>]` followed by ` key = value` for every attribute in key order.
    pub fn header(&self) -> String {
        let mut header = format!("Entity [{}]", self.guid);
        for (key, value) in &self.attributes {
            header.push_str(&format!(" {key} = {value}"));
        }
        header
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct EventClassEntry {
    pub(super) class: EventClass,
    pub(super) name: Option<String>,
}

/// Graph built from timeline records.
///
/// Entities, labels, event classes and events are owned and keyed by guid.
/// Relationships are kept only so that a repeated record can be recognised; they are
/// never rendered themselves.
#[derive(Debug, Default)]
pub struct Model {
    pub(super) entities: BTreeMap<Guid, JsonEntity>,
    pub(super) labels: BTreeMap<Guid, Label>,
    pub(super) event_classes: BTreeMap<Guid, EventClassEntry>,
    pub(super) events: BTreeMap<Guid, Event>,
    pub(super) relationships: BTreeMap<Guid, Relationship>,
    pub(super) inferences: BTreeSet<Guid>,
    pub(super) errors: Vec<ProfilingError>,
}

impl Model {
    pub fn entity(&self, guid: Guid) -> Option<&JsonEntity> {
        self.entities.get(&guid)
    }

    /// Entities in ascending guid order.
    pub fn entities(&self) -> impl Iterator<Item = &JsonEntity> {
        self.entities.values()
    }

    pub fn label(&self, guid: Guid) -> Option<&Label> {
        self.labels.get(&guid)
    }

    pub fn event(&self, guid: Guid) -> Option<&Event> {
        self.events.get(&guid)
    }

    /// Guids of entities typed `inference`.
    pub fn inference_guids(&self) -> &BTreeSet<Guid> {
        &self.inferences
    }

    /// Problems collected while building, in the order they were found.
    pub fn errors(&self) -> &[ProfilingError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Display name of an event class: its renamed name, else the text of its name
    /// label, else the name guid itself.
    pub fn event_class_name(&self, class_guid: Guid) -> Option<String> {
        let entry = self.event_classes.get(&class_guid)?;
        let name = match &entry.name {
            Some(name) => name.clone(),
            None => match self.labels.get(&entry.class.name_guid) {
                Some(label) => label.text.clone(),
                None => entry.class.name_guid.to_string(),
            },
        };
        Some(name)
    }

    /// Render the model as text, one block per entity in ascending guid order.
    ///
    /// Each block is the entity header followed by its connections, children,
    /// executions and events, each group in ascending guid order and indented by
    /// three spaces.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();

        for entity in self.entities.values() {
            lines.push(entity.header());

            for (connection, (from, to)) in &entity.connections {
                lines.push(format!(
                    "   connection [{connection}] from entity [{from}] to entity [{to}]"
                ));
            }
            for child in &entity.children {
                lines.push(format!("   child: {}", self.header_of(*child)));
            }
            for execution in &entity.executions {
                lines.push(format!("   execution: {}", self.header_of(*execution)));
            }
            for event in &entity.events {
                let class = self
                    .events
                    .get(event)
                    .and_then(|event| self.event_class_name(event.class_guid))
                    .unwrap_or_default();
                lines.push(format!("   event: [{event}] class [{class}]"));
            }
        }

        lines
    }

    /// Structured form of [`describe`](Self::describe) for JSON exporters.
    pub fn to_json(&self) -> Value {
        let entities: Vec<Value> = self
            .entities
            .values()
            .map(|entity| {
                let events: Vec<Value> = entity
                    .events
                    .iter()
                    .filter_map(|guid| self.events.get(guid))
                    .map(|event| {
                        json!({
                            "guid": event.guid,
                            "class": self.event_class_name(event.class_guid),
                            "timestamp": event.timestamp,
                        })
                    })
                    .collect();
                let connections: Vec<Value> = entity
                    .connections
                    .iter()
                    .map(|(guid, (from, to))| json!({ "guid": guid, "from": from, "to": to }))
                    .collect();

                json!({
                    "guid": entity.guid,
                    "attributes": entity.attributes,
                    "children": entity.children,
                    "executions": entity.executions,
                    "connections": connections,
                    "events": events,
                })
            })
            .collect();

        json!({
            "entities": entities,
            "inferences": self.inferences,
            "errors": self.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
        })
    }

    fn header_of(&self, guid: Guid) -> String {
        match self.entities.get(&guid) {
            Some(entity) => entity.header(),
            None => format!("Entity [{guid}]"),
        }
    }
}
