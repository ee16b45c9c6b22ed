//! Incremental construction of a timeline [`Model`]

use tracing::{trace, warn};

use super::model::{EventClassEntry, INFERENCE_TYPE, JsonEntity, Model, roles};
use super::records::{
    Entity, Event, EventClass, Guid, Label, Relationship, RelationshipType, TimelineRecord,
};
use crate::{ProfilingError, Result};

/// Receiver for decoded timeline records.
///
/// Every `create_*` call either applies the record or fails with
/// [`ProfilingError::MalformedRecord`]. Problems the decoder finds itself, such as an
/// unknown relationship type, go through [`report_malformed`](Self::report_malformed).
pub trait TimelineDecoder {
    fn create_entity(&mut self, entity: Entity) -> Result<()>;

    fn create_event_class(&mut self, event_class: EventClass) -> Result<()>;

    fn create_event(&mut self, event: Event) -> Result<()>;

    fn create_label(&mut self, label: Label) -> Result<()>;

    fn create_relationship(&mut self, relationship: Relationship) -> Result<()>;

    fn report_malformed(&mut self, error: ProfilingError);

    /// Route any record to its `create_*` operation.
    fn create_record(&mut self, record: TimelineRecord) -> Result<()> {
        match record {
            TimelineRecord::Entity(entity) => self.create_entity(entity),
            TimelineRecord::EventClass(event_class) => self.create_event_class(event_class),
            TimelineRecord::Label(label) => self.create_label(label),
            TimelineRecord::Relationship(relationship) => self.create_relationship(relationship),
            TimelineRecord::Event(event) => self.create_event(event),
        }
    }
}

/// What a relationship does to the model once its role is known.
#[derive(Debug, PartialEq, Eq)]
enum Link {
    Child { parent: Guid, child: Guid },
    Execution { owner: Guid, execution: Guid },
    Data,
    Attribute { entity: Guid, key: String, value: String },
    Connection { guid: Guid, from: Guid, to: Guid },
    EventClassName { class: Guid, name: String },
}

/// Builds a [`Model`] from a single stream of records.
///
/// Failed records are collected in [`Model::errors`] as well as returned, so a stream
/// with a few bad records still produces a usable model. The builder has one writer;
/// wrap it in a mutex to share it, and treat anything rendered while records are still
/// arriving as a point-in-time snapshot.
#[derive(Debug, Default)]
pub struct TimelineModelBuilder {
    model: Model,
}

impl TimelineModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn into_model(self) -> Model {
        self.model
    }

    fn reject(&mut self, guid: Guid, reason: String) -> Result<()> {
        warn!(guid, %reason, "Malformed timeline record");
        self.model.errors.push(ProfilingError::malformed_record(guid, reason.clone()));
        Err(ProfilingError::malformed_record(guid, reason))
    }

    fn label_text(&self, guid: Guid) -> Option<&str> {
        self.model.labels.get(&guid).map(|label| label.text.as_str())
    }

    fn is_entity(&self, guid: Guid) -> bool {
        self.model.entities.contains_key(&guid)
    }

    fn classify(&self, relationship: &Relationship) -> std::result::Result<Link, String> {
        let Relationship { guid, head_guid: head, tail_guid: tail, attribute_guid, .. } =
            *relationship;

        match relationship.relationship_type {
            RelationshipType::Retention | RelationshipType::Execution => {
                if !self.is_entity(head) {
                    return Err(format!("unknown head entity [{head}]"));
                }
                if !self.is_entity(tail) {
                    return Err(format!("unknown tail entity [{tail}]"));
                }
                if relationship.relationship_type == RelationshipType::Retention {
                    Ok(Link::Child { parent: head, child: tail })
                } else {
                    Ok(Link::Execution { owner: head, execution: tail })
                }
            }
            RelationshipType::DataLink => Ok(Link::Data),
            RelationshipType::LabelLink => {
                let Some(role) = self.label_text(attribute_guid) else {
                    return Err(format!("unknown attribute label [{attribute_guid}]"));
                };

                if role == roles::CONNECTION {
                    if !self.is_entity(head) || !self.is_entity(tail) {
                        return Err(format!(
                            "connection between unknown entities [{head}] and [{tail}]"
                        ));
                    }
                    return Ok(Link::Connection { guid, from: head, to: tail });
                }

                let Some(value) = self.label_text(tail) else {
                    return Err(format!("unknown value label [{tail}]"));
                };
                if self.is_entity(head) {
                    Ok(Link::Attribute { entity: head, key: role.to_string(), value: value.to_string() })
                } else if role == roles::NAME && self.model.event_classes.contains_key(&head) {
                    Ok(Link::EventClassName { class: head, name: value.to_string() })
                } else {
                    Err(format!("'{role}' label attached to unknown record [{head}]"))
                }
            }
        }
    }

    fn apply(&mut self, link: Link) {
        let model = &mut self.model;
        match link {
            Link::Child { parent, child } => {
                if let Some(parent) = model.entities.get_mut(&parent) {
                    parent.children.insert(child);
                }
            }
            Link::Execution { owner, execution } => {
                if let Some(owner) = model.entities.get_mut(&owner) {
                    owner.executions.insert(execution);
                }
            }
            Link::Data => {}
            Link::Attribute { entity, key, value } => {
                if key == roles::TYPE && value == INFERENCE_TYPE {
                    model.inferences.insert(entity);
                }
                if let Some(entity) = model.entities.get_mut(&entity) {
                    entity.attributes.insert(key, value);
                }
            }
            Link::Connection { guid, from, to } => {
                if let Some(entity) = model.entities.get_mut(&from) {
                    entity.connections.insert(guid, (from, to));
                }
            }
            Link::EventClassName { class, name } => {
                if let Some(entry) = model.event_classes.get_mut(&class) {
                    entry.name = Some(name);
                }
            }
        }
    }
}

impl TimelineDecoder for TimelineModelBuilder {
    fn create_entity(&mut self, entity: Entity) -> Result<()> {
        trace!(guid = entity.guid, "Entity");
        self.model.entities.entry(entity.guid).or_insert_with(|| JsonEntity::new(entity.guid));
        Ok(())
    }

    fn create_event_class(&mut self, event_class: EventClass) -> Result<()> {
        trace!(guid = event_class.guid, name_guid = event_class.name_guid, "Event class");
        match self.model.event_classes.get(&event_class.guid) {
            Some(existing) if existing.class == event_class => Ok(()),
            Some(existing) => {
                let reason = format!(
                    "event class redefined with name label [{}], already [{}]",
                    event_class.name_guid, existing.class.name_guid
                );
                self.reject(event_class.guid, reason)
            }
            None => {
                let entry = EventClassEntry { class: event_class, name: None };
                self.model.event_classes.insert(event_class.guid, entry);
                Ok(())
            }
        }
    }

    fn create_event(&mut self, event: Event) -> Result<()> {
        trace!(guid = event.guid, entity = event.entity_guid, class = event.class_guid, "Event");
        if let Some(existing) = self.model.events.get(&event.guid) {
            if *existing == event {
                return Ok(());
            }
            return self.reject(event.guid, "event redefined with different fields".to_string());
        }
        if !self.model.event_classes.contains_key(&event.class_guid) {
            return self.reject(event.guid, format!("unknown event class [{}]", event.class_guid));
        }

        let Some(entity) = self.model.entities.get_mut(&event.entity_guid) else {
            return self.reject(event.guid, format!("unknown entity [{}]", event.entity_guid));
        };
        entity.events.insert(event.guid);
        self.model.events.insert(event.guid, event);
        Ok(())
    }

    fn create_label(&mut self, label: Label) -> Result<()> {
        trace!(guid = label.guid, text = %label.text, "Label");
        match self.model.labels.get(&label.guid) {
            Some(existing) if existing.text == label.text => Ok(()),
            Some(existing) => {
                let reason =
                    format!("label redefined as '{}', already '{}'", label.text, existing.text);
                self.reject(label.guid, reason)
            }
            None => {
                self.model.labels.insert(label.guid, label);
                Ok(())
            }
        }
    }

    fn create_relationship(&mut self, relationship: Relationship) -> Result<()> {
        trace!(
            guid = relationship.guid,
            kind = %relationship.relationship_type,
            head = relationship.head_guid,
            tail = relationship.tail_guid,
            "Relationship"
        );
        if let Some(existing) = self.model.relationships.get(&relationship.guid) {
            if *existing == relationship {
                return Ok(());
            }
            let reason = "relationship redefined with different fields".to_string();
            return self.reject(relationship.guid, reason);
        }

        match self.classify(&relationship) {
            Ok(link) => {
                self.apply(link);
                self.model.relationships.insert(relationship.guid, relationship);
                Ok(())
            }
            Err(reason) => self.reject(relationship.guid, reason),
        }
    }

    fn report_malformed(&mut self, error: ProfilingError) {
        warn!(%error, "Malformed timeline data");
        self.model.errors.push(error);
    }
}
