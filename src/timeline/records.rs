//! Timeline record types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier shared by every kind of timeline record.
pub type Guid = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub guid: Guid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub guid: Guid,
    pub text: String,
}

/// A kind of event, named by the label at `name_guid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventClass {
    pub guid: Guid,
    pub name_guid: Guid,
}

/// One occurrence of an [`EventClass`] on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub guid: Guid,
    pub entity_guid: Guid,
    pub class_guid: Guid,
    pub timestamp: u64,
}

/// Semantic kind of a [`Relationship`], with its wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum RelationshipType {
    /// Head owns tail as a child.
    Retention = 0,
    /// Tail is a runtime execution of head.
    Execution = 1,
    DataLink = 2,
    /// Attaches a label to head; `attribute_guid` names the role.
    LabelLink = 3,
}

impl RelationshipType {
    pub const fn code(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for RelationshipType {
    type Error = u32;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Retention),
            1 => Ok(Self::Execution),
            2 => Ok(Self::DataLink),
            3 => Ok(Self::LabelLink),
            other => Err(other),
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Retention => "retention",
            Self::Execution => "execution",
            Self::DataLink => "data",
            Self::LabelLink => "label",
        };
        f.write_str(name)
    }
}

/// An instruction linking two records.
///
/// `attribute_guid` is only meaningful for label links, where it points at the label
/// naming the role (`name`, `type`, `backendId`, `connection` or an extended key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub guid: Guid,
    pub relationship_type: RelationshipType,
    pub head_guid: Guid,
    pub tail_guid: Guid,
    pub attribute_guid: Guid,
}

impl Relationship {
    pub fn new(
        guid: Guid,
        relationship_type: RelationshipType,
        head_guid: Guid,
        tail_guid: Guid,
    ) -> Self {
        Self { guid, relationship_type, head_guid, tail_guid, attribute_guid: 0 }
    }

    /// A label link from `head_guid` to `tail_guid` in the role named by `attribute_guid`.
    pub fn label_link(guid: Guid, head_guid: Guid, tail_guid: Guid, attribute_guid: Guid) -> Self {
        Self {
            guid,
            relationship_type: RelationshipType::LabelLink,
            head_guid,
            tail_guid,
            attribute_guid,
        }
    }
}

/// Any one timeline record, in the order it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimelineRecord {
    Entity(Entity),
    EventClass(EventClass),
    Label(Label),
    Relationship(Relationship),
    Event(Event),
}

impl TimelineRecord {
    pub fn guid(&self) -> Guid {
        match self {
            Self::Entity(entity) => entity.guid,
            Self::EventClass(class) => class.guid,
            Self::Label(label) => label.guid,
            Self::Relationship(relationship) => relationship.guid,
            Self::Event(event) => event.guid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn relationship_codes_round_trip(code in 0u32..8) {
            match RelationshipType::try_from(code) {
                Ok(kind) => prop_assert_eq!(kind.code(), code),
                Err(unknown) => {
                    prop_assert!(code > 3);
                    prop_assert_eq!(unknown, code);
                }
            }
        }
    }

    #[test]
    fn label_link_carries_attribute() {
        let link = Relationship::label_link(9, 1, 2, 3);
        assert_eq!(link.relationship_type, RelationshipType::LabelLink);
        assert_eq!(link.attribute_guid, 3);
        assert_eq!(Relationship::new(9, RelationshipType::Retention, 1, 2).attribute_guid, 0);
        assert_eq!(TimelineRecord::Relationship(link).guid(), 9);
    }
}
