//! Timeline model: records describing entities, labels, relationships and events, and
//! the builder that turns a stream of them into a navigable graph.
//!
//! ```rust
//! use profwire::timeline::{
//!     Entity, Label, Relationship, TimelineDecoder, TimelineModelBuilder,
//! };
//!
//! let mut builder = TimelineModelBuilder::new();
//! builder.create_label(Label { guid: 100, text: "name".into() })?;
//! builder.create_label(Label { guid: 101, text: "conv".into() })?;
//! builder.create_entity(Entity { guid: 1 })?;
//! builder.create_relationship(Relationship::label_link(200, 1, 101, 100))?;
//!
//! assert_eq!(builder.model().describe(), vec!["Entity [1] name = conv"]);
//! # Ok::<(), profwire::ProfilingError>(())
//! ```

mod builder;
pub mod codec;
mod handler;
mod model;
mod records;

pub use builder::{TimelineDecoder, TimelineModelBuilder};
pub use handler::TimelinePacketHandler;
pub use model::{INFERENCE_TYPE, JsonEntity, Model, roles};
pub use records::{
    Entity, Event, EventClass, Guid, Label, Relationship, RelationshipType, TimelineRecord,
};

#[cfg(test)]
mod tests;
