//! Shared fixtures for tests and benchmarks
//!
//! The main fixture is the timeline of one inference over a three-layer network
//! (`input -> normalization -> output`) with one CpuRef workload per layer, together
//! with the text rendering it must produce.

#![cfg(any(test, feature = "benchmark"))]

use crate::timeline::{
    Entity, Event, EventClass, Guid, Label, Relationship, RelationshipType, TimelineRecord,
};
use crate::types::PacketBuffer;

/// Attribute label guids.
pub const NAME_LABEL: Guid = 1000;
pub const TYPE_LABEL: Guid = 1001;
pub const BACKEND_ID_LABEL: Guid = 1002;
pub const CONNECTION_LABEL: Guid = 1003;

pub const START_OF_LIFE_CLASS: Guid = 3000;
pub const END_OF_LIFE_CLASS: Guid = 3001;

/// Guid of the inference entity in [`network_timeline`].
pub const INFERENCE_GUID: Guid = 31;

/// Expected `describe()` output for [`network_timeline`].
pub const NETWORK_DESCRIPTION: &[&str] = &[
    "Entity [0] name = input type = layer",
    "   connection [14] from entity [0] to entity [1]",
    "   child: Entity [23] backendId = CpuRef type = workload",
    "Entity [1] name = normalization type = layer",
    "   connection [22] from entity [1] to entity [2]",
    "   child: Entity [15] backendId = CpuRef type = workload",
    "Entity [2] name = output type = layer",
    "   child: Entity [27] backendId = CpuRef type = workload",
    "Entity [6] type = network",
    "   child: Entity [0] name = input type = layer",
    "   child: Entity [1] name = normalization type = layer",
    "   child: Entity [2] name = output type = layer",
    "   execution: Entity [31] type = inference",
    "Entity [15] backendId = CpuRef type = workload",
    "   execution: Entity [44] type = workload_execution",
    "Entity [23] backendId = CpuRef type = workload",
    "   execution: Entity [36] type = workload_execution",
    "Entity [27] backendId = CpuRef type = workload",
    "   execution: Entity [52] type = workload_execution",
    "Entity [31] type = inference",
    "   child: Entity [36] type = workload_execution",
    "   child: Entity [44] type = workload_execution",
    "   child: Entity [52] type = workload_execution",
    "   event: [34] class [start_of_life]",
    "   event: [60] class [end_of_life]",
    "Entity [36] type = workload_execution",
    "   event: [40] class [start_of_life]",
    "   event: [42] class [end_of_life]",
    "Entity [44] type = workload_execution",
    "   event: [48] class [start_of_life]",
    "   event: [50] class [end_of_life]",
    "Entity [52] type = workload_execution",
    "   event: [56] class [start_of_life]",
    "   event: [58] class [end_of_life]",
];

/// Accumulates records, handing out relationship guids from a counter.
#[derive(Debug)]
pub struct RecordStream {
    records: Vec<TimelineRecord>,
    next_relationship: Guid,
    next_label: Guid,
}

impl RecordStream {
    pub fn new(first_relationship_guid: Guid) -> Self {
        Self { records: Vec::new(), next_relationship: first_relationship_guid, next_label: 0 }
    }

    pub fn into_records(self) -> Vec<TimelineRecord> {
        self.records
    }

    pub fn entity(&mut self, guid: Guid) -> &mut Self {
        self.records.push(TimelineRecord::Entity(Entity { guid }));
        self
    }

    pub fn label(&mut self, guid: Guid, text: &str) -> &mut Self {
        self.records.push(TimelineRecord::Label(Label { guid, text: text.to_string() }));
        self
    }

    pub fn event_class(&mut self, guid: Guid, name_guid: Guid) -> &mut Self {
        self.records.push(TimelineRecord::EventClass(EventClass { guid, name_guid }));
        self
    }

    pub fn event(&mut self, guid: Guid, entity_guid: Guid, class_guid: Guid) -> &mut Self {
        let timestamp = guid * 1_000;
        self.records.push(TimelineRecord::Event(Event { guid, entity_guid, class_guid, timestamp }));
        self
    }

    /// Label link from `head` to `value` in the role named by `attribute`.
    pub fn attribute(&mut self, head: Guid, value: Guid, attribute: Guid) -> &mut Self {
        let guid = self.relationship_guid();
        self.push_link(Relationship::label_link(guid, head, value, attribute))
    }

    pub fn connection(&mut self, guid: Guid, from: Guid, to: Guid) -> &mut Self {
        self.push_link(Relationship::label_link(guid, from, to, CONNECTION_LABEL))
    }

    pub fn retain(&mut self, parent: Guid, child: Guid) -> &mut Self {
        let guid = self.relationship_guid();
        self.push_link(Relationship::new(guid, RelationshipType::Retention, parent, child))
    }

    pub fn execute(&mut self, owner: Guid, execution: Guid) -> &mut Self {
        let guid = self.relationship_guid();
        self.push_link(Relationship::new(guid, RelationshipType::Execution, owner, execution))
    }

    /// Create a fresh label holding `text` and return its guid.
    ///
    /// Fresh labels are numbered downwards from `u64::MAX` to stay clear of the
    /// fixture's fixed guids.
    pub fn fresh_label(&mut self, text: &str) -> Guid {
        self.next_label += 1;
        let guid = u64::MAX - self.next_label;
        self.label(guid, text);
        guid
    }

    fn relationship_guid(&mut self) -> Guid {
        let guid = self.next_relationship;
        self.next_relationship += 1;
        guid
    }

    fn push_link(&mut self, relationship: Relationship) -> &mut Self {
        self.records.push(TimelineRecord::Relationship(relationship));
        self
    }
}

/// Records for one inference over the `input -> normalization -> output` network.
pub fn network_timeline() -> Vec<TimelineRecord> {
    const INPUT: Guid = 1010;
    const NORMALIZATION: Guid = 1011;
    const OUTPUT: Guid = 1012;
    const LAYER: Guid = 1013;
    const NETWORK: Guid = 1014;
    const WORKLOAD: Guid = 1015;
    const CPU_REF: Guid = 1016;
    const INFERENCE: Guid = 1017;
    const WORKLOAD_EXECUTION: Guid = 1018;
    const START_OF_LIFE: Guid = 1019;
    const END_OF_LIFE: Guid = 1020;

    let mut stream = RecordStream::new(2000);
    stream
        .label(NAME_LABEL, "name")
        .label(TYPE_LABEL, "type")
        .label(BACKEND_ID_LABEL, "backendId")
        .label(CONNECTION_LABEL, "connection")
        .label(INPUT, "input")
        .label(NORMALIZATION, "normalization")
        .label(OUTPUT, "output")
        .label(LAYER, "layer")
        .label(NETWORK, "network")
        .label(WORKLOAD, "workload")
        .label(CPU_REF, "CpuRef")
        .label(INFERENCE, "inference")
        .label(WORKLOAD_EXECUTION, "workload_execution")
        .label(START_OF_LIFE, "start_of_life")
        .label(END_OF_LIFE, "end_of_life")
        .event_class(START_OF_LIFE_CLASS, START_OF_LIFE)
        .event_class(END_OF_LIFE_CLASS, END_OF_LIFE);

    stream.entity(6).attribute(6, NETWORK, TYPE_LABEL);

    // (layer, name label, workload)
    let layers = [(0, INPUT, 23), (1, NORMALIZATION, 15), (2, OUTPUT, 27)];
    for (layer, name, _) in layers {
        stream
            .entity(layer)
            .attribute(layer, name, NAME_LABEL)
            .attribute(layer, LAYER, TYPE_LABEL)
            .retain(6, layer);
    }
    stream.connection(14, 0, 1).connection(22, 1, 2);

    for (layer, _, workload) in layers {
        stream
            .entity(workload)
            .attribute(workload, CPU_REF, BACKEND_ID_LABEL)
            .attribute(workload, WORKLOAD, TYPE_LABEL)
            .retain(layer, workload);
    }

    stream
        .entity(INFERENCE_GUID)
        .attribute(INFERENCE_GUID, INFERENCE, TYPE_LABEL)
        .execute(6, INFERENCE_GUID)
        .event(34, INFERENCE_GUID, START_OF_LIFE_CLASS);

    // (workload, execution, start event, end event)
    for (workload, execution, start, end) in [(23, 36, 40, 42), (15, 44, 48, 50), (27, 52, 56, 58)]
    {
        stream
            .entity(execution)
            .attribute(execution, WORKLOAD_EXECUTION, TYPE_LABEL)
            .retain(INFERENCE_GUID, execution)
            .execute(workload, execution)
            .event(start, execution, START_OF_LIFE_CLASS)
            .event(end, execution, END_OF_LIFE_CLASS);
    }

    stream.event(60, INFERENCE_GUID, END_OF_LIFE_CLASS);
    stream.into_records()
}

/// A chain of `layers` layers with one workload each and one inference over them,
/// for measuring ingestion and rendering at scale.
pub fn synthetic_timeline(layers: u64) -> Vec<TimelineRecord> {
    let mut stream = RecordStream::new(1 << 40);
    stream
        .label(NAME_LABEL, "name")
        .label(TYPE_LABEL, "type")
        .label(BACKEND_ID_LABEL, "backendId")
        .label(CONNECTION_LABEL, "connection");
    let layer_type = stream.fresh_label("layer");
    let workload_type = stream.fresh_label("workload");
    let execution_type = stream.fresh_label("workload_execution");
    let backend = stream.fresh_label("CpuRef");
    let start = stream.fresh_label("start_of_life");
    stream.event_class(START_OF_LIFE_CLASS, start);

    let network = 1 << 32;
    stream.entity(network);
    stream.entity(INFERENCE_GUID);
    stream.execute(network, INFERENCE_GUID);

    for layer in 0..layers {
        let guid = 100 + layer * 10;
        let name = stream.fresh_label(&format!("layer_{layer}"));
        stream
            .entity(guid)
            .attribute(guid, name, NAME_LABEL)
            .attribute(guid, layer_type, TYPE_LABEL)
            .retain(network, guid);
        if layer > 0 {
            stream.connection((1 << 36) + layer, guid - 10, guid);
        }

        let workload = guid + 1;
        let execution = guid + 2;
        stream
            .entity(workload)
            .attribute(workload, backend, BACKEND_ID_LABEL)
            .attribute(workload, workload_type, TYPE_LABEL)
            .retain(guid, workload)
            .entity(execution)
            .attribute(execution, execution_type, TYPE_LABEL)
            .retain(INFERENCE_GUID, execution)
            .execute(workload, execution)
            .event(guid + 3, execution, START_OF_LIFE_CLASS);
    }

    stream.into_records()
}

/// Concatenate the wire frames of `packets`, the layout of a capture file.
pub fn capture_bytes(packets: &[PacketBuffer]) -> Vec<u8> {
    packets
        .iter()
        .flat_map(|packet| packet.encode().expect("fixture packets fit a frame"))
        .collect()
}
