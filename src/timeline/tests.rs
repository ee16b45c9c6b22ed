//! Tests for timeline model construction and rendering

use std::sync::{Arc, Mutex};

use super::codec::{TIMELINE_MESSAGE_PACKET_ID, encode_packet};
use super::*;
use crate::ProfilingError;
use crate::command::{CommandHandler, CommandHandlerRegistry};
use crate::test_utils::{
    END_OF_LIFE_CLASS, INFERENCE_GUID, NAME_LABEL, NETWORK_DESCRIPTION, RecordStream, TYPE_LABEL,
    network_timeline, synthetic_timeline,
};
use crate::types::Packet;

fn build(records: Vec<TimelineRecord>) -> Model {
    let mut builder = TimelineModelBuilder::new();
    for record in records {
        let _ = builder.create_record(record);
    }
    builder.into_model()
}

#[test]
fn network_timeline_renders_expected_description() {
    let model = build(network_timeline());

    assert!(!model.has_errors(), "{:?}", model.errors());
    let description = model.describe();
    for (line, (actual, expected)) in description.iter().zip(NETWORK_DESCRIPTION).enumerate() {
        assert_eq!(actual, expected, "line {line}");
    }
    assert_eq!(description.len(), NETWORK_DESCRIPTION.len());
}

#[test]
fn network_timeline_via_wire_matches_direct_build() {
    let packet = encode_packet(&network_timeline()).unwrap();
    let mut builder = TimelineModelBuilder::new();
    codec::decode_records(packet.as_packet().unwrap().payload(), &mut builder).unwrap();

    assert_eq!(builder.model().describe(), NETWORK_DESCRIPTION);
}

#[test]
fn rendering_is_deterministic_across_record_order() {
    // Labels, classes and entities first, then everything else in reverse
    let records = network_timeline();
    let (definitions, mut links): (Vec<_>, Vec<_>) = records.into_iter().partition(|record| {
        matches!(
            record,
            TimelineRecord::Label(_) | TimelineRecord::EventClass(_) | TimelineRecord::Entity(_)
        )
    });
    links.reverse();

    let model = build(definitions.into_iter().chain(links).collect());
    assert!(!model.has_errors(), "{:?}", model.errors());
    assert_eq!(model.describe(), NETWORK_DESCRIPTION);
}

#[test]
fn inference_entities_are_tracked() {
    let model = build(network_timeline());
    assert_eq!(model.inference_guids().iter().copied().collect::<Vec<_>>(), vec![INFERENCE_GUID]);
    assert_eq!(model.entity(INFERENCE_GUID).unwrap().entity_type(), Some(INFERENCE_TYPE));
}

#[test]
fn entity_accessors_expose_links() {
    let model = build(network_timeline());

    let input = model.entity(0).unwrap();
    assert_eq!(input.name(), Some("input"));
    assert_eq!(input.entity_type(), Some("layer"));
    assert_eq!(input.connections().get(&14), Some(&(0, 1)));

    let workload = model.entity(23).unwrap();
    assert_eq!(workload.backend_id(), Some("CpuRef"));
    assert!(workload.executions().contains(&36));

    let event = model.event(60).unwrap();
    assert_eq!(event.class_guid, END_OF_LIFE_CLASS);
    assert_eq!(model.event_class_name(END_OF_LIFE_CLASS).as_deref(), Some("end_of_life"));
}

#[test]
fn unknown_guids_are_collected_not_fatal() {
    let mut stream = RecordStream::new(500);
    stream.entity(1).retain(1, 99).execute(98, 1).event(7, 1, 12345);
    let name = stream.fresh_label("orphan");
    stream.attribute(1, name, 4242);

    let model = build(stream.into_records());

    let guids: Vec<_> = model
        .errors()
        .iter()
        .map(|error| match error {
            ProfilingError::MalformedRecord { guid, .. } => *guid,
            other => panic!("unexpected error {other}"),
        })
        .collect();
    assert_eq!(guids, vec![500, 501, 7, 502]);
    assert_eq!(model.describe(), vec!["Entity [1]"]);
}

#[test]
fn create_operations_return_the_error_they_record() {
    let mut builder = TimelineModelBuilder::new();
    let result = builder.create_relationship(Relationship::new(9, RelationshipType::Retention, 1, 2));

    assert!(matches!(result, Err(ProfilingError::MalformedRecord { guid: 9, .. })));
    assert_eq!(builder.model().errors().len(), 1);
}

#[test]
fn identical_redefinition_is_a_no_op() {
    let mut builder = TimelineModelBuilder::new();
    for record in network_timeline().into_iter().chain(network_timeline()) {
        builder.create_record(record).unwrap();
    }

    assert!(!builder.model().has_errors());
    assert_eq!(builder.model().describe(), NETWORK_DESCRIPTION);
}

#[test]
fn conflicting_redefinition_keeps_original() {
    let mut builder = TimelineModelBuilder::new();
    builder.create_label(Label { guid: 5, text: "first".into() }).unwrap();
    assert!(builder.create_label(Label { guid: 5, text: "second".into() }).is_err());
    assert_eq!(builder.model().label(5).unwrap().text, "first");

    builder.create_event_class(EventClass { guid: 6, name_guid: 5 }).unwrap();
    assert!(builder.create_event_class(EventClass { guid: 6, name_guid: 8 }).is_err());

    builder.create_entity(Entity { guid: 1 }).unwrap();
    builder.create_entity(Entity { guid: 2 }).unwrap();
    builder
        .create_relationship(Relationship::new(10, RelationshipType::Retention, 1, 2))
        .unwrap();
    assert!(
        builder
            .create_relationship(Relationship::new(10, RelationshipType::Execution, 1, 2))
            .is_err()
    );

    let model = builder.model();
    assert_eq!(model.errors().len(), 3);
    assert!(model.entity(1).unwrap().children().contains(&2));
    assert!(model.entity(1).unwrap().executions().is_empty());
}

#[test]
fn extended_attributes_render_in_key_order() {
    let mut stream = RecordStream::new(10);
    stream.label(NAME_LABEL, "name").label(TYPE_LABEL, "type").entity(3);
    let guid_key = stream.fresh_label("zGuid");
    let value = stream.fresh_label("0xbeef");
    let conv = stream.fresh_label("conv");
    stream.attribute(3, value, guid_key).attribute(3, conv, NAME_LABEL);

    let model = build(stream.into_records());
    assert!(!model.has_errors(), "{:?}", model.errors());
    assert_eq!(model.entity(3).unwrap().attribute("zGuid"), Some("0xbeef"));
    assert_eq!(model.describe(), vec!["Entity [3] name = conv zGuid = 0xbeef"]);
}

#[test]
fn data_links_are_accepted_without_effect() {
    let mut builder = TimelineModelBuilder::new();
    builder.create_entity(Entity { guid: 1 }).unwrap();
    builder
        .create_relationship(Relationship::new(2, RelationshipType::DataLink, 1, 77))
        .unwrap();

    assert!(!builder.model().has_errors());
    assert_eq!(builder.model().describe(), vec!["Entity [1]"]);
}

#[test]
fn name_link_on_event_class_renames_it() {
    let mut stream = RecordStream::new(10);
    stream.label(NAME_LABEL, "name").label(20, "raw").event_class(30, 20).entity(1);
    let renamed = stream.fresh_label("renamed");
    stream.attribute(30, renamed, NAME_LABEL).event(40, 1, 30);

    let model = build(stream.into_records());
    assert!(!model.has_errors(), "{:?}", model.errors());
    assert_eq!(model.describe(), vec!["Entity [1]", "   event: [40] class [renamed]"]);
}

#[test]
fn type_link_on_event_class_is_malformed() {
    let mut stream = RecordStream::new(10);
    stream.label(TYPE_LABEL, "type").label(20, "raw").event_class(30, 20);
    let value = stream.fresh_label("layer");
    stream.attribute(30, value, TYPE_LABEL);

    let model = build(stream.into_records());
    assert_eq!(model.errors().len(), 1);
}

#[test]
fn json_export_mirrors_description() {
    let model = build(network_timeline());
    let json = model.to_json();

    let entities = json["entities"].as_array().unwrap();
    assert_eq!(entities.len(), 11);
    assert_eq!(entities[0]["attributes"]["name"], "input");
    assert_eq!(entities[0]["connections"][0]["to"], 1);
    assert_eq!(json["inferences"][0], INFERENCE_GUID);

    let inference = entities.iter().find(|entity| entity["guid"] == INFERENCE_GUID).unwrap();
    assert_eq!(inference["events"][1]["class"], "end_of_life");
    assert_eq!(inference["children"].as_array().unwrap().len(), 3);
    assert!(json["errors"].as_array().unwrap().is_empty());
}

#[test]
fn synthetic_timeline_builds_cleanly() {
    let model = build(synthetic_timeline(16));
    assert!(!model.has_errors(), "{:?}", model.errors());
    assert_eq!(model.entity(1 << 32).unwrap().children().len(), 16);
    assert_eq!(model.entity(INFERENCE_GUID).unwrap().children().len(), 16);
    assert_eq!(model.entity(110).unwrap().connections().len(), 1);
}

#[test]
fn packet_handler_feeds_shared_builder() {
    let builder = Arc::new(Mutex::new(TimelineModelBuilder::new()));
    let handler = Arc::new(TimelinePacketHandler::new(4_194_304, Arc::clone(&builder)));

    let registry = CommandHandlerRegistry::new();
    registry.register(handler.clone());

    let records = network_timeline();
    let (first, second) = records.split_at(records.len() / 2);
    for chunk in [first, second] {
        let buffer = encode_packet(chunk).unwrap();
        let packet = buffer.as_packet().unwrap();
        assert_eq!(packet.packet_id(), TIMELINE_MESSAGE_PACKET_ID);
        registry.get_handler(packet.packet_id(), 4_194_304).unwrap().handle(&packet).unwrap();
    }

    assert_eq!(handler.builder().model().describe(), NETWORK_DESCRIPTION);
}

#[test]
fn packet_handler_rejects_other_families() {
    let handler = TimelinePacketHandler::new(1, Arc::new(Mutex::new(TimelineModelBuilder::new())));
    let packet = Packet::new(Packet::header_for(0, TIMELINE_MESSAGE_PACKET_ID), 0, None).unwrap();

    assert!(matches!(handler.handle(&packet), Err(ProfilingError::Parse { .. })));
}
