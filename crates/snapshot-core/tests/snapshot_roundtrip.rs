//! Export/import idempotence through documents and files.

use crossbeam as _;
use log as _;
use proptest::prelude::*;
use rstest::rstest;
use serde as _;
use snapshot_core::{
    CacheGeometry, CacheSnapshot, ControllerConfig, CoreParameters, Delivery, DocumentError,
    LineSnapshot, QuiescePolicy, SetSnapshot, SimulatedCore, SnapshotController,
    SnapshotDocument, SnapshotError, MAX_TAG,
};
use thiserror as _;

const L1: CacheGeometry = CacheGeometry::new(1, 1);

fn parameters() -> CoreParameters {
    CoreParameters {
        rf_size: 32,
        main_mem_size: 1,
        l1i: L1,
        l1d: L1,
        l2: CacheGeometry::new(2, 1),
    }
}

fn controller(delivery: Delivery, quiesce: QuiescePolicy) -> SnapshotController<SimulatedCore> {
    let config = ControllerConfig {
        parameters: parameters(),
        quiesce,
    };
    SnapshotController::connect(config, |sink| SimulatedCore::new(sink, delivery))
        .expect("valid parameters")
}

fn empty_cache(geometry: CacheGeometry) -> CacheSnapshot {
    CacheSnapshot {
        sets: geometry.sets(),
        ways: geometry.ways(),
        data: (0..geometry.sets())
            .map(|_| SetSnapshot {
                lru: 0,
                lines: (0..geometry.ways())
                    .map(|_| LineSnapshot {
                        valid: false,
                        dirty: false,
                        tag: 0,
                        data: [0; 8],
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn scenario_cache() -> CacheSnapshot {
    let mut cache = empty_cache(L1);
    cache.data[0].lines[0] = LineSnapshot {
        valid: true,
        dirty: true,
        tag: 5,
        data: [9, 0, 0, 0, 0, 0, 0, 0],
    };
    cache
}

fn scenario() -> SnapshotDocument {
    SnapshotDocument {
        pc: 0x1000,
        register_file: (1..=31).collect(),
        main_mem: vec![[0; 8]],
        l1i: scenario_cache(),
        l1d: scenario_cache(),
        l2: empty_cache(parameters().l2),
    }
}

#[rstest]
#[case(Delivery::Inline, QuiescePolicy::CallerManaged)]
#[case(Delivery::Inline, QuiescePolicy::Automatic)]
#[case(Delivery::Worker, QuiescePolicy::CallerManaged)]
#[case(Delivery::Worker, QuiescePolicy::Automatic)]
fn concrete_scenario_survives_a_file_round_trip(
    #[case] delivery: Delivery,
    #[case] quiesce: QuiescePolicy,
) {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = dir.path().join("input.json");
    let output = dir.path().join("output.json");
    scenario().save(&input).expect("save succeeds");

    let mut controller = controller(delivery, quiesce);
    controller.load_from_path(&input).expect("import succeeds");
    controller.save_to_path(&output).expect("export succeeds");

    assert_eq!(
        std::fs::read_to_string(&output).expect("output readable"),
        std::fs::read_to_string(&input).expect("input readable")
    );
}

#[test]
fn document_layout_uses_hardware_field_names() {
    let json = scenario().to_json().expect("serializes");
    let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");

    assert_eq!(value["PC"], 4096);
    assert_eq!(value["RegisterFile"][30], 31);
    assert_eq!(value["MainMem"][0], serde_json::json!([0, 0, 0, 0, 0, 0, 0, 0]));
    assert_eq!(value["L1d"]["set"], 2);
    assert_eq!(value["L1d"]["way"], 2);
    assert_eq!(
        value["L1d"]["data"][0]["lines"][0],
        serde_json::json!({
            "valid": true,
            "dirty": true,
            "tag": 5,
            "data": [9, 0, 0, 0, 0, 0, 0, 0]
        })
    );
    assert_eq!(value["L2"]["data"].as_array().map(Vec::len), Some(4));
}

#[test]
fn short_register_file_is_rejected_with_its_field_name() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("short.json");
    let mut document = scenario();
    document.register_file.truncate(30);
    document.save(&path).expect("save succeeds");

    let mut controller = controller(Delivery::Inline, QuiescePolicy::Automatic);
    let error = controller.load_from_path(&path).expect_err("30 of 31 registers");

    assert!(matches!(
        &error,
        SnapshotError::Document(DocumentError::Length { field, expected: 31, found: 30 })
            if field == "RegisterFile"
    ));
    assert_eq!(
        controller.gate().transport().run_state(),
        snapshot_core::SimRunState::Running
    );
}

#[test]
fn truncated_file_is_a_parse_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("truncated.json");
    let json = scenario().to_json().expect("serializes");
    std::fs::write(&path, &json[..json.len() / 2]).expect("write succeeds");

    let mut controller = controller(Delivery::Inline, QuiescePolicy::CallerManaged);
    assert!(matches!(
        controller.load_from_path(&path),
        Err(SnapshotError::Document(DocumentError::Parse(_)))
    ));
}

fn line_strategy() -> impl Strategy<Value = LineSnapshot> {
    (any::<bool>(), any::<bool>(), 0..=MAX_TAG, any::<[u64; 8]>()).prop_map(
        |(valid, dirty, tag, data)| LineSnapshot {
            valid,
            dirty: valid && dirty,
            tag,
            data,
        },
    )
}

fn cache_strategy(geometry: CacheGeometry) -> impl Strategy<Value = CacheSnapshot> {
    let ways = usize::try_from(geometry.ways()).expect("small geometry");
    let sets = usize::try_from(geometry.sets()).expect("small geometry");
    let set = (any::<u64>(), prop::collection::vec(line_strategy(), ways))
        .prop_map(|(lru, lines)| SetSnapshot { lru, lines });
    prop::collection::vec(set, sets).prop_map(move |data| CacheSnapshot {
        sets: geometry.sets(),
        ways: geometry.ways(),
        data,
    })
}

fn document_strategy() -> impl Strategy<Value = SnapshotDocument> {
    let parameters = parameters();
    (
        any::<u64>(),
        prop::collection::vec(any::<u64>(), 31),
        prop::collection::vec(any::<[u64; 8]>(), 1),
        cache_strategy(parameters.l1i),
        cache_strategy(parameters.l1d),
        cache_strategy(parameters.l2),
    )
        .prop_map(|(pc, register_file, main_mem, l1i, l1d, l2)| SnapshotDocument {
            pc,
            register_file,
            main_mem,
            l1i,
            l1d,
            l2,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn export_after_import_reproduces_any_valid_document(document in document_strategy()) {
        let mut controller = controller(Delivery::Inline, QuiescePolicy::CallerManaged);
        controller.import_snapshot(&document).expect("import succeeds");
        prop_assert_eq!(controller.export_snapshot().expect("export succeeds"), document);
    }

    #[test]
    fn json_text_round_trips_any_valid_document(document in document_strategy()) {
        let json = document.to_json().expect("serializes");
        prop_assert_eq!(SnapshotDocument::from_json(&json).expect("parses"), document);
    }
}
