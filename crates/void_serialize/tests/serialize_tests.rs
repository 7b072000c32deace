//! Integration tests for void_serialize
//!
//! Round trips through the binary stream, polymorphic pointers, the
//! type-safety gate on tags and stream recovery after failures

mod common;

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::Ordering;

use common::*;
use void_reflect::{type_name_hash, AssertMode, EntityManager, EntityPtr, ReflectError};
use void_serialize::prelude::*;
use void_serialize::{from_bytes, to_bytes};

fn reader(bytes: &[u8]) -> BinaryReader<'_> {
    BinaryReader::new(bytes, StreamConfig::default())
}

fn sample_catalog() -> Catalog {
    Catalog {
        ids: vec![3, 1, 4, 1, 5],
        queue: VecDeque::from([-1, 1]),
        slots: [10, 20, 30],
        tags: BTreeSet::from(["hero".to_string(), "npc".to_string()]),
        names: BTreeMap::from([("alpha".to_string(), -7), ("beta".to_string(), 1_000_000)]),
        weights: (0..3u32).map(|i| (i, i as f32 * 0.25)).collect(),
        mode: Mode::Flicker,
        cached: 2.5,
    }
}

#[test]
fn test_vector_round_trip_is_exact() {
    let db = registry();

    let original = Vector3f { x: 1.5, y: 2.0, z: 3.0 };
    let bytes = to_bytes(&db, &original).unwrap();
    assert_eq!(*from_bytes::<Vector3f>(&db, &bytes).unwrap(), original);

    let precise = Vector3f { x: 1.2345, y: -0.1, z: f32::MAX };
    let bytes = to_bytes(&db, &precise).unwrap();
    assert_eq!(*from_bytes::<Vector3f>(&db, &bytes).unwrap(), precise);
}

#[test]
fn test_map_of_floats_round_trip() {
    let db = registry();

    let catalog = Catalog {
        weights: (0..5u32).map(|i| (i, i as f32 * 0.5)).collect(),
        ..Default::default()
    };
    let bytes = to_bytes(&db, &catalog).unwrap();
    let loaded = from_bytes::<Catalog>(&db, &bytes).unwrap();

    assert_eq!(loaded.weights.len(), 5);
    for i in 0..5u32 {
        assert_eq!(loaded.weights[&i], i as f32 * 0.5);
    }
}

#[test]
fn test_container_fidelity() {
    let db = registry();

    let catalog = sample_catalog();
    let bytes = to_bytes(&db, &catalog).unwrap();
    let loaded = from_bytes::<Catalog>(&db, &bytes).unwrap();

    // Transient fields come back at their defaults
    let expected = Catalog {
        cached: 0.0,
        ..sample_catalog()
    };
    assert_eq!(*loaded, expected);
}

#[test]
fn test_deserialise_into_resets_containers() {
    let db = registry();
    let bytes = to_bytes(&db, &sample_catalog()).unwrap();

    let mut target = Catalog {
        ids: vec![99, 98],
        weights: HashMap::from([(42, 1.0)]),
        cached: 8.0,
        ..Default::default()
    };
    let mut deserialiser = Deserialiser::new(&db, reader(&bytes));
    deserialiser.deserialise_into(&mut target).unwrap();

    assert_eq!(target.ids, vec![3, 1, 4, 1, 5]);
    assert!(!target.weights.contains_key(&42));
    assert_eq!(target.cached, 8.0);
    assert!(deserialiser.is_stream_ended());
}

#[test]
fn test_polymorphic_pointer_round_trip() {
    let db = registry();

    let holder = Holder {
        item: EntityPtr::new(Derived {
            base: Base { id: 12, ..Default::default() },
            position: Vector3f { x: 0.5, y: 0.0, z: -4.0 },
            label: "crate".into(),
        }),
        spare: Some(Box::new(Vector3f { x: 1.0, y: 1.0, z: 1.0 })),
    };
    let bytes = to_bytes(&db, &holder).unwrap();
    let loaded = from_bytes::<Holder>(&db, &bytes).unwrap();

    let item = loaded.item.get().unwrap();
    let derived_key = db.key_of::<Derived>().unwrap();
    assert_eq!(item.entity_type(), Some(derived_key));
    assert!(db.get_by_key(derived_key).unwrap().is_type(&db, "Base"));

    let derived = loaded.item.downcast_ref::<Derived>().unwrap();
    assert_eq!(derived.base.id, 12);
    assert_eq!(derived.position, Vector3f { x: 0.5, y: 0.0, z: -4.0 });
    assert_eq!(derived.label, "crate");
    assert_eq!(loaded.spare.as_deref(), Some(&Vector3f { x: 1.0, y: 1.0, z: 1.0 }));
}

#[test]
fn test_null_pointers_round_trip() {
    let db = registry();

    let bytes = to_bytes(&db, &Holder::default()).unwrap();
    let loaded = from_bytes::<Holder>(&db, &bytes).unwrap();
    assert!(loaded.item.is_null());
    assert!(loaded.spare.is_none());
}

#[test]
fn test_entity_round_trip_through_base() {
    let db = registry();
    let manager = EntityManager::new(&db);
    let derived_key = db.key_of::<Derived>().unwrap();

    let mut entity = manager.create(derived_key).unwrap().into_entity().unwrap();
    entity.downcast_mut::<Derived>().unwrap().label = "spawned".into();

    let mut serialiser = Serialiser::new(&db, BinaryWriter::default());
    serialiser.serialise_entity(&*entity).unwrap();
    let bytes = serialiser.into_protocol().into_bytes();

    let mut deserialiser = Deserialiser::new(&db, reader(&bytes));
    let loaded = deserialiser.deserialise_entity::<Base>().unwrap();
    assert_eq!(loaded.entity_type(), Some(derived_key));
    assert_eq!(loaded.downcast_ref::<Derived>().unwrap().label, "spawned");
}

#[test]
fn test_foreign_tag_is_rejected_before_construction() {
    let db = registry();

    let holder = Holder {
        item: EntityPtr::new(Derived::default()),
        spare: None,
    };
    let mut bytes = to_bytes(&db, &holder).unwrap();

    let derived = type_name_hash("Derived").to_le_bytes();
    let at = bytes
        .windows(4)
        .position(|window| window == derived.as_slice())
        .unwrap();
    bytes[at..at + 4].copy_from_slice(&type_name_hash("Unrelated").to_le_bytes());

    let built = UNRELATED_BUILT.load(Ordering::SeqCst);
    let mut deserialiser = Deserialiser::new(&db, reader(&bytes));
    let err = deserialiser.deserialise_as::<Holder>().unwrap_err();

    assert_eq!(
        err,
        SerialError::TypeConfusion {
            declared: "Base".into(),
            actual: "Unrelated".into()
        }
    );
    assert_eq!(UNRELATED_BUILT.load(Ordering::SeqCst), built);
    assert_eq!(deserialiser.protocol().position(), 0);
}

#[test]
fn test_top_level_type_checked() {
    let db = registry();
    let bytes = to_bytes(&db, &Vector3f::default()).unwrap();

    let mut deserialiser = Deserialiser::new(&db, reader(&bytes));
    assert!(matches!(
        deserialiser.deserialise_entity::<Base>(),
        Err(SerialError::TypeConfusion { .. })
    ));
    assert_eq!(deserialiser.protocol().position(), 0);

    let (key, instance) = deserialiser.deserialise().unwrap();
    assert_eq!(Some(key), db.key_of::<Vector3f>());
    assert_eq!(instance.downcast_ref::<Vector3f>(), Some(&Vector3f::default()));
}

#[test]
fn test_stream_end_detection() {
    let db = registry();

    let mut serialiser = Serialiser::new(&db, BinaryWriter::default());
    serialiser.serialise(&Vector3f { x: 1.0, y: 2.0, z: 3.0 }).unwrap();
    serialiser.serialise(&sample_catalog()).unwrap();
    let bytes = serialiser.into_protocol().into_bytes();

    let mut deserialiser = Deserialiser::new(&db, reader(&bytes));
    assert!(!deserialiser.is_stream_ended());
    let (first, _) = deserialiser.deserialise().unwrap();
    assert_eq!(Some(first), db.key_of::<Vector3f>());

    assert!(!deserialiser.is_stream_ended());
    let (second, _) = deserialiser.deserialise().unwrap();
    assert_eq!(Some(second), db.key_of::<Catalog>());
    assert!(deserialiser.is_stream_ended());
}

#[test]
fn test_path_traversal() {
    let db = registry();

    let mut serialiser = Serialiser::new(&db, BinaryWriter::default());
    serialiser.serialise_at("level/props", &Vector3f { x: 2.0, y: 0.0, z: 0.0 }).unwrap();
    let bytes = serialiser.into_protocol().into_bytes();
    assert!(bytes.starts_with(b"level\0props\0"));

    let mut deserialiser = Deserialiser::new(&db, reader(&bytes));
    let err = deserialiser.deserialise_at("level/actors").unwrap_err();
    assert_eq!(
        err,
        SerialError::PathMismatch {
            expected: "actors".into(),
            found: "props".into()
        }
    );
    assert_eq!(deserialiser.protocol().position(), 0);

    let (_, instance) = deserialiser.deserialise_at("/level/props/").unwrap();
    assert_eq!(instance.downcast_ref::<Vector3f>().map(|v| v.x), Some(2.0));
    assert!(deserialiser.is_stream_ended());
}

#[test]
fn test_enum_names_on_the_wire() {
    let db = registry();

    let bytes = to_bytes(&db, &Mode::On).unwrap();
    assert_eq!(&bytes[..4], &type_name_hash("Mode").to_le_bytes());
    assert_eq!(&bytes[4..], b"\x01On\0");

    // Names at least as long as the raw form fall back to it
    let bytes = to_bytes(&db, &Mode::Flicker).unwrap();
    assert_eq!(bytes[4], 0);
    assert_eq!(&bytes[5..], &2i32.to_ne_bytes());
    assert_eq!(*from_bytes::<Mode>(&db, &bytes).unwrap(), Mode::Flicker);
}

#[test]
fn test_lifecycle_options() {
    let db = registry();

    let vault = Vault {
        locked: Locked { value: 7, ..Default::default() },
        secret: Secret { code: 1234, ..Default::default() },
        sparse: Sparse { value: 5, ..Default::default() },
        tail: 99,
    };
    let bytes = to_bytes(&db, &vault).unwrap();
    let loaded = from_bytes::<Vault>(&db, &bytes).unwrap();

    // Skipped on read: bytes consumed, target untouched
    assert_eq!(loaded.locked.value, 0);
    assert!(!loaded.locked.changed);
    // Skipped on write: a default stood in
    assert_eq!(loaded.secret.code, 0);
    assert_eq!(loaded.sparse.value, 0);
    assert_eq!(loaded.tail, 99);
}

#[test]
fn test_skipped_and_fieldless_writes() {
    let db = registry();

    let bytes = to_bytes(&db, &Secret { code: 1234, ..Default::default() }).unwrap();
    assert_eq!(&bytes[4..], b"\x010\0");

    let bytes = to_bytes(&db, &Sparse { value: 5, ..Default::default() }).unwrap();
    assert_eq!(bytes.len(), 4);
}

#[test]
fn test_truncated_stream_rewinds() {
    let db = registry();

    let mut bytes = to_bytes(&db, &Vector3f { x: 1.5, y: 2.0, z: 3.0 }).unwrap();
    bytes.pop();

    let mut deserialiser = Deserialiser::new(&db, reader(&bytes));
    assert!(matches!(
        deserialiser.deserialise(),
        Err(SerialError::Malformed { .. })
    ));
    assert_eq!(deserialiser.protocol().position(), 0);
}

#[test]
fn test_unknown_and_null_tags() {
    let db = registry();

    let unknown = 0xDEAD_BEEFu32.to_le_bytes();
    let mut deserialiser = Deserialiser::new(&db, reader(&unknown));
    assert_eq!(
        deserialiser.deserialise().unwrap_err(),
        SerialError::UnknownTypeHash(0xDEAD_BEEF)
    );

    let null = [0u8; 4];
    let mut deserialiser = Deserialiser::new(&db, reader(&null));
    assert!(matches!(
        deserialiser.deserialise(),
        Err(SerialError::NullValue(_))
    ));
}

#[test]
fn test_untagged_stream() {
    let db = registry();
    let config = StreamConfig::untagged();

    let holder = Holder {
        item: EntityPtr::new(Base { id: 9, ..Default::default() }),
        spare: Some(Box::new(Vector3f { x: 0.5, y: 0.5, z: 0.5 })),
    };
    let mut serialiser = Serialiser::new(&db, BinaryWriter::new(config.clone()));
    serialiser.serialise(&holder).unwrap();
    let bytes = serialiser.into_protocol().into_bytes();
    assert!(!bytes
        .windows(4)
        .any(|window| window == type_name_hash("Base").to_le_bytes().as_slice()));

    let mut deserialiser = Deserialiser::new(&db, BinaryReader::new(&bytes, config.clone()));
    let loaded = deserialiser.deserialise_as::<Holder>().unwrap();
    assert_eq!(loaded.item.downcast_ref::<Base>().map(|b| b.id), Some(9));
    assert_eq!(loaded.spare.map(|v| v.x), Some(0.5));

    // Without tags there is no way to name the type of the next object
    let mut deserialiser = Deserialiser::new(&db, BinaryReader::new(&bytes, config.clone()));
    assert!(matches!(
        deserialiser.deserialise(),
        Err(SerialError::Reflect(ReflectError::Assertion(_)))
    ));

    // Nor a derived pointee, nor a null one
    let derived = Holder {
        item: EntityPtr::new(Derived::default()),
        spare: None,
    };
    let mut serialiser = Serialiser::new(&db, BinaryWriter::new(config.clone()));
    assert!(matches!(
        serialiser.serialise(&derived),
        Err(SerialError::TypeConfusion { .. })
    ));
    let mut serialiser = Serialiser::new(&db, BinaryWriter::new(config));
    assert!(matches!(
        serialiser.serialise(&Holder::default()),
        Err(SerialError::NullValue(_))
    ));
}

#[test]
fn test_stream_config_from_json() {
    let config = StreamConfig {
        type_tags: false,
        assert_mode: AssertMode::Disabled,
        max_container_len: 64,
        max_string_len: 128,
    };
    let json = serde_json::to_string(&config).unwrap();
    let parsed: StreamConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);

    let partial: StreamConfig = serde_json::from_str(r#"{ "max_string_len": 16 }"#).unwrap();
    assert_eq!(
        partial,
        StreamConfig {
            max_string_len: 16,
            ..StreamConfig::default()
        }
    );
}

#[test]
fn test_oversized_container_rejected() {
    let db = registry();

    let mut bytes = to_bytes(&db, &sample_catalog()).unwrap();
    let config = StreamConfig {
        max_container_len: 2,
        ..StreamConfig::default()
    };
    let mut deserialiser = Deserialiser::new(&db, BinaryReader::new(&bytes, config));
    assert!(matches!(
        deserialiser.deserialise_as::<Catalog>(),
        Err(SerialError::LimitExceeded { what: "container", .. })
    ));

    // A fixed array cannot take more elements than it has slots
    let slots_header = 3u32.to_le_bytes();
    let at = bytes
        .windows(4)
        .position(|window| window == slots_header.as_slice())
        .unwrap();
    bytes[at..at + 4].copy_from_slice(&4u32.to_le_bytes());
    let mut deserialiser = Deserialiser::new(&db, reader(&bytes));
    assert_eq!(
        deserialiser.deserialise_as::<Catalog>().unwrap_err(),
        SerialError::Reflect(ReflectError::CapacityExceeded { capacity: 3 })
    );
    assert_eq!(deserialiser.protocol().position(), 0);
}

#[test]
fn test_nul_char_round_trip() {
    let db = registry();

    let glyph = Glyph {
        c: '\0',
        list: vec!['a', '\0', 'z'],
    };
    let bytes = to_bytes(&db, &glyph).unwrap();
    assert_eq!(*from_bytes::<Glyph>(&db, &bytes).unwrap(), glyph);
}

#[test]
fn test_pointers_inside_containers() {
    let db = registry();

    let stage = Stage {
        items: vec![
            EntityPtr::new(Derived {
                label: "x".into(),
                ..Default::default()
            }),
            EntityPtr::null(),
            EntityPtr::new(Base { id: 3, ..Default::default() }),
        ],
        by_slot: BTreeMap::from([
            (1, EntityPtr::new(Derived::default())),
            (2, EntityPtr::null()),
        ]),
        ..Default::default()
    };
    let bytes = to_bytes(&db, &stage).unwrap();
    let loaded = from_bytes::<Stage>(&db, &bytes).unwrap();

    assert_eq!(loaded.items.len(), 3);
    assert_eq!(loaded.items[0].downcast_ref::<Derived>().map(|d| d.label.as_str()), Some("x"));
    assert_eq!(loaded.items[0].get().unwrap().entity_type(), db.key_of::<Derived>());
    assert!(loaded.items[1].is_null());
    assert_eq!(loaded.items[2].downcast_ref::<Base>().map(|b| b.id), Some(3));
    assert!(loaded.items[2].downcast_ref::<Derived>().is_none());

    assert_eq!(loaded.by_slot.len(), 2);
    assert!(loaded.by_slot[&1].downcast_ref::<Derived>().is_some());
    assert!(loaded.by_slot[&2].is_null());
}

#[test]
fn test_skipped_elements_keep_stream_in_step() {
    let db = registry();

    let stage = Stage {
        locks: vec![Locked { value: 5, ..Default::default() }, Locked::default()],
        tail: 77,
        ..Default::default()
    };
    let bytes = to_bytes(&db, &stage).unwrap();
    let loaded = from_bytes::<Stage>(&db, &bytes).unwrap();

    assert_eq!(loaded.locks.len(), 2);
    assert!(loaded.locks.iter().all(|lock| lock.value == 0 && !lock.changed));
    assert_eq!(loaded.tail, 77);
}

#[test]
fn test_duplicate_map_keys_keep_first_value() {
    let db = registry();

    let catalog = Catalog {
        names: BTreeMap::from([("aa".to_string(), 1), ("ab".to_string(), 2)]),
        ..Default::default()
    };
    let mut bytes = to_bytes(&db, &catalog).unwrap();

    let second_key = [2, 0, 0, 0, b'a', b'b'];
    let at = bytes
        .windows(second_key.len())
        .position(|window| window == second_key.as_slice())
        .unwrap();
    bytes[at + 5] = b'a';

    let loaded = from_bytes::<Catalog>(&db, &bytes).unwrap();
    assert_eq!(loaded.names, BTreeMap::from([("aa".to_string(), 1)]));
}
