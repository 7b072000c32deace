//! Integration tests for void_reflect
//!
//! Tests registration, field access through the registry, pointer members
//! and container members end to end

use std::collections::HashMap;

use void_reflect::*;

#[derive(Default)]
struct Component {
    core: EntityCore,
    enabled: bool,
}

impl Entity for Component {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }
}

impl Member for Component {}

#[derive(Default)]
struct Light {
    component: Component,
    intensity: f32,
}

impl Entity for Light {
    fn core(&self) -> &EntityCore {
        &self.component.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.component.core
    }
}

impl Member for Light {}

#[derive(Default)]
struct Scene {
    name: String,
    root: EntityPtr<Component>,
    layers: Vec<u32>,
    lookup: HashMap<String, i32>,
    cached: f64,
}

impl Member for Scene {}

fn registry() -> TypeDb {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut db = TypeDb::with_builtins().expect("bootstrap");
    db.create_entity::<Component>("Component")
        .unwrap()
        .field("enabled", |c| &c.enabled, |c| &mut c.enabled);
    db.create_entity::<Light>("Light")
        .unwrap()
        .base::<Component>(|l| &l.component, |l| &mut l.component)
        .field("intensity", |l| &l.intensity, |l| &mut l.intensity);
    db.create::<Scene>("Scene")
        .unwrap()
        .field("name", |s| &s.name, |s| &mut s.name)
        .field("root", |s| &s.root, |s| &mut s.root)
        .field("layers", |s| &s.layers, |s| &mut s.layers)
        .field("lookup", |s| &s.lookup, |s| &mut s.lookup)
        .field("cached", |s| &s.cached, |s| &mut s.cached)
        .attributes(FieldAttributes::TRANSIENT);
    db
}

#[test]
fn test_field_kinds_are_detected() {
    let db = registry();
    let scene = db.get_by_name("Scene").unwrap();

    assert!(matches!(scene.field("name").unwrap().kind(), MemberKind::Value(_)));
    assert!(scene.field("root").unwrap().is_pointer());
    assert_eq!(
        scene.field("root").unwrap().declared_type(),
        Some(TypeRef::of::<Component>())
    );

    let layers = scene.field("layers").unwrap().container().unwrap();
    assert_eq!(layers.shape(), ContainerShape::Sequence);

    let lookup = scene.field("lookup").unwrap().container().unwrap();
    assert_eq!(lookup.shape(), ContainerShape::Map);
    assert_eq!(lookup.key_type(), Some(TypeRef::of::<String>()));
    assert!(scene.field("cached").unwrap().is_transient());
}

#[test]
fn test_pointer_field_assigned_through_registry() {
    let db = registry();
    let manager = EntityManager::new(&db);
    let scene_type = db.get::<Scene>().unwrap();

    let mut scene = Scene::default();
    let root = scene_type.field("root").unwrap();
    let MemberKind::Pointer(info) = root.kind() else {
        panic!("root should be a pointer");
    };

    let light_key = db.key_of::<Light>().unwrap();
    let light = manager.create_as::<Component>(light_key).unwrap();
    let slot = info.access.slot_mut(root.get_mut(&mut scene).unwrap()).unwrap();
    slot.assign(light).unwrap();

    let target = scene.root.get().unwrap();
    assert_eq!(target.entity_type(), Some(light_key));
    assert!(db.get_by_key(light_key).unwrap().is_type(&db, "Component"));
}

#[test]
fn test_container_field_walk() {
    let db = registry();
    let scene_type = db.get::<Scene>().unwrap();
    let layers = scene_type.field("layers").unwrap();
    let container = layers.container().unwrap();

    let mut scene = Scene {
        layers: vec![4, 5],
        ..Default::default()
    };

    {
        let mut writer = container.write_iter(layers.get_mut(&mut scene).unwrap()).unwrap();
        writer.add(Instance::Value(Box::new(10u32))).unwrap();
        writer.add(Instance::Value(Box::new(20u32))).unwrap();
    }
    assert_eq!(scene.layers, vec![10, 20]);

    let mut cursor = container.read_iter(layers.get(&scene).unwrap()).unwrap();
    let mut sum = 0;
    while cursor.is_valid() {
        sum += cursor.value().and_then(|v| v.downcast_ref::<u32>()).unwrap();
        cursor.inc_next();
    }
    assert_eq!(sum, 30);
}

#[test]
fn test_inherited_fields_through_upcast() {
    let db = registry();
    let light_type = db.get::<Light>().unwrap();
    let fields = light_type.all_fields(&db).unwrap();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].owner().name(), "Component");

    let mut light = Light::default();
    let from = light_type.key();
    let to = fields[0].owner().key();
    let base = db.upcast_mut(&mut light, from, to).unwrap();
    fields[0]
        .field()
        .set(base, Instance::Value(Box::new(true)))
        .unwrap();
    assert!(light.component.enabled);
}

#[test]
fn test_shared_registry_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<TypeDb>();
    assert_send_sync::<SharedTypeDb>();
}
