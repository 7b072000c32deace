//! Shared fixtures for the serialisation suites

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use void_reflect::*;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Vector3f {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Member for Vector3f {}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Off,
    On,
    Flicker,
}

impl Member for Mode {}

impl ReflectEnum for Mode {
    fn to_i64(self) -> i64 {
        self as i64
    }

    fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Mode::Off),
            1 => Some(Mode::On),
            2 => Some(Mode::Flicker),
            _ => None,
        }
    }
}

macro_rules! entity_core {
    ($($path:ident).+) => {
        fn core(&self) -> &EntityCore {
            &self.$($path).+
        }

        fn core_mut(&mut self) -> &mut EntityCore {
            &mut self.$($path).+
        }
    };
}

#[derive(Debug, Default)]
pub struct Base {
    pub core: EntityCore,
    pub id: u32,
}

impl Entity for Base {
    entity_core!(core);
}

impl Member for Base {}

#[derive(Debug, Default)]
pub struct Derived {
    pub base: Base,
    pub position: Vector3f,
    pub label: String,
}

impl Entity for Derived {
    entity_core!(base.core);
}

impl Member for Derived {}

/// Counts how many `Unrelated` values have ever been built
pub static UNRELATED_BUILT: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug)]
pub struct Unrelated {
    pub core: EntityCore,
}

impl Default for Unrelated {
    fn default() -> Self {
        UNRELATED_BUILT.fetch_add(1, Ordering::SeqCst);
        Self {
            core: EntityCore::new(),
        }
    }
}

impl Entity for Unrelated {
    entity_core!(core);
}

impl Member for Unrelated {}

#[derive(Debug, Default)]
pub struct Holder {
    pub item: EntityPtr<Base>,
    pub spare: Option<Box<Vector3f>>,
}

impl Member for Holder {}

#[derive(Debug, Default, PartialEq)]
pub struct Catalog {
    pub ids: Vec<u32>,
    pub queue: VecDeque<i8>,
    pub slots: [u16; 3],
    pub tags: BTreeSet<String>,
    pub names: BTreeMap<String, i32>,
    pub weights: HashMap<u32, f32>,
    pub mode: Mode,
    pub cached: f64,
}

impl Member for Catalog {}

/// Entity that refuses to be overwritten by a load
#[derive(Debug, Default)]
pub struct Locked {
    pub core: EntityCore,
    pub value: i32,
    pub changed: bool,
}

impl Entity for Locked {
    entity_core!(core);

    fn on_pre_changed(&mut self) -> Options {
        Options::Skip
    }

    fn on_changed(&mut self) {
        self.changed = true;
    }
}

impl Member for Locked {}

/// Entity that is never written out
#[derive(Debug, Default)]
pub struct Secret {
    pub core: EntityCore,
    pub code: u32,
}

impl Entity for Secret {
    entity_core!(core);

    fn on_pre_saved(&self) -> Options {
        Options::Skip
    }
}

impl Member for Secret {}

/// Entity whose fields are left out in both directions
#[derive(Debug, Default)]
pub struct Sparse {
    pub core: EntityCore,
    pub value: u32,
}

impl Entity for Sparse {
    entity_core!(core);

    fn on_pre_saved(&self) -> Options {
        Options::IgnoreFields
    }

    fn on_pre_changed(&mut self) -> Options {
        Options::IgnoreFields
    }
}

impl Member for Sparse {}

#[derive(Debug, Default)]
pub struct Vault {
    pub locked: Locked,
    pub secret: Secret,
    pub sparse: Sparse,
    pub tail: u32,
}

impl Member for Vault {}

#[derive(Debug, Default, PartialEq)]
pub struct Glyph {
    pub c: char,
    pub list: Vec<char>,
}

impl Member for Glyph {}

/// Polymorphic and hook-bearing elements inside containers
#[derive(Debug, Default)]
pub struct Stage {
    pub items: Vec<EntityPtr<Base>>,
    pub by_slot: BTreeMap<u32, EntityPtr<Base>>,
    pub locks: Vec<Locked>,
    pub tail: u32,
}

impl Member for Stage {}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A registry holding every fixture type
pub fn registry() -> TypeDb {
    init_logging();

    let mut db = TypeDb::with_builtins().expect("bootstrap");
    db.create::<Vector3f>("Vector3f")
        .unwrap()
        .field("x", |v| &v.x, |v| &mut v.x)
        .field("y", |v| &v.y, |v| &mut v.y)
        .field("z", |v| &v.z, |v| &mut v.z);
    db.create_enum::<Mode>("Mode")
        .unwrap()
        .constant("Off", Mode::Off)
        .constant("On", Mode::On)
        .constant("Flicker", Mode::Flicker);

    db.create_entity::<Base>("Base")
        .unwrap()
        .field("id", |b| &b.id, |b| &mut b.id);
    db.create_entity::<Derived>("Derived")
        .unwrap()
        .base::<Base>(|d| &d.base, |d| &mut d.base)
        .field("position", |d| &d.position, |d| &mut d.position)
        .field("label", |d| &d.label, |d| &mut d.label);
    db.create_entity::<Unrelated>("Unrelated").unwrap();
    db.create::<Holder>("Holder")
        .unwrap()
        .field("item", |h| &h.item, |h| &mut h.item)
        .field("spare", |h| &h.spare, |h| &mut h.spare);

    db.create::<Catalog>("Catalog")
        .unwrap()
        .field("ids", |c| &c.ids, |c| &mut c.ids)
        .field("queue", |c| &c.queue, |c| &mut c.queue)
        .field("slots", |c| &c.slots, |c| &mut c.slots)
        .field("tags", |c| &c.tags, |c| &mut c.tags)
        .field("names", |c| &c.names, |c| &mut c.names)
        .field("weights", |c| &c.weights, |c| &mut c.weights)
        .field("mode", |c| &c.mode, |c| &mut c.mode)
        .field("cached", |c| &c.cached, |c| &mut c.cached)
        .attributes(FieldAttributes::TRANSIENT);

    db.create_entity::<Locked>("Locked")
        .unwrap()
        .field("value", |l| &l.value, |l| &mut l.value);
    db.create_entity::<Secret>("Secret")
        .unwrap()
        .field("code", |s| &s.code, |s| &mut s.code);
    db.create_entity::<Sparse>("Sparse")
        .unwrap()
        .field("value", |s| &s.value, |s| &mut s.value);
    db.create::<Vault>("Vault")
        .unwrap()
        .field("locked", |v| &v.locked, |v| &mut v.locked)
        .field("secret", |v| &v.secret, |v| &mut v.secret)
        .field("sparse", |v| &v.sparse, |v| &mut v.sparse)
        .field("tail", |v| &v.tail, |v| &mut v.tail);

    db.create::<Glyph>("Glyph")
        .unwrap()
        .field("c", |g| &g.c, |g| &mut g.c)
        .field("list", |g| &g.list, |g| &mut g.list);
    db.create::<Stage>("Stage")
        .unwrap()
        .field("items", |s| &s.items, |s| &mut s.items)
        .field("by_slot", |s| &s.by_slot, |s| &mut s.by_slot)
        .field("locks", |s| &s.locks, |s| &mut s.locks)
        .field("tail", |s| &s.tail, |s| &mut s.tail);
    db
}
