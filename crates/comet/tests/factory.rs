//! Construction through the module-wide factory.
//!
//! The factory slot is process-wide, so every test goes through
//! `installed()` and only asserts on its own components.

use std::sync::{Arc, OnceLock};

use comet::prelude::*;
use comet::{CreateError, FnFactory, HandleError, create_object, install_factory, installed_factory};
use comet_test_utils::{DropProbe, MockFactory, Tracker};

trait Greeter: Object {
    fn greet(&self) -> String;
}

trait Farewell: Object {}

struct English {
    refs: RefCount,
    _probe: DropProbe,
}

impl Class for English {
    fn refs(&self) -> &RefCount {
        &self.refs
    }

    fn capabilities<'a>(&'a self, query: &mut CapabilityQuery<'a>) {
        query.provide::<dyn Greeter>(self);
    }
}

impl Greeter for English {
    fn greet(&self) -> String {
        "hello".to_string()
    }
}

const CLSID_ENGLISH: ClassId = ClassId::new("greeter.english");
const CLSID_MISSING: ClassId = ClassId::new("greeter.missing");

struct Installed {
    factory: Arc<MockFactory>,
    tracker: Arc<Tracker>,
}

fn installed() -> &'static Installed {
    static INSTALLED: OnceLock<Installed> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        comet_core::logging::init();

        let tracker = Tracker::new();
        let probes = tracker.clone();
        let factory = Arc::new(MockFactory::new().with_class(CLSID_ENGLISH, move || English {
            refs: RefCount::new(),
            _probe: probes.probe("english"),
        }));
        assert!(install_factory(Arc::clone(&factory)));
        Installed { factory, tracker }
    })
}

#[test]
fn test_typed_handle_from_installed_factory() {
    let installed = installed();

    let greeter = TypedHandle::<dyn Greeter>::from_class(&CLSID_ENGLISH);
    assert_eq!(greeter.greet(), "hello");
    assert_eq!(greeter.ref_count(), 1);
    assert!(installed.tracker.live() >= 1);

    let farewell = TypedHandle::<dyn Farewell>::from_class(&CLSID_ENGLISH);
    assert!(farewell.is_null());
    assert!(installed.factory.count_creates() >= 2);
}

#[test]
fn test_untyped_create_through_installed_factory() {
    installed();

    let mut object = UntypedHandle::null();
    object.create(&CLSID_ENGLISH).unwrap();
    assert_eq!(object.ref_count(), 1);

    let err = object.create(&CLSID_MISSING).unwrap_err();
    assert!(matches!(
        err,
        HandleError::Creation(CreateError::UnknownClass { class }) if class == CLSID_MISSING
    ));
    assert!(object.is_null());
}

#[test]
fn test_create_object_returns_one_reference() {
    installed();

    let instance = create_object(&CLSID_ENGLISH).unwrap();
    assert_eq!(instance.object().ref_count(), 1);

    let greeter = TypedHandle::<dyn Greeter>::from_instance(instance).unwrap();
    assert_eq!(greeter.ref_count(), 1);
}

#[test]
fn test_second_install_is_rejected() {
    let installed = installed();

    let replacement = FnFactory::new("replacement", |_| None);
    assert!(!install_factory(replacement));
    assert_eq!(
        installed_factory().map(|factory| factory.name()),
        Some("MockFactory")
    );
    assert_eq!(installed.factory.name(), "MockFactory");
}
