//! Capabilities Example - narrowing handles between component views
//!
//! A plugin-style module installs a factory, creates a component by class id,
//! then asks the same component for other capabilities. Every reference
//! operation is logged at trace level.
//!
//! Run with: cargo run --example capabilities

use comet::prelude::*;
use comet::{FnFactory, install_factory};
use comet_core::config::{Config, RefcountLogging};

trait Render: Object {
    fn draw(&self) -> String;
}

trait Input: Object {
    fn poll(&self) -> usize;
}

trait Audio: Object {}

struct Sprite {
    refs: RefCount,
    name: &'static str,
}

impl Class for Sprite {
    fn refs(&self) -> &RefCount {
        &self.refs
    }

    fn capabilities<'a>(&'a self, query: &mut CapabilityQuery<'a>) {
        query.provide::<dyn Render>(self).provide::<dyn Input>(self);
    }
}

impl Render for Sprite {
    fn draw(&self) -> String {
        format!("drawing {}", self.name)
    }
}

impl Input for Sprite {
    fn poll(&self) -> usize {
        0
    }
}

const CLSID_SPRITE: ClassId = ClassId::new("example.sprite");

fn main() {
    comet_core::logging::init_with(&Config {
        refcount_logging: RefcountLogging::All,
        ..Default::default()
    });
    comet_core::module::set_module_name("capabilities-example");

    install_factory(FnFactory::new("sprites", |class| {
        (*class == CLSID_SPRITE).then(|| {
            Instance::new(Sprite {
                refs: RefCount::new(),
                name: "player",
            })
        })
    }));

    let renderer = TypedHandle::<dyn Render>::from_class(&CLSID_SPRITE);
    tracing::info!("{} (refs = {})", renderer.draw(), renderer.ref_count());

    let input = TypedHandle::<dyn Input>::narrow(&renderer);
    tracing::info!(pending = input.poll(), refs = renderer.ref_count(), "narrowed to Input");

    let audio = TypedHandle::<dyn Audio>::narrow(&renderer);
    tracing::info!(null = audio.is_null(), refs = renderer.ref_count(), "narrowed to Audio");

    let stored: Vec<UntypedHandle> = vec![renderer.to_untyped(), input.to_untyped()];
    tracing::info!(
        same = stored[0] == stored[1],
        refs = renderer.ref_count(),
        "stored untyped handles"
    );

    drop(stored);
    drop(input);
    drop(renderer);
    tracing::info!("component destroyed");
}
