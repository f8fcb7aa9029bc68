//! Test utilities for comet.
//!
//! This crate provides the pieces tests need to observe component lifetimes
//! from the outside:
//!
//! - [`MockFactory`] - a [`Factory`](comet::Factory) with a fixed class table
//!   that records every create call
//! - [`Tracker`] / [`DropProbe`] - records construction and destruction of
//!   components, so tests can assert that a component was destroyed exactly
//!   once
//!
//! # Example
//!
//! ```rust
//! use comet::{Class, ClassId, RefCount, UntypedHandle};
//! use comet_test_utils::{DropProbe, MockFactory, Tracker};
//!
//! struct Widget {
//!     refs: RefCount,
//!     _probe: DropProbe,
//! }
//!
//! impl Class for Widget {
//!     fn refs(&self) -> &RefCount {
//!         &self.refs
//!     }
//! }
//!
//! const CLSID_WIDGET: ClassId = ClassId::new("widget");
//!
//! let tracker = Tracker::new();
//! let probe_source = tracker.clone();
//! let factory = MockFactory::new().with_class(CLSID_WIDGET, move || Widget {
//!     refs: RefCount::new(),
//!     _probe: probe_source.probe("widget"),
//! });
//!
//! let handle = UntypedHandle::from_class_in(&factory, &CLSID_WIDGET);
//! assert_eq!(factory.count_creates(), 1);
//! assert_eq!(tracker.live(), 1);
//!
//! drop(handle);
//! assert_eq!(tracker.destroyed(), 1);
//! ```
//!
//! # Design Philosophy
//!
//! Mocks use `parking_lot::Mutex` for interior mutability so that `&self`
//! methods can record calls while the mock is shared across threads.

pub mod mock_factory;
pub mod tracker;

// Re-export main types at crate root
pub use mock_factory::*;
pub use tracker::*;
