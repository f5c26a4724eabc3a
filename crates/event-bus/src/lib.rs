//! Domain event publication.
//!
//! Services never talk to each other directly: they hand [`DomainEvent`]s to
//! an [`EventBus`] through an [`EventPublisher`], which decides per call
//! whether a delivery failure matters to the caller.

pub mod bus;
pub mod error;
pub mod event;
pub mod logging;
pub mod memory;
pub mod publisher;

pub use bus::EventBus;
pub use error::{EventBusError, Result};
pub use event::{DomainEvent, EventDetail, EventId};
pub use logging::LogEventBus;
pub use memory::InMemoryEventBus;
pub use publisher::EventPublisher;
