//! Event bus adapters.
//!
//! - `InMemoryEventBus` - synchronous, in-process audit bus

mod in_memory;

pub use in_memory::InMemoryEventBus;
