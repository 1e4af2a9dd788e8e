// # State
//
// In-process state owned by the poll loop. Nothing here is persisted.

pub mod observed;

pub use observed::{Observation, ObservedIp};
