//! Participant adapters built on the coordination contract

pub mod store;

pub use store::{RecordStore, StoreResponse, TwoPhaseParticipant};
