//! The coordination tree: channel bundles, nodes, and the root controller

pub mod channels;
pub mod controller;
pub mod node;

pub use channels::ChannelSet;
pub use controller::initiate_controller;
pub use node::CoordinationNode;
