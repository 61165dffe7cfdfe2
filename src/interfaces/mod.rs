//! Edges of the bridge: the JSON wire format and the CSV inputs of the CLI.

pub mod csv;
pub mod wire;
