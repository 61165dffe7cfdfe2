use crate::domain::purchase::FinalizeKind;
use crate::error::{BridgeError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Query,
    Purchase,
    Finalize,
}

/// One scripted bridge call.
///
/// `target` holds `;`-separated product ids for `query`, a product id for
/// `purchase` and a purchase token for `finalize`. An empty `mode` lets the
/// shop item decide how to finalize.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Command {
    pub command: CommandKind,
    pub target: String,
    pub mode: Option<FinalizeKind>,
}

impl Command {
    pub fn product_ids(&self) -> Vec<String> {
        self.target
            .split(';')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Reads bridge commands from a CSV source.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and deserializes commands.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BridgeError::from))
    }
}
