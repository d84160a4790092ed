//! Wire protocol: message records and the terminator-delimited framer.

mod framer;
mod message;


pub(crate) use framer::Framer;
pub(crate) use message::{
    Action, LogEntryOut, MessageHeader, ReadQuery, StatRecord, TruncateDirective, WriteEntry,
};
