pub mod amount;
pub mod change;
pub mod engine;
pub mod importer;
pub mod parsers;
pub mod pipeline;
pub mod resource;
pub mod sanitizer;
pub mod settlement;
pub mod source;

pub use crate::domain::model::{
    Bill, Event, Id, ImportReport, ImportResource, NoteRecord, RawNote, SanitizeOutcome, Scope,
    SharingEntry, Table, Transfer,
};
pub use crate::domain::ports::{Alias, Condition, Pipeline, Row, Store};
pub use crate::utils::error::Result;
