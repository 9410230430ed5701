//! Compose chains of natural-language data filters into a single query.
//!
//! Users describe a transform in words; a [`Translator`] turns it into a query
//! fragment reading from `{parent}`. Steps form a tree over the base dataset
//! and any root-to-node chain is linearized into one `WITH` query by
//! [`compose`], then filtered, sorted and paged for display.

pub mod compose;
pub mod dataset;
pub mod engine;
pub mod explorer;
pub mod node;
pub mod output;
pub mod persist;
pub mod shape;
pub mod store;
pub mod translate;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use compose::{Direction, Employment, FilterSet, Pagination, QueryPair, SortSpec};
pub use engine::{Engine, EngineError, SqliteEngine};
pub use explorer::{Draft, DraftTarget, Explorer, ExplorerConfig, ExplorerError, Proposal};
pub use node::{Node, NodeId, Tree};
pub use output::{rows_to_json, rows_to_json_pretty};
pub use persist::{BlobStore, FileStore, MemoryStore};
pub use shape::{Column, ColumnType, Shape};
pub use store::{LimitExceeded, Limits, NodeStore};
pub use translate::{ResponseTranslator, TranslateError, Translation, Translator};
pub use value::{Row, Value};
