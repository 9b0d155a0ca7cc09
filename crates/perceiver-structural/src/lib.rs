//! Structural view of a page: a lenient markup parser, CSS/XPath evaluation over
//! the parsed tree, an element catalog for healing, and the [`DocumentPort`]
//! abstraction the resolver queries through.

pub mod analyzer;
pub mod errors;
pub mod markup;
pub mod model;
pub mod ports;
pub mod query;
pub mod snapshot;

pub use analyzer::{MarkupAnalyzer, PageAnalyzer};
pub use errors::PerceiverError;
pub use markup::parse_markup;
pub use model::{
    DiscoveredElement, DomNode, DomTree, ElementCategory, ElementHandle, Locator, PageCatalog,
    QueryMode,
};
pub use ports::DocumentPort;
pub use snapshot::PageSnapshot;
