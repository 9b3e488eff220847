//! Reference extraction and the per-project citation registry.

pub mod parser;
pub mod registry;
pub mod style;

pub use parser::{
    citation_drift, extract_in_text_citations, parse_references, split_reference_section,
    ChapterText, InTextCitation,
};
pub use registry::{
    CompiledReference, JsonRegistryStore, MemoryRegistryStore, MergeSummary, Reference,
    RegistryState, RegistryStore,
};
pub use style::{CitationStyle, StyleRules};
