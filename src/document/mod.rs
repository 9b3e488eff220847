//! Document assembly and the DOCX container writer.

pub mod assembler;
pub mod docx;
pub mod model;

pub use assembler::{assemble, AssemblyRequest, REFERENCES_TITLE, TABLE_OF_CONTENTS_TITLE};
pub use docx::DocxSerializer;
pub use model::{
    figure_caption, figure_fallback_text, CompiledDocument, ContentNode, EmbeddedImage, Section,
    SectionKind,
};
