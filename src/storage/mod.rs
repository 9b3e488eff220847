pub mod ai_layer;

pub use ai_layer::ChapterStore;
