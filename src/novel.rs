pub mod catalogue;
pub mod chapter;
pub mod text;

pub use catalogue::Catalogue;
pub use chapter::Chapter;
pub use text::{MISSING_CONTENT, NovelInfo, TextWriter};
