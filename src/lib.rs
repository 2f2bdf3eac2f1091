pub mod config;
pub mod crawler;
pub mod error;
pub mod extractor;
pub mod logger;
pub mod novel;
pub mod reconcile;
pub mod utils;

pub use config::Settings;
pub use crawler::{Event, NovelCrawler};
pub use error::Error;
pub use novel::{Catalogue, Chapter, NovelInfo, TextWriter};
pub use reconcile::Reconciler;
pub use utils::{NovelRequest, display_elapsed_time, get_user_input};
