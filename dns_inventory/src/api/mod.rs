mod api_doc;
pub use api_doc::*;

mod assets;
pub use assets::*;

mod export;
pub use export::*;

mod health;
pub use health::*;

mod read_cache;
pub use read_cache::*;

mod scheduler_jobs;
pub use scheduler_jobs::*;

mod sync;
pub use sync::*;
