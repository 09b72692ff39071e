//! Agent runtimes and the cache interception hook

mod interception;
mod pipeline;
mod react;

pub use interception::CacheInterceptionHook;
pub use pipeline::QueryPipeline;
pub use react::ReactSqlAgent;
