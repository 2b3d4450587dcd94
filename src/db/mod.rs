pub mod cache;
pub mod semantic;

pub use cache::create_redis_client;
pub use cache::{cache_get, cache_set, normalize};
pub use cache::{CacheKey, MemoryCache, NoopCache, RedisCache, ResultCache};
pub use semantic::{Embedder, GeminiEmbedder, ResetSchedule, SemanticCache};
