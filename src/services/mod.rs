pub mod metadata;
pub mod oauth;
pub mod pipeline;
pub mod posters;
pub mod providers;
pub mod watch_history;

pub use metadata::{Resolution, TitleResolver, TmdbResolver};
pub use oauth::OAuthRefreshManager;
pub use pipeline::RecommendationPipeline;
pub use posters::{PosterOverride, RpdbPosterService};
pub use providers::{KeyBasedSelector, RecommendationProvider, SelectProvider};
pub use watch_history::{TraktClient, WatchHistory};
