pub mod assets;
pub mod favorites;
pub mod genre;
pub mod merge;
pub mod playlist;
pub mod providers;
pub mod recommendations;

pub use favorites::{FavoritesCache, FavoritesChanged, Toggled};
pub use genre::{GenreDecoder, GenreInput, GenreTable};
pub use playlist::PlaylistGenerator;
pub use providers::Backend;
pub use recommendations::{AggregatorHandle, AggregatorLimits, RecommendationAggregator};
