pub mod postgres;
pub mod store;

pub use postgres::create_pool;
pub use postgres::PgStore;
pub use store::{FavoritesStore, MovieUpsert, NewFavorite, ProgressStore};
