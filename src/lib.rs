//! Client for the Paprika Recipe Manager cloud sync API.
//!
//! Authenticates with the vendor's cloud, lists remote recipe identifiers,
//! fetches and uploads individual recipes, and notifies the vendor's apps
//! of changes. Resolution is content-addressed: the cloud reports a hash
//! per recipe, and any `(uid, hash)` pair already in the local cache is
//! served without a network call.
//!
//! ```no_run
//! use paprika_sync::{Config, Remote};
//!
//! # async fn run() -> paprika_sync::Result<()> {
//! let remote = Remote::new(Config::new("cook@example.com", "hunter2"))?;
//! println!("{} recipes in the cloud", remote.count().await?);
//!
//! let mut recipes = remote.recipes();
//! while let Some(recipe) = recipes.next().await {
//!     println!("{}", recipe?.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod recipe;
pub mod remote;
pub mod transport;
pub mod user_agent;

pub use cache::{CachedFields, MemoryCache, NullCache, RecipeCache, SqliteCache};
pub use config::{CacheChoice, Config};
pub use error::{PaprikaError, RequestError, Result};
pub use recipe::{new_uid, RecipeIdentifier, RemoteRecipe};
pub use remote::{RecipeIter, Remote};
pub use transport::RetryPolicy;
