//! The sync client: an authenticated façade over the remote recipe
//! collection.
//!
//! Resolution is cache-first. The cloud's sync listing reports a content
//! hash per recipe; a recipe whose `(uid, hash)` pair is already cached is
//! served locally with zero network calls, everything else is fetched once
//! and written through. Uploads recompute the hash, push the full payload,
//! then re-fetch through the same resolution path, so the fresh version is
//! cached by the time the upload call returns.

use std::collections::VecDeque;
use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;

use crate::cache::{NullCache, RecipeCache, SqliteCache};
use crate::config::{CacheChoice, Config};
use crate::error::{PaprikaError, RequestError, Result};
use crate::recipe::{RecipeIdentifier, RemoteRecipe};
use crate::transport::{Payload, RetryPolicy, Transport};
use crate::user_agent;

const LOGIN_PATH: &str = "/api/v2/account/login/";
const RECIPES_PATH: &str = "/api/v2/sync/recipes/";
const NOTIFY_PATH: &str = "/api/v2/sync/notify/";

fn recipe_path(uid: &str) -> String {
    format!("/api/v2/sync/recipe/{uid}/")
}

/// A 2xx body can still carry an application error; the HTTP status alone
/// does not decide success.
fn reject_application_error(path: &str, body: &Value) -> Result<()> {
    if let Some(error) = body.get("error") {
        return Err(RequestError {
            path: path.to_string(),
            detail: error.to_string(),
        }
        .into());
    }
    Ok(())
}

// ── Session ─────────────────────────────────────────────────────

/// Process-lifetime login state. The token is acquired on first use, at
/// most once: concurrent callers serialize on the mutex and the second one
/// finds the token already present.
struct Session {
    email: String,
    password: String,
    token: tokio::sync::Mutex<Option<String>>,
}

impl Session {
    fn new(email: String, password: String) -> Self {
        Self {
            email,
            password,
            token: tokio::sync::Mutex::new(None),
        }
    }

    /// The bearer token, logging in first if this session never has.
    ///
    /// Login failures come back as [`PaprikaError::Auth`] with context;
    /// the raw transport error is not propagated. There is no refresh: a
    /// token expired server-side surfaces as an HTTP error on whatever
    /// call hits it.
    async fn token(&self, transport: &Transport) -> Result<String> {
        let mut slot = self.token.lock().await;
        if let Some(token) = slot.as_ref() {
            return Ok(token.clone());
        }

        let form = vec![
            ("email", self.email.clone()),
            ("password", self.password.clone()),
        ];
        let body = transport
            .execute(Method::POST, LOGIN_PATH, None, Payload::Form(form))
            .await
            .map_err(|err| match err {
                PaprikaError::Http(err) => {
                    PaprikaError::Auth(format!("login returned unexpected status: {err}"))
                }
                other => other,
            })?;
        reject_application_error(LOGIN_PATH, &body)?;

        let token = body
            .pointer("/result/token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                PaprikaError::Auth(format!("no bearer token in login response: {body}"))
            })?
            .to_string();

        tracing::info!("logged in to Paprika cloud");
        *slot = Some(token.clone());
        Ok(token)
    }
}

// ── Remote ──────────────────────────────────────────────────────

/// Client for the Paprika cloud sync API.
pub struct Remote {
    transport: Transport,
    session: Session,
    cache: Arc<dyn RecipeCache>,
}

impl Remote {
    /// Build a client from configuration. The cache comes from
    /// `config.cache`; when no explicit User-Agent is configured the
    /// installed desktop app is probed for one.
    pub fn new(config: Config) -> Result<Self> {
        let cache: Arc<dyn RecipeCache> = match &config.cache {
            CacheChoice::Disabled => Arc::new(NullCache),
            CacheChoice::Sqlite { path } => Arc::new(SqliteCache::open(path)?),
        };
        Self::with_cache(config, cache)
    }

    /// Build a client with an explicit cache implementation, ignoring
    /// `config.cache`.
    pub fn with_cache(config: Config, cache: Arc<dyn RecipeCache>) -> Result<Self> {
        let user_agent = config
            .user_agent
            .clone()
            .or_else(user_agent::detect_user_agent);
        let transport = Transport::new(&config.domain, user_agent, config.timeout())?;

        Ok(Self {
            transport,
            session: Session::new(config.email, config.password),
            cache,
        })
    }

    /// Replace the transport's retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.transport = self.transport.with_retry_policy(retry);
        self
    }

    /// Authenticated request plus the application-error body check shared
    /// by every endpoint.
    async fn request(&self, method: Method, path: &str, payload: Payload) -> Result<Value> {
        let token = self.session.token(&self.transport).await?;
        let body = self
            .transport
            .execute(method, path, Some(&token), payload)
            .await?;
        reject_application_error(path, &body)?;
        Ok(body)
    }

    /// Fetch the sync listing: one `(uid, hash)` pair per recipe the cloud
    /// currently holds, in the cloud's own order.
    pub async fn list_identifiers(&self) -> Result<Vec<RecipeIdentifier>> {
        let body = self
            .request(Method::GET, RECIPES_PATH, Payload::Empty)
            .await?;
        let raw = body
            .get("result")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| PaprikaError::UnexpectedResponse {
                path: RECIPES_PATH.to_string(),
                detail: "missing result array".to_string(),
            })?;

        raw.into_iter()
            .map(|entry| serde_json::from_value(entry).map_err(Into::into))
            .collect()
    }

    /// Number of recipes in the cloud collection. Costs one listing fetch;
    /// nothing is resolved.
    pub async fn count(&self) -> Result<usize> {
        Ok(self.list_identifiers().await?.len())
    }

    /// Lazily enumerate full recipes in listing order.
    ///
    /// Each handle re-queries the listing on first use, so a fresh call
    /// reflects the current remote state. A failure ends the enumeration
    /// at the failing recipe.
    pub fn recipes(&self) -> RecipeIter<'_> {
        RecipeIter {
            remote: self,
            pending: None,
        }
    }

    /// Resolve one recipe version.
    ///
    /// A cached `(uid, hash)` pair is served locally with no network call.
    /// On a miss the recipe is fetched, written through to the cache, and
    /// the cache is flushed before the recipe is returned. Fields the data
    /// model does not recognize are dropped.
    pub async fn get_by_id(&self, uid: &str, hash: &str) -> Result<RemoteRecipe> {
        let fields = match self.cache.read(uid, hash) {
            Some(fields) => {
                tracing::debug!(uid, hash, "cache hit");
                fields
            }
            None => {
                tracing::debug!(uid, hash, "cache miss, fetching");
                let path = recipe_path(uid);
                let body = self.request(Method::GET, &path, Payload::Empty).await?;
                let fields = body
                    .get("result")
                    .and_then(Value::as_object)
                    .cloned()
                    .ok_or_else(|| PaprikaError::UnexpectedResponse {
                        path: path.clone(),
                        detail: "missing result object".to_string(),
                    })?;

                self.cache.write(uid, hash, &fields)?;
                self.cache.save()?;
                fields
            }
        };

        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    /// Upload a recipe, overwriting whatever version the cloud holds for
    /// its uid.
    ///
    /// The content hash is recomputed from the current field values before
    /// the push, and the uploaded version is re-resolved afterwards so the
    /// returned recipe is the authoritative post-write state. That
    /// re-resolution populates the cache, so a follow-up
    /// [`get_by_id`](Self::get_by_id) for the new hash is a local hit.
    pub async fn upload(&self, recipe: &RemoteRecipe) -> Result<RemoteRecipe> {
        let mut staged = recipe.clone();
        staged.update_hash()?;

        let path = recipe_path(&staged.uid);
        self.request(
            Method::POST,
            &path,
            Payload::Multipart {
                field: "data",
                bytes: staged.sync_payload()?,
            },
        )
        .await?;
        tracing::info!(uid = %staged.uid, hash = %staged.hash, "uploaded recipe");

        self.get_by_id(&staged.uid, &staged.hash).await
    }

    /// Alias of [`upload`](Self::upload): the remote API has no separate
    /// create, uploading an unknown uid creates it.
    pub async fn add(&self, recipe: &RemoteRecipe) -> Result<RemoteRecipe> {
        self.upload(recipe).await
    }

    /// Ask the cloud to notify the vendor's apps that content changed.
    /// Fire and forget; the acknowledgment body is ignored beyond the
    /// standard error checks.
    pub async fn notify(&self) -> Result<()> {
        self.request(Method::POST, NOTIFY_PATH, Payload::Empty)
            .await?;
        Ok(())
    }
}

// ── Enumeration ─────────────────────────────────────────────────

/// Lazy walk over the remote collection, created by [`Remote::recipes`].
///
/// The listing is fetched on the first [`next`](Self::next) call; each
/// subsequent call resolves one identifier through the cache-first path.
pub struct RecipeIter<'a> {
    remote: &'a Remote,
    pending: Option<VecDeque<RecipeIdentifier>>,
}

impl RecipeIter<'_> {
    /// The next recipe in listing order, `None` when exhausted.
    ///
    /// After an error the iterator is fused: the failing recipe is not
    /// skipped and nothing further is yielded.
    pub async fn next(&mut self) -> Option<Result<RemoteRecipe>> {
        if self.pending.is_none() {
            match self.remote.list_identifiers().await {
                Ok(identifiers) => self.pending = Some(identifiers.into()),
                Err(err) => {
                    self.pending = Some(VecDeque::new());
                    return Some(Err(err));
                }
            }
        }

        let queue = self.pending.as_mut()?;
        let identifier = queue.pop_front()?;

        match self
            .remote
            .get_by_id(&identifier.uid, &identifier.hash)
            .await
        {
            Ok(recipe) => Some(Ok(recipe)),
            Err(err) => {
                queue.clear();
                Some(Err(err))
            }
        }
    }

    /// Drain the enumeration into a vector, stopping at the first error.
    pub async fn try_collect(mut self) -> Result<Vec<RemoteRecipe>> {
        let mut recipes = Vec::new();
        while let Some(next) = self.next().await {
            recipes.push(next?);
        }
        Ok(recipes)
    }
}
