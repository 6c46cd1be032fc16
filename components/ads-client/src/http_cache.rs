/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

mod builder;
mod bytesize;
mod cache_control;
mod clock;
mod connection_initializer;
mod request_hash;
mod store;

use self::{builder::HttpCacheBuilder, cache_control::CacheControl, store::HttpCacheStore};

use std::hash::Hash;
use viaduct::{Request, Response};

pub use self::builder::HttpCacheBuilderError;
pub use self::bytesize::ByteSize;
pub use self::request_hash::RequestHash;
use std::cmp;
use std::path::Path;
use std::time::Duration;

pub type HttpCacheSendResult<T> = std::result::Result<T, viaduct::ViaductError>;

#[derive(Clone, Copy, Debug, Default)]
pub struct RequestCachePolicy {
    pub mode: CacheMode,
    pub ttl_seconds: Option<u64>, // optional client-defined ttl override
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheMode {
    #[default]
    CacheFirst,
    NetworkFirst,
}

#[derive(Debug, thiserror::Error)]
pub enum HttpCacheError {
    #[error("Could not build cache: {0}")]
    Builder(#[from] builder::HttpCacheBuilderError),

    #[error("SQLite operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug)]
pub enum CacheOutcome {
    Hit,
    LookupFailed(rusqlite::Error), // cache miss path due to lookup error
    NoCache,                       // send policy requested a cache bypass
    MissNotCacheable,              // policy says "don't store"
    MissStored,                    // stored successfully
    StoreFailed(HttpCacheError),   // insert/upsert failed
    CleanupFailed(HttpCacheError), // cleaning expired objects failed
}

pub struct SendOutcome {
    pub response: Response,
    pub cache_outcome: CacheOutcome,
}

pub struct HttpCache<T: Hash + Into<Request>> {
    max_size: ByteSize,
    store: HttpCacheStore,
    default_ttl: Duration,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: Hash + Into<Request>> HttpCache<T> {
    pub fn builder<P: AsRef<Path>>(db_path: P) -> HttpCacheBuilder<T> {
        HttpCacheBuilder::new(db_path.as_ref())
    }

    pub fn clear(&self) -> Result<(), HttpCacheError> {
        self.store.clear_all().map_err(HttpCacheError::from)?;
        Ok(())
    }

    pub fn invalidate_by_hash(&self, request_hash: &RequestHash) -> Result<(), HttpCacheError> {
        self.store
            .invalidate_by_hash(request_hash)
            .map_err(HttpCacheError::from)?;
        Ok(())
    }

    pub fn send_with_policy(
        &self,
        item: T,
        request_policy: &RequestCachePolicy,
    ) -> HttpCacheSendResult<SendOutcome> {
        let request_hash = RequestHash::new(&item);
        let request: Request = item.into();
        let request_policy_ttl = match request_policy.ttl_seconds {
            Some(s) => Duration::new(s, 0),
            None => self.default_ttl,
        };

        if request_policy.mode == CacheMode::CacheFirst {
            match self.store.lookup(&request_hash) {
                Ok(Some(response)) => {
                    return Ok(SendOutcome {
                        response,
                        cache_outcome: CacheOutcome::Hit,
                    });
                }
                Err(e) => {
                    let mut outcome =
                        self.fetch_and_cache(&request, &request_hash, &request_policy_ttl)?;
                    outcome.cache_outcome = CacheOutcome::LookupFailed(e);
                    return Ok(outcome);
                }
                Ok(None) => {}
            }
        }

        self.fetch_and_cache(&request, &request_hash, &request_policy_ttl)
    }

    fn fetch_and_cache(
        &self,
        request: &Request,
        request_hash: &RequestHash,
        request_policy_ttl: &Duration,
    ) -> HttpCacheSendResult<SendOutcome> {
        let response = request.clone().send()?;
        if let Err(e) = self.store.delete_expired_entries() {
            return Ok(SendOutcome {
                response,
                cache_outcome: CacheOutcome::CleanupFailed(e.into()),
            });
        }
        let cache_control = CacheControl::from(&response);
        let cache_outcome = if cache_control.should_cache() {
            let response_ttl = match cache_control.max_age {
                Some(s) => Duration::new(s, 0),
                None => self.default_ttl,
            };

            // We respect the smallest ttl between the policy, default client value, or header
            let final_ttl = cmp::min(
                cmp::min(*request_policy_ttl, self.default_ttl),
                response_ttl,
            );

            if final_ttl.as_secs() == 0 {
                return Ok(SendOutcome {
                    response,
                    cache_outcome: CacheOutcome::NoCache,
                });
            }

            match self.cache_object(request_hash, &response, &final_ttl) {
                Ok(()) => CacheOutcome::MissStored,
                Err(e) => CacheOutcome::StoreFailed(e),
            }
        } else {
            CacheOutcome::MissNotCacheable
        };

        Ok(SendOutcome {
            response,
            cache_outcome,
        })
    }

    fn cache_object(
        &self,
        request_hash: &RequestHash,
        response: &Response,
        ttl: &Duration,
    ) -> Result<(), HttpCacheError> {
        self.store.store_with_ttl(request_hash, response, ttl)?;
        self.store.trim_to_max_size(self.max_size.as_u64() as i64)?;
        Ok(())
    }
}
