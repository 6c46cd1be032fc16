/* This Source Code Form is subject to the terms of the Mozilla Public
* License, v. 2.0. If a copy of the MPL was not distributed with this
* file, You can obtain one at http://mozilla.org/MPL/2.0/.
*/

use context_id::{ContextIDComponent, DefaultContextIdCallback};
use once_cell::sync::Lazy;
use url::Url;
use viaduct::Request;

use crate::{
    client::{ad_request::AdRequest, ad_response::AdResponse, config::Environment},
    error::{
        check_http_status_for_error, CallbackRequestError, FetchAdsError, RecordClickError,
        RecordImpressionError, ReportAdError,
    },
    http_cache::{CacheOutcome, HttpCache, HttpCacheError},
    RequestCachePolicy,
};

static MARS_API_ENDPOINT_PROD: Lazy<Url> =
    Lazy::new(|| Url::parse("https://ads.mozilla.org/v1/").expect("hardcoded URL must be valid"));

#[cfg(feature = "dev")]
static MARS_API_ENDPOINT_STAGING: Lazy<Url> =
    Lazy::new(|| Url::parse("https://ads.allizom.org/v1/").expect("hardcoded URL must be valid"));

impl Environment {
    pub fn into_mars_url(self) -> &'static Url {
        match self {
            Environment::Prod => &MARS_API_ENDPOINT_PROD,
            #[cfg(feature = "dev")]
            Environment::Staging => &MARS_API_ENDPOINT_STAGING,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait MARSClient: Sync + Send {
    fn fetch_ads(
        &self,
        request: &AdRequest,
        cache_policy: &RequestCachePolicy,
    ) -> Result<AdResponse, FetchAdsError>;
    fn record_impression(&self, callback: Url) -> Result<(), RecordImpressionError>;
    fn record_click(&self, callback: Url) -> Result<(), RecordClickError>;
    fn report_ad(&self, callback: Url) -> Result<(), ReportAdError>;
    fn get_context_id(&self) -> context_id::ApiResult<String>;
    fn cycle_context_id(&mut self) -> context_id::ApiResult<String>;
    fn get_mars_endpoint(&self) -> &Url;
    fn clear_cache(&self) -> Result<(), HttpCacheError>;
}

pub struct DefaultMARSClient {
    context_id_component: ContextIDComponent,
    endpoint: Url,
    http_cache: Option<HttpCache>,
}

impl DefaultMARSClient {
    pub fn new(
        context_id: String,
        environment: Environment,
        http_cache: Option<HttpCache>,
    ) -> Self {
        let endpoint = environment.into_mars_url().clone();

        Self {
            context_id_component: ContextIDComponent::new(
                &context_id,
                0,
                false,
                Box::new(DefaultContextIdCallback),
            ),
            endpoint,
            http_cache,
        }
    }

    #[cfg(test)]
    pub fn new_with_endpoint(
        context_id: String,
        endpoint: String,
        http_cache: Option<HttpCache>,
    ) -> Self {
        Self {
            context_id_component: ContextIDComponent::new(
                &context_id,
                0,
                false,
                Box::new(DefaultContextIdCallback),
            ),
            endpoint: Url::parse(endpoint.as_str()).unwrap(),
            http_cache,
        }
    }

    fn make_callback_request(&self, callback: Url) -> Result<(), CallbackRequestError> {
        let request = Request::get(callback);
        let response = request.send()?;
        check_http_status_for_error(&response).map_err(Into::into)
    }
}

impl MARSClient for DefaultMARSClient {
    fn cycle_context_id(&mut self) -> context_id::ApiResult<String> {
        let old_context_id = self.get_context_id()?;
        self.context_id_component.force_rotation()?;
        Ok(old_context_id)
    }

    fn get_context_id(&self) -> context_id::ApiResult<String> {
        self.context_id_component.request(0)
    }

    fn get_mars_endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn fetch_ads(
        &self,
        ad_request: &AdRequest,
        cache_policy: &RequestCachePolicy,
    ) -> Result<AdResponse, FetchAdsError> {
        let base = self.get_mars_endpoint();
        let url = base.join("ads")?;
        let request = Request::post(url).json(ad_request);

        if let Some(cache) = self.http_cache.as_ref() {
            let outcome = cache.send_with_policy(&request, cache_policy)?;

            // TODO: observe cache outcome for metrics/logging.
            match &outcome.cache_outcome {
                CacheOutcome::Hit => {}
                CacheOutcome::LookupFailed(_err) => {}
                CacheOutcome::NoCache => {}
                CacheOutcome::MissNotCacheable => {}
                CacheOutcome::MissStored => {}
                CacheOutcome::StoreFailed(_err) => {}
                CacheOutcome::CleanupFailed(_err) => {}
            }
            check_http_status_for_error(&outcome.response)?;
            let response_json: AdResponse = outcome.response.json()?;
            Ok(response_json)
        } else {
            let response = request.send()?;
            check_http_status_for_error(&response)?;
            let response_json: AdResponse = response.json()?;
            Ok(response_json)
        }
    }

    fn record_impression(&self, callback: Url) -> Result<(), RecordImpressionError> {
        Ok(self.make_callback_request(callback)?)
    }

    fn record_click(&self, callback: Url) -> Result<(), RecordClickError> {
        Ok(self.make_callback_request(callback)?)
    }

    fn report_ad(&self, callback: Url) -> Result<(), ReportAdError> {
        Ok(self.make_callback_request(callback)?)
    }

    fn clear_cache(&self) -> Result<(), HttpCacheError> {
        if let Some(cache) = &self.http_cache {
            cache.clear()?;
        }
        Ok(())
    }
}
