use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use shared::protocol::ListEnvelope;

use crate::{
    api::{ListEndpoint, VendorApi},
    listing::{ListQuery, ListSource},
    transport::ApiFailure,
};

pub struct HttpListSource<R> {
    api: VendorApi,
    endpoint: ListEndpoint,
    _marker: PhantomData<fn() -> R>,
}

impl<R> HttpListSource<R> {
    pub fn new(api: VendorApi, endpoint: ListEndpoint) -> Self {
        Self {
            api,
            endpoint,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<R> ListSource<R> for HttpListSource<R>
where
    R: DeserializeOwned + Send + 'static,
{
    async fn fetch(&self, query: &ListQuery) -> Result<ListEnvelope<R>, ApiFailure> {
        self.api.list(self.endpoint, query).await
    }
}
