//! Fetch a document and turn it into records

use tracing::{info, instrument};

use crate::builder;
use crate::config::Config;
use crate::dispatch::{Delegate, Dispatcher};
use crate::error::Result;
use crate::transport::{AnyTransport, Request, Transport};
use crate::value::Value;

/// One transport paired with one configuration
///
/// Every fetch parses with a fresh builder, so a `Fetcher` can be shared
/// between concurrent fetches.
#[derive(Clone, Debug)]
pub struct Fetcher<T = AnyTransport> {
    transport: T,
    config: Config,
}

impl Default for Fetcher<AnyTransport> {
    fn default() -> Self {
        Self::new(AnyTransport::default(), Config::default())
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, config: Config) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch and parse, returning the records
    #[instrument(skip(self, request), fields(target = %request.target))]
    pub async fn fetch(&self, request: &Request) -> Result<Vec<Value>> {
        let bytes = self.transport.fetch(request).await?;
        let records = builder::build(&bytes, &self.config)?;
        info!(records = records.len(), "fetched");
        Ok(records)
    }

    /// Fetch and parse, reporting the outcome to `delegate` exactly once
    #[instrument(skip(self, request, delegate), fields(target = %request.target))]
    pub async fn fetch_with<D: Delegate>(&self, request: &Request, delegate: D) {
        let dispatcher = Dispatcher::new(self.config.clone(), delegate);
        match self.transport.fetch(request).await {
            Ok(bytes) => dispatcher.bytes_available(&bytes),
            Err(error) => dispatcher.transport_failed(error),
        }
    }

    /// `GET` the URL
    pub async fn fetch_url(&self, url: &str) -> Result<Vec<Value>> {
        self.fetch(&Request::get(url)).await
    }

    /// `POST` `body` to the URL
    pub async fn fetch_url_with_body(&self, url: &str, body: &str) -> Result<Vec<Value>> {
        self.fetch(&Request::post(url, body)).await
    }
}
