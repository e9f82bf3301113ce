//! Result delivery for a single fetch
//!
//! A [`Dispatcher`] is consumed by whichever outcome arrives first, so its
//! [`Delegate`] hears about a fetch exactly once: either the records or an
//! error, never both and never a partial result.

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::builder;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::value::Value;

/// Receiver of a fetch outcome
pub trait Delegate {
    /// Called with the finished records after a successful parse
    fn objects_fetched(&mut self, objects: Vec<Value>);

    /// Called with the transport, parse or structural failure
    fn fetch_failed(&mut self, error: Error);
}

impl<D: Delegate + ?Sized> Delegate for &mut D {
    fn objects_fetched(&mut self, objects: Vec<Value>) {
        (**self).objects_fetched(objects);
    }

    fn fetch_failed(&mut self, error: Error) {
        (**self).fetch_failed(error);
    }
}

/// [`Delegate`] built from a success closure and a failure closure
pub struct Callbacks<S, F> {
    on_result: S,
    on_error: F,
}

impl<S, F> Callbacks<S, F>
where
    S: FnMut(Vec<Value>),
    F: FnMut(Error),
{
    pub fn new(on_result: S, on_error: F) -> Self {
        Self {
            on_result,
            on_error,
        }
    }
}

impl<S, F> Delegate for Callbacks<S, F>
where
    S: FnMut(Vec<Value>),
    F: FnMut(Error),
{
    fn objects_fetched(&mut self, objects: Vec<Value>) {
        (self.on_result)(objects);
    }

    fn fetch_failed(&mut self, error: Error) {
        (self.on_error)(error);
    }
}

/// [`Delegate`] that forwards the outcome over a oneshot channel
#[derive(Debug)]
pub struct Channel(Option<oneshot::Sender<Result<Vec<Value>>>>);

impl Channel {
    /// Create the delegate together with the receiver awaiting its outcome
    pub fn pair() -> (Self, oneshot::Receiver<Result<Vec<Value>>>) {
        let (tx, rx) = oneshot::channel();
        (Self(Some(tx)), rx)
    }

    fn send(&mut self, outcome: Result<Vec<Value>>) {
        let Some(sender) = self.0.take() else {
            return;
        };
        if sender.send(outcome).is_err() {
            debug!("fetch outcome dropped: receiver gone");
        }
    }
}

impl Delegate for Channel {
    fn objects_fetched(&mut self, objects: Vec<Value>) {
        self.send(Ok(objects));
    }

    fn fetch_failed(&mut self, error: Error) {
        self.send(Err(error));
    }
}

/// Routes the outcome of one fetch to its delegate
#[derive(Debug)]
pub struct Dispatcher<D> {
    config: Config,
    delegate: D,
}

impl<D: Delegate> Dispatcher<D> {
    pub fn new(config: Config, delegate: D) -> Self {
        Self { config, delegate }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The transport delivered the whole payload: parse it and report the result
    pub fn bytes_available(self, bytes: &[u8]) {
        debug!(len = bytes.len(), "payload received");
        match builder::build(bytes, &self.config) {
            Ok(objects) => self.succeed(objects),
            Err(error) => self.parse_failed(error),
        }
    }

    /// The transport gave up; no parsing happens
    pub fn transport_failed(mut self, error: Error) {
        warn!(%error, "fetch failed");
        self.delegate.fetch_failed(error);
    }

    /// The tokenizer or tree builder rejected the payload
    pub fn parse_failed(mut self, error: Error) {
        warn!(%error, "document rejected");
        self.delegate.fetch_failed(error);
    }

    /// Report an already computed outcome
    pub fn complete(self, outcome: Result<Vec<Value>>) {
        match outcome {
            Ok(objects) => self.succeed(objects),
            Err(error) if error.is_transport() => self.transport_failed(error),
            Err(error) => self.parse_failed(error),
        }
    }

    fn succeed(mut self, objects: Vec<Value>) {
        debug!(records = objects.len(), "delivering records");
        self.delegate.objects_fetched(objects);
    }
}
