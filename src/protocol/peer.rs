//! Outbound requests and the correlation-id table.
//!
//! Either side may have several requests in flight. Each one parks a oneshot
//! sender under its id; the read loop completes it when the matching response
//! arrives. Closing the peer fails every parked request.

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::transport::Transport;
use crate::protocol::types::{JsonRpcRequest, JsonRpcResponse, Message, RequestId};
use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::sync::oneshot;
use tracing::{debug, warn};

type Waiter = oneshot::Sender<ProtocolResult<Value>>;

/// Requests awaiting a response, keyed by correlation id.
#[derive(Default)]
pub struct PendingRequests {
    waiters: DashMap<RequestId, Waiter>,
    closed: AtomicBool,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a waiter. Fails once the table is closed.
    fn register(&self, id: RequestId) -> ProtocolResult<oneshot::Receiver<ProtocolResult<Value>>> {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(id.clone(), tx);

        // close() may have drained between the insert and this check; in that
        // case the waiter already holds ConnectionClosed.
        if self.closed.load(Ordering::SeqCst) && self.waiters.remove(&id).is_some() {
            return Err(ProtocolError::ConnectionClosed);
        }
        Ok(rx)
    }

    fn forget(&self, id: &RequestId) {
        self.waiters.remove(id);
    }

    /// Deliver a response to its waiter. Returns false for unknown ids.
    pub fn complete(&self, response: JsonRpcResponse) -> bool {
        let Some(id) = response.id.clone() else {
            warn!("Dropping response without id");
            return false;
        };
        let Some((_, waiter)) = self.waiters.remove(&id) else {
            warn!("Response for unknown request id {}", id);
            return false;
        };

        let outcome = match (response.result, response.error) {
            (_, Some(error)) => Err(ProtocolError::Remote {
                code: error.code,
                message: error.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        };
        // Receiver gone means the caller stopped waiting.
        let _ = waiter.send(outcome);
        true
    }

    /// Fail every outstanding request and refuse new ones.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if self.is_empty() {
            return;
        }
        let ids: Vec<RequestId> = self.waiters.iter().map(|e| e.key().clone()).collect();
        debug!("Failing {} pending request(s)", ids.len());
        for id in ids {
            if let Some((_, waiter)) = self.waiters.remove(&id) {
                let _ = waiter.send(Err(ProtocolError::ConnectionClosed));
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

/// Handle for sending requests and notifications to the other side.
#[derive(Clone)]
pub struct Peer {
    transport: Arc<dyn Transport>,
    pending: Arc<PendingRequests>,
    next_id: Arc<AtomicI64>,
}

impl Peer {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            pending: Arc::new(PendingRequests::new()),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Send a request and wait for its correlated response.
    ///
    /// There is no cancellation: the call resolves when the response arrives
    /// or the peer is closed.
    pub async fn request(&self, method: &str, params: Option<Value>) -> ProtocolResult<Value> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let rx = self.pending.register(id.clone())?;

        let mut request = JsonRpcRequest::new(method).with_id(id.clone());
        request.params = params;

        debug!("Sending request {} id={}", method, id);
        if let Err(e) = self.transport.write_message(&Message::Request(request)).await {
            self.pending.forget(&id);
            return Err(ProtocolError::Transport(e.to_string().into()));
        }

        rx.await.unwrap_or(Err(ProtocolError::ConnectionClosed))
    }

    /// Typed wrapper over [`Peer::request`].
    pub async fn call<P, R>(&self, method: &str, params: &P) -> ProtocolResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)
            .map_err(|e| ProtocolError::InvalidParams(e.to_string().into()))?;
        let value = self.request(method, Some(params)).await?;
        serde_json::from_value(value).map_err(|e| {
            ProtocolError::InvalidRequest(format!("malformed {} result: {}", method, e).into())
        })
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> ProtocolResult<()> {
        let mut notification = JsonRpcRequest::new(method);
        notification.params = params;
        self.transport
            .write_message(&Message::Notification(notification))
            .await
            .map_err(|e| ProtocolError::Transport(e.to_string().into()))
    }

    pub async fn respond(&self, response: JsonRpcResponse) -> ProtocolResult<()> {
        self.transport
            .write_response(&response)
            .await
            .map_err(|e| ProtocolError::Transport(e.to_string().into()))
    }

    /// Route an inbound response to whoever is waiting for it.
    pub fn handle_response(&self, response: JsonRpcResponse) -> bool {
        self.pending.complete(response)
    }

    /// Fail all outstanding requests.
    pub fn close(&self) {
        self.pending.close();
    }

    pub fn is_closed(&self) -> bool {
        self.pending.is_closed()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
