//! RPC gateway - routes inbound envelopes to handlers by message type
//!
//! Every request runs on its own task, so handlers must tolerate parallel
//! invocation. `init` is the exception: it is processed inline so that the
//! membership is in place before any later envelope is looked at.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use flood_core::{FloodError, FloodResult, Membership, NodeId, Origin};
use flood_wire::{kind, Body, Envelope, InitRequest};

use crate::{Outbox, TaskGroup, Transport};

/// An inbound request as seen by a handler
#[derive(Clone, Debug)]
pub struct Request {
    pub envelope: Envelope,
    /// Whether the sender is a client or a cluster peer
    pub origin: Origin,
}

impl Request {
    #[inline]
    pub fn body(&self) -> &Body {
        &self.envelope.body
    }

    #[inline]
    pub fn src(&self) -> &NodeId {
        &self.envelope.src
    }
}

/// Request handler. An `Err` is turned into an `error` reply by the gateway.
pub type Handler = Arc<dyn Fn(&Request) -> FloodResult<()> + Send + Sync>;

/// Runs once the cluster membership is known
pub type InitHook = Arc<dyn Fn(&Membership) -> FloodResult<()> + Send + Sync>;

/// Inbound dispatch plus the shared outbox
pub struct Gateway<T: Transport> {
    outbox: Arc<Outbox<T>>,
    handlers: HashMap<String, Handler>,
    init_hooks: Vec<InitHook>,
    tasks: TaskGroup,
}

impl<T: Transport> Gateway<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Gateway {
            outbox: Arc::new(Outbox::new(transport)),
            handlers: HashMap::new(),
            init_hooks: Vec::new(),
            tasks: TaskGroup::new(),
        }
    }

    pub fn outbox(&self) -> Arc<Outbox<T>> {
        self.outbox.clone()
    }

    /// Task group shared by request handlers and whatever they spawn
    pub fn tasks(&self) -> TaskGroup {
        self.tasks.clone()
    }

    /// Register the handler for a message type, replacing any previous one
    pub fn handle<F>(&mut self, msg_type: &str, handler: F)
    where
        F: Fn(&Request) -> FloodResult<()> + Send + Sync + 'static,
    {
        if self
            .handlers
            .insert(msg_type.to_string(), Arc::new(handler))
            .is_some()
        {
            warn!(msg_type, "replacing handler");
        }
    }

    /// Register a hook to run when `init` arrives
    pub fn on_init<F>(&mut self, hook: F)
    where
        F: Fn(&Membership) -> FloodResult<()> + Send + Sync + 'static,
    {
        self.init_hooks.push(Arc::new(hook));
    }

    /// Route one envelope. Never waits for the handler.
    pub fn dispatch(&self, envelope: Envelope) {
        if envelope.is_reply() {
            self.absorb_reply(&envelope);
            return;
        }

        if envelope.msg_type() == kind::INIT {
            self.initialize(&envelope);
            return;
        }

        let Some(handler) = self.handlers.get(envelope.msg_type()).cloned() else {
            let err = FloodError::NotSupported(envelope.msg_type().to_string());
            report_failure(&self.outbox, &envelope, &err);
            return;
        };

        let origin = self.outbox.origin_of(&envelope.src);
        let outbox = self.outbox.clone();
        self.tasks.spawn(async move {
            let request = Request { envelope, origin };
            if let Err(err) = handler(&request) {
                report_failure(&outbox, &request.envelope, &err);
            }
        });
    }

    fn initialize(&self, envelope: &Envelope) {
        let result = envelope.body.decode::<InitRequest>().and_then(|init| {
            let membership = Membership::new(init.node_id, init.node_ids);
            if !membership.is_member(membership.node_id()) {
                return Err(FloodError::InvalidRequest(format!(
                    "node {} missing from node_ids",
                    membership.node_id()
                )));
            }
            self.outbox.initialize(membership.clone())?;
            for hook in &self.init_hooks {
                hook(&membership)?;
            }
            Ok(membership)
        });

        match result {
            Ok(membership) => {
                info!(
                    node = %membership.node_id(),
                    cluster_size = membership.node_ids().len(),
                    "node initialized"
                );
                if let Err(e) = self.outbox.reply(envelope, Body::init_ok()) {
                    warn!(error = %e, "failed to acknowledge init");
                }
            }
            Err(err) => report_failure(&self.outbox, envelope, &err),
        }
    }

    fn absorb_reply(&self, envelope: &Envelope) {
        if envelope.msg_type() == kind::ERROR {
            warn!(
                src = %envelope.src,
                in_reply_to = ?envelope.body.in_reply_to,
                code = ?envelope.body.field("code"),
                text = ?envelope.body.field("text"),
                "peer reported an error"
            );
        } else {
            debug!(
                src = %envelope.src,
                msg_type = envelope.msg_type(),
                in_reply_to = ?envelope.body.in_reply_to,
                "absorbed reply"
            );
        }
    }

    /// Read envelopes line by line until EOF, then wait for in-flight work.
    /// Undecodable lines are skipped; only a read error ends serving early.
    pub async fn serve<R>(&self, reader: R) -> FloodResult<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let result = self.read_lines(reader).await;

        debug!(in_flight = self.tasks.active(), "input closed, draining");
        self.tasks.drain().await;
        result
    }

    async fn read_lines<R>(&self, mut reader: R) -> FloodResult<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|e| FloodError::TransportError(e.to_string()))?;
            if read == 0 {
                return Ok(());
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    warn!(error = %e, "skipping non-UTF-8 input line");
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            match Envelope::parse(line) {
                Ok(envelope) => self.dispatch(envelope),
                Err(e) => warn!(error = %e, "skipping malformed input line"),
            }
        }
    }

    /// Serve stdin, then close the transport
    pub async fn run(self) -> FloodResult<()> {
        let result = self.serve(BufReader::new(tokio::io::stdin())).await;
        self.outbox.transport().close();
        result
    }
}

fn report_failure<T: Transport>(outbox: &Outbox<T>, envelope: &Envelope, err: &FloodError) {
    warn!(
        src = %envelope.src,
        msg_type = envelope.msg_type(),
        error = %err,
        "request failed"
    );
    if let Err(e) = outbox.reply(envelope, Body::error(err.code(), err.to_string())) {
        warn!(error = %e, "failed to send error reply");
    }
}
