//! `echo` - hand the request body back

use std::sync::Arc;

use flood_core::FloodResult;
use flood_transport::{Outbox, Request, Transport};
use flood_wire::Body;

pub struct EchoResponder<T: Transport> {
    outbox: Arc<Outbox<T>>,
}

impl<T: Transport> EchoResponder<T> {
    pub fn new(outbox: Arc<Outbox<T>>) -> Self {
        EchoResponder { outbox }
    }

    pub fn handle(&self, request: &Request) -> FloodResult<()> {
        self.outbox
            .reply(&request.envelope, Body::echo_ok(request.body()))
    }
}
