//! `read` - report everything recorded so far

use std::sync::Arc;

use flood_core::FloodResult;
use flood_transport::{Outbox, Request, Transport};
use flood_wire::Body;

use crate::SeenSet;

pub struct QueryResponder<T: Transport> {
    seen: Arc<SeenSet>,
    outbox: Arc<Outbox<T>>,
}

impl<T: Transport> QueryResponder<T> {
    pub fn new(seen: Arc<SeenSet>, outbox: Arc<Outbox<T>>) -> Self {
        QueryResponder { seen, outbox }
    }

    /// Reply with the recorded values, sorted ascending
    pub fn handle(&self, request: &Request) -> FloodResult<()> {
        let mut values = self.seen.snapshot();
        values.sort_unstable();
        self.outbox.reply(&request.envelope, Body::read_ok(&values))
    }
}
