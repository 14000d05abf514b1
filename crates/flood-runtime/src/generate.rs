//! `generate` - cluster-unique ids without coordination

use std::sync::{Arc, OnceLock};

use flood_core::{FloodError, FloodResult, IdGenerator, Membership};
use flood_transport::{Outbox, Request, Transport};
use flood_wire::Body;

pub struct GenerateResponder<T: Transport> {
    /// Seeded from the node's position in the cluster at `init`
    ids: OnceLock<IdGenerator>,
    outbox: Arc<Outbox<T>>,
}

impl<T: Transport> GenerateResponder<T> {
    pub fn new(outbox: Arc<Outbox<T>>) -> Self {
        GenerateResponder {
            ids: OnceLock::new(),
            outbox,
        }
    }

    /// Init hook: derive the generator from the membership
    pub fn seed(&self, membership: &Membership) -> FloodResult<()> {
        let index = membership
            .own_index()
            .and_then(|i| u32::try_from(i).ok())
            .ok_or_else(|| {
                FloodError::InvalidRequest(format!(
                    "no usable index for node {}",
                    membership.node_id()
                ))
            })?;

        self.ids
            .set(IdGenerator::new(index))
            .map_err(|_| FloodError::AlreadyInitialized(membership.node_id().clone()))
    }

    pub fn handle(&self, request: &Request) -> FloodResult<()> {
        let id = self.ids.get().ok_or(FloodError::NotInitialized)?.next()?;
        self.outbox.reply(&request.envelope, Body::generate_ok(id))
    }
}
