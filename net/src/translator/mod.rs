use tern_host::{CommandBuffer, World};
use tern_shared::{DataWriter, GlobalTime, NodeId, TransportError};

use crate::ghost::GhostTracker;
use crate::identity::NetworkIdentityMap;

mod egress;
mod master;
mod ownership;
mod state;
mod weapon;

pub use egress::{MasterEgressTranslator, StateEgressTranslator, WeaponEgressTranslator};
pub(crate) use master::MasterTranslator;
pub(crate) use ownership::OwnershipTranslator;
pub(crate) use state::StateTranslator;
pub(crate) use weapon::WeaponTranslator;

/// Shared mutable context handed to the ingress translators. Ingress runs
/// on the main thread before event capture, so translators mutate the live
/// world directly.
pub(crate) struct IngressCtx<'a> {
    pub world: &'a mut World,
    pub ids: &'a mut NetworkIdentityMap,
    pub ghosts: &'a mut GhostTracker,
    pub local_node: NodeId,
    pub time: &'a GlobalTime,
}

/// Outbound translator: scans the world after command playback and
/// publishes every descriptor instance this node owns.
pub trait EgressTranslator: Send {
    fn scan_and_publish(
        &mut self,
        world: &World,
        ids: &NetworkIdentityMap,
        local_node: NodeId,
        writer: &mut dyn DataWriter,
        cmd: &mut CommandBuffer,
        time: &GlobalTime,
    ) -> Result<(), TransportError>;
}
