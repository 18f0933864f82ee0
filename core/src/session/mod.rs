pub mod broadcaster;
pub mod registry;

pub use broadcaster::{Broadcaster, Delivery};
pub use registry::{ConnectionId, Membership, Outbox, SessionRegistry};
