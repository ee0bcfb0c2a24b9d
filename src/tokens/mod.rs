mod balancer;
mod probe;
mod queue;

pub use balancer::{LoadBalancer, choose_destination};
pub use probe::{DepthProbe, DepthProbeTemplate};
pub use queue::{TokenMailbox, TokenQueue, mailbox};
