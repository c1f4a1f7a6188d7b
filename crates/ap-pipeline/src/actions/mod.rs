//! Concrete actions of the patch plan.
//!
//! Each action wraps one boundary trait from `ap-core` and the workspace
//! [`Layout`](ap_tools::Layout) it operates on.

mod decode;
mod modify;
mod sign;
mod tools;

pub use decode::Decode;
pub use modify::{DisablePinning, ModifyManifest, ModifyNetworkConfig};
pub use sign::SignAndDeliver;
pub use tools::CheckTools;
