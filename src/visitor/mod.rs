pub mod classifier;
pub mod country;
pub mod network;

pub use classifier::VisitorFilter;
pub use country::{LOCAL, UNDETERMINED};
pub use network::{Cidr, NetworkPolicy};
