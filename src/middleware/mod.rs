pub mod client_ip;
pub mod instrument;

pub use instrument::{instrument, on_request, on_response, RequestRecord, RequestView};
