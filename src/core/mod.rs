//! Core infrastructure: clock and HTTP transport.

pub mod clock;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use transport::{
    EndpointResponse, FormPost, HttpTransport, MockHttpTransport, ReqwestHttpTransport,
    DEFAULT_MAX_RESPONSE_SIZE,
};
