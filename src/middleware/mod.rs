mod error_normalizer;
mod request_parser;
mod timeout;
mod urlencoded;

pub use error_normalizer::{route_not_found, ErrorNormalizer};
pub use request_parser::{BodyLimits, RequestParser};
pub use timeout::RequestTimeout;
