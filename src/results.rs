pub mod convert;
mod reply;
mod value;

pub use convert::Converter;
pub use reply::Reply;
pub use value::Value;

#[cfg(any(feature = "multiplexed", feature = "blocking"))]
pub(crate) use value::{from_redis, from_redis_result};
