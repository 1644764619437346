//! Request, response and routing types shared by every layer.

pub mod request;
pub mod response;
pub mod routing;

pub use request::{Destination, InterceptedRequest, Method, RequestMode};
pub use response::{CacheEntry, Response, ResponseSource};
pub use routing::{ResourceCategory, Route, Strategy};
