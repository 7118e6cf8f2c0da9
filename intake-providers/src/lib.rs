pub mod backend;
pub mod multipart;
pub mod parse;
pub mod request;
pub mod runtime;

pub use backend::BackendEndpoint;
pub use request::{Body, HttpRequest, Method};
pub use runtime::{HttpResponse, execute};
