pub mod request;
pub mod response;

pub use request::{parse_query, Method, Request, UploadedFile, DEFAULT_BODY_LIMIT};
pub use response::{error_body, Payload, ResponseHead, ResponseState};
