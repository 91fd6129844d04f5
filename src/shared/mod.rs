pub mod partial_json;
pub mod response;
