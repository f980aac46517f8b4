pub mod http;
pub mod object_store;
pub mod secrets;
pub mod warehouse;
