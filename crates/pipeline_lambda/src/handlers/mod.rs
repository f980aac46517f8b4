pub mod http_call;
pub mod init_warehouse;
pub mod transform_load;
