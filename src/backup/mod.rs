pub mod archive;
pub mod backup_config;
pub mod checksum;
pub mod naming;
pub mod result_error;
pub mod task;
pub mod validate;
