pub mod api;
pub mod auth;
pub mod authz;
pub mod code;
pub mod config;
pub mod context;
pub mod db;
pub mod dirs;
pub mod handlers;
pub mod logs;
pub mod recycle;
pub mod request;
pub mod restful;
pub mod rsa;
