pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod error;
pub mod keyboard;
pub mod model;
pub mod outbound;
pub mod reminder;
pub mod storage;
pub mod task_api;
