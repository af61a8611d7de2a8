pub mod files;
pub mod scheduler;
pub mod storage;
