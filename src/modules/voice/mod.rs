pub mod commands;
pub mod database;
pub mod handler;
pub mod keeper;
pub mod task;
