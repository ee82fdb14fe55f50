pub mod events;
pub mod task;
