mod date;
mod task;

pub use date::CalendarDate;
pub use task::{Task, TaskKey};
