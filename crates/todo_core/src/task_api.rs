use crate::error::AppError;
use crate::model::{CalendarDate, Task, TaskKey};
use crate::storage::TaskStore;

pub const NO_JOBS: &str = "No jobs were planned on this date.";

pub fn add_job<S: TaskStore + ?Sized>(
    store: &S,
    chat_id: i64,
    date: CalendarDate,
    description: &str,
) -> Result<Vec<Task>, AppError> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("job description is required"));
    }

    let key = TaskKey::new(chat_id, date);
    let tasks = store.append(&key, Task::new(trimmed))?;
    tracing::debug!(chat_id, date = %date, count = tasks.len(), "job added");
    Ok(tasks)
}

pub fn jobs_for<S: TaskStore + ?Sized>(
    store: &S,
    chat_id: i64,
    date: CalendarDate,
) -> Result<Vec<Task>, AppError> {
    store.get(&TaskKey::new(chat_id, date))
}

pub fn complete_job<S: TaskStore + ?Sized>(
    store: &S,
    chat_id: i64,
    date: CalendarDate,
    index: usize,
) -> Result<Task, AppError> {
    let task = store.mark_done(&TaskKey::new(chat_id, date), index)?;
    tracing::debug!(chat_id, date = %date, index, "job completed");
    Ok(task)
}

/// Numbered `"{n}. {job} - {Done|TODO}"` lines, one per task.
pub fn render_digest(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return NO_JOBS.to_string();
    }

    tasks
        .iter()
        .enumerate()
        .map(|(index, task)| {
            format!(
                "{}. {} - {}\n",
                index + 1,
                task.description,
                task.status_label()
            )
        })
        .collect()
}

pub fn digest_for<S: TaskStore + ?Sized>(
    store: &S,
    chat_id: i64,
    date: CalendarDate,
) -> Result<String, AppError> {
    Ok(render_digest(&jobs_for(store, chat_id, date)?))
}

#[cfg(test)]
mod tests {
    use super::{NO_JOBS, add_job, complete_job, digest_for, jobs_for, render_digest};
    use crate::model::{CalendarDate, Task};
    use crate::storage::MemoryStore;

    fn date() -> CalendarDate {
        CalendarDate::new(2025, 3, 15).unwrap()
    }

    #[test]
    fn add_job_rejects_blank_description() {
        let store = MemoryStore::new();
        let err = add_job(&store, 1, date(), "   ").unwrap_err();

        assert_eq!(err.code(), "invalid_input");
        assert!(jobs_for(&store, 1, date()).unwrap().is_empty());
    }

    #[test]
    fn add_job_appends_in_order() {
        let store = MemoryStore::new();
        add_job(&store, 1, date(), "first").unwrap();
        let tasks = add_job(&store, 1, date(), " second ").unwrap();

        assert_eq!(tasks, vec![Task::new("first"), Task::new("second")]);
    }

    #[test]
    fn jobs_are_scoped_by_chat_and_date() {
        let store = MemoryStore::new();
        add_job(&store, 1, date(), "mine").unwrap();

        assert!(jobs_for(&store, 2, date()).unwrap().is_empty());
        let other_day = CalendarDate::new(2025, 3, 16).unwrap();
        assert!(jobs_for(&store, 1, other_day).unwrap().is_empty());
    }

    #[test]
    fn render_digest_numbers_tasks() {
        let tasks = vec![
            Task::new("Learn Go"),
            Task {
                description: "Sleep".to_string(),
                done: true,
            },
        ];
        assert_eq!(render_digest(&tasks), "1. Learn Go - TODO\n2. Sleep - Done\n");
    }

    #[test]
    fn render_digest_reports_empty_day() {
        assert_eq!(render_digest(&[]), NO_JOBS);
    }

    #[test]
    fn complete_job_only_touches_target() {
        let store = MemoryStore::new();
        for job in ["a", "b", "c"] {
            add_job(&store, 1, date(), job).unwrap();
        }

        let done = complete_job(&store, 1, date(), 1).unwrap();
        assert_eq!(done.description, "b");
        assert_eq!(
            digest_for(&store, 1, date()).unwrap(),
            "1. a - TODO\n2. b - Done\n3. c - TODO\n"
        );
    }
}
