use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::command::HostError;

/// One frame of a cooperative task per `next()`; `None` means the task finished.
pub type CoroutineBody = Box<dyn Iterator<Item = Result<(), HostError>>>;
pub type UpdateAction = Box<dyn FnMut(f32)>;
pub type CompletionCallback = Box<dyn FnOnce()>;

/// Completion flag handed out by handle-based commands; the host flips it when its work is done.
#[derive(Clone, Debug, Default)]
pub struct MethodHandle {
    done: Rc<Cell<bool>>,
}

impl MethodHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.done.get()
    }

    pub fn set_done(&self, done: bool) {
        self.done.set(done);
    }

    pub fn complete(&self) {
        self.set_done(true);
    }
}

#[derive(Debug, Error)]
#[error("task '{label}' failed: {source}")]
pub struct TaskFailure {
    pub label: String,
    #[source]
    pub source: HostError,
}

struct Task {
    label: String,
    body: CoroutineBody,
    on_complete: Option<CompletionCallback>,
}

/// Host-driven scheduler: keyed per-frame actions plus cooperative tasks.
#[derive(Default)]
pub struct TaskRunner {
    actions: IndexMap<String, UpdateAction>,
    tasks: Vec<Task>,
    frame: u64,
}

impl fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("pending_tasks", &self.tasks.len())
            .field("frame", &self.frame)
            .finish()
    }
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn pending_task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn contains_action(&self, key: &str) -> bool {
        self.actions.contains_key(key)
    }

    /// Registers (or replaces) the per-frame action stored under `key`.
    pub fn set_action(&mut self, key: impl Into<String>, action: UpdateAction) {
        self.actions.insert(key.into(), action);
    }

    pub fn delete_action(&mut self, key: &str) -> bool {
        self.actions.shift_remove(key).is_some()
    }

    /// Queues a coroutine body. Its first step runs on the next `tick`, never inline.
    pub fn run(
        &mut self,
        label: impl Into<String>,
        body: CoroutineBody,
        on_complete: Option<CompletionCallback>,
    ) {
        self.tasks.push(Task {
            label: label.into(),
            body,
            on_complete,
        });
    }

    /// Polls `handle` once per tick and completes on the first tick that sees it done.
    pub fn watch(
        &mut self,
        label: impl Into<String>,
        handle: MethodHandle,
        on_complete: Option<CompletionCallback>,
    ) {
        let body = std::iter::from_fn(move || (!handle.is_done()).then_some(Ok(())));
        self.run(label, Box::new(body), on_complete);
    }

    /// Advances one frame. Failed tasks are dropped without running their completion.
    pub fn tick(&mut self, delta_seconds: f32) -> Vec<TaskFailure> {
        self.frame = self.frame.saturating_add(1);

        for action in self.actions.values_mut() {
            action(delta_seconds);
        }

        let mut finished = Vec::new();
        let mut failures = Vec::new();
        let mut index = 0usize;
        while index < self.tasks.len() {
            match self.tasks[index].body.next() {
                Some(Ok(())) => index += 1,
                Some(Err(source)) => {
                    let task = self.tasks.remove(index);
                    failures.push(TaskFailure {
                        label: task.label,
                        source,
                    });
                }
                None => finished.push(self.tasks.remove(index)),
            }
        }

        for task in finished {
            if let Some(on_complete) = task.on_complete {
                on_complete();
            }
        }

        failures
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    fn frames(count: usize) -> CoroutineBody {
        Box::new((0..count).map(|_| Ok(())))
    }

    #[test]
    fn empty_coroutine_completes_on_next_tick_not_inline() {
        let mut runner = TaskRunner::new();
        let done = Rc::new(Cell::new(false));
        let flag = done.clone();
        runner.run("empty", frames(0), Some(Box::new(move || flag.set(true))));

        assert!(!done.get());
        assert!(runner.tick(0.016).is_empty());
        assert!(done.get());
        assert_eq!(runner.pending_task_count(), 0);
    }

    #[test]
    fn coroutine_runs_one_step_per_tick() {
        let mut runner = TaskRunner::new();
        let done = Rc::new(Cell::new(false));
        let flag = done.clone();
        runner.run("three", frames(3), Some(Box::new(move || flag.set(true))));

        for _ in 0..3 {
            runner.tick(0.016);
            assert!(!done.get());
        }
        runner.tick(0.016);
        assert!(done.get());
    }

    #[test]
    fn watched_handle_completes_after_host_marks_done() {
        let mut runner = TaskRunner::new();
        let handle = MethodHandle::new();
        let done = Rc::new(Cell::new(false));
        let flag = done.clone();
        runner.watch("handle", handle.clone(), Some(Box::new(move || flag.set(true))));

        runner.tick(0.016);
        runner.tick(0.016);
        assert!(!done.get());

        handle.complete();
        runner.tick(0.016);
        assert!(done.get());
    }

    #[test]
    fn failing_step_is_reported_and_skips_completion() {
        let mut runner = TaskRunner::new();
        let done = Rc::new(Cell::new(false));
        let flag = done.clone();
        let body: CoroutineBody = Box::new(
            vec![Ok(()), Err(HostError::from("disk on fire"))].into_iter(),
        );
        runner.run("failing", body, Some(Box::new(move || flag.set(true))));

        assert!(runner.tick(0.016).is_empty());
        let failures = runner.tick(0.016);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].label, "failing");
        assert_eq!(failures[0].source.to_string(), "disk on fire");
        assert!(!done.get());
        assert_eq!(runner.pending_task_count(), 0);
    }

    #[test]
    fn actions_run_every_tick_until_deleted() {
        let mut runner = TaskRunner::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        runner.set_action("record", Box::new(move |dt| sink.borrow_mut().push(dt)));
        assert!(runner.contains_action("record"));

        runner.tick(0.5);
        runner.tick(0.25);
        assert!(runner.delete_action("record"));
        runner.tick(1.0);

        assert_eq!(*seen.borrow(), vec![0.5, 0.25]);
        assert_eq!(runner.frame(), 3);
    }
}
