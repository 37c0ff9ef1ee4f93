use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::mem;

use crate::{Task, TaskDatabase, TaskId, TaskKind};

/// A flattened, executable plan.
///
/// Tasks live in one arena in execution order; a compound/recursive/abstract node is followed by
/// its subtree and children point back at it through `Task::parent`.
#[derive(Debug, Clone)]
pub struct Plan<A> {
    pub(crate) goal: Option<TaskId>,
    pub(crate) tasks: Vec<Task<A>>,
    pub(crate) cursor: usize,
    pub(crate) plan_path: Vec<TaskId>,
    pub(crate) implementations_used: BTreeMap<usize, Vec<usize>>,
    pub(crate) failed: bool,
    pub(crate) finished: bool,
}

impl<A> Default for Plan<A> {
    fn default() -> Self {
        Self {
            goal: None,
            tasks: Vec::new(),
            cursor: 0,
            plan_path: Vec::new(),
            implementations_used: BTreeMap::new(),
            failed: false,
            finished: false,
        }
    }
}

impl<A> Plan<A> {
    pub(crate) fn failed_for(goal: TaskId) -> Self {
        Self {
            goal: Some(goal),
            failed: true,
            ..Self::default()
        }
    }

    pub fn goal(&self) -> Option<TaskId> {
        self.goal
    }

    pub fn tasks(&self) -> &[Task<A>] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_task(&self) -> Option<&Task<A>> {
        self.tasks.get(self.cursor)
    }

    pub fn current_task_mut(&mut self) -> Option<&mut Task<A>> {
        self.tasks.get_mut(self.cursor)
    }

    /// Task ids the search chained together, in execution order (goal last).
    pub fn plan_path(&self) -> &[TaskId] {
        &self.plan_path
    }

    pub fn current_path_vertex(&self) -> Option<TaskId> {
        let task = self.current_task()?;
        self.plan_path.get(task.path_vertex).copied()
    }

    /// Implementation indices tried for the abstract node at `abstract_index`.
    pub fn implementations_used(&self, abstract_index: usize) -> &[usize] {
        self.implementations_used
            .get(&abstract_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Mark the current task (and thereby the plan) as failed, e.g. when the backend cannot perform
    /// its action.
    pub fn fail_current_task(&mut self) {
        if let Some(task) = self.tasks.get_mut(self.cursor) {
            task.failed = true;
        }
        self.failed = true;
    }

    /// Fraction of the plan path reached by the current task, for HUD overlays.
    pub fn progress(&self) -> f32 {
        if self.plan_path.is_empty() {
            return 0.0;
        }
        if self.finished && !self.failed {
            return 1.0;
        }
        let vertex = self.current_task().map(|t| t.path_vertex).unwrap_or(0);
        (vertex + 1) as f32 / self.plan_path.len() as f32
    }

    /// Indented tree of the flattened tasks; `>` marks the cursor.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (i, task) in self.tasks.iter().enumerate() {
            let depth = self.depth(i);
            let marker = if i == self.cursor { '>' } else { ' ' };
            let _ = write!(
                out,
                "{marker}{:>3} {}{} [{}]",
                i,
                "  ".repeat(depth),
                task.name,
                task.kind_name()
            );
            if task.failed {
                out.push_str(" failed");
            } else if task.started {
                out.push_str(" started");
            }
            out.push('\n');
        }
        out
    }

    fn depth(&self, index: usize) -> usize {
        let mut depth = 0;
        let mut parent = self.tasks.get(index).and_then(|t| t.parent);
        while let Some(p) = parent {
            depth += 1;
            parent = self.tasks.get(p).and_then(|t| t.parent);
            if depth > self.tasks.len() {
                break;
            }
        }
        depth
    }

    /// `true` if `index` lies in the subtree rooted at `root` (excluding `root`).
    pub(crate) fn descends_from(&self, index: usize, root: usize) -> bool {
        let mut parent = self.tasks.get(index).and_then(|t| t.parent);
        while let Some(p) = parent {
            if p == root {
                return true;
            }
            if p < root {
                return false;
            }
            parent = self.tasks.get(p).and_then(|t| t.parent);
        }
        false
    }

    /// One past the last index of `root`'s subtree.
    pub(crate) fn subtree_end(&self, root: usize) -> usize {
        let mut end = root + 1;
        while end < self.tasks.len() && self.descends_from(end, root) {
            end += 1;
        }
        end
    }
}

/// Append `task` and, for compound/recursive tasks, its subtasks (depth first) to `out`.
pub(crate) fn flatten_task<A>(
    out: &mut Vec<Task<A>>,
    mut task: Task<A>,
    parent: Option<usize>,
    path_vertex: usize,
) {
    task.parent = parent;
    task.path_vertex = path_vertex;

    let subtasks = match &mut task.kind {
        TaskKind::Compound { subtasks } => mem::take(subtasks),
        TaskKind::Recursive {
            subtasks,
            max_repeats,
        } => {
            task.remaining_repeats = *max_repeats;
            mem::take(subtasks)
        }
        TaskKind::Simple { .. } | TaskKind::Abstract => Vec::new(),
    };

    let index = out.len();
    out.push(task);

    let count = subtasks.len();
    for (i, mut sub) in subtasks.into_iter().enumerate() {
        sub.last_child = i + 1 == count;
        flatten_task(out, sub, Some(index), path_vertex);
    }
}

/// Flatten a search path (execution order, goal last) into plan tasks.
///
/// An implementation directly followed by the abstract task it implements is emitted as the
/// abstract node with the implementation's subtree below it; nested abstracts chain the same way.
/// Returns `None` if the path names a task the database does not know.
pub(crate) fn flatten_path<A: Clone>(
    path: &[TaskId],
    database: &TaskDatabase<A>,
) -> Option<(Vec<Task<A>>, BTreeMap<usize, Vec<usize>>)> {
    let mut tasks = Vec::new();
    let mut used = BTreeMap::new();

    let mut i = 0;
    while i < path.len() {
        let mut outer = i;
        while outer + 1 < path.len()
            && database
                .implementations(path[outer + 1])
                .is_some_and(|impls| impls.contains(&path[outer]))
        {
            outer += 1;
        }

        let mut parent = None;
        for vertex in (i + 1..=outer).rev() {
            let mut node = database.task(path[vertex])?.clone();
            node.last_child = parent.is_some();
            let index = tasks.len();
            flatten_task(&mut tasks, node, parent, vertex);

            let implementation = database
                .implementations(path[vertex])?
                .iter()
                .position(|id| *id == path[vertex - 1])?;
            used.insert(index, vec![implementation]);
            parent = Some(index);
        }

        let mut leaf = database.task(path[i])?.clone();
        leaf.last_child = parent.is_some();
        flatten_task(&mut tasks, leaf, parent, i);

        i = outer + 1;
    }

    Some((tasks, used))
}
