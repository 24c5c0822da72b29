use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::contact::Contact;
use super::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    #[default]
    All,
    Today,
    Overdue,
    Completed,
    Pending,
}

impl TaskFilter {
    pub const ALL: [TaskFilter; 5] = [
        Self::All,
        Self::Today,
        Self::Overdue,
        Self::Completed,
        Self::Pending,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Today => "today",
            Self::Overdue => "overdue",
            Self::Completed => "completed",
            Self::Pending => "pending",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "All Tasks",
            Self::Today => "Due Today",
            Self::Overdue => "Overdue",
            Self::Completed => "Completed",
            Self::Pending => "Pending",
        }
    }

    pub fn accepts(&self, task: &Task, now: NaiveDateTime) -> bool {
        match self {
            Self::All => true,
            Self::Today => task.is_due_on(now.date()),
            Self::Overdue => task.is_overdue(now),
            Self::Completed => task.completed,
            Self::Pending => !task.completed,
        }
    }
}

impl FromStr for TaskFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown filter '{}' (expected all, today, overdue, completed or pending)",
                    s
                )
            })
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Contact linked to `task`, if the reference resolves locally.
pub fn linked_contact<'a>(task: &Task, contacts: &'a [Contact]) -> Option<&'a Contact> {
    let id = task.contact_id?;
    contacts.iter().find(|c| c.id == id)
}

/// Task list view: text search, then category filter, then ordering.
///
/// Always computed from the full task list. Ordering puts incomplete tasks
/// first, overdue before the rest among those, then ascending due date.
/// Unparseable due dates sort last within their group. The sort is stable.
pub fn visible_tasks<'a>(
    tasks: &'a [Task],
    contacts: &[Contact],
    search: &str,
    filter: TaskFilter,
    now: NaiveDateTime,
) -> Vec<&'a Task> {
    // A blank term shows everything; otherwise the term is matched as typed,
    // surrounding spaces included.
    let needle = search.to_lowercase();
    let searching = !search.trim().is_empty();

    let mut visible: Vec<&Task> = tasks
        .iter()
        .filter(|task| {
            if !searching {
                return true;
            }
            task.title.to_lowercase().contains(&needle)
                || linked_contact(task, contacts)
                    .is_some_and(|c| c.name.to_lowercase().contains(&needle))
        })
        .filter(|task| filter.accepts(task, now))
        .collect();

    visible.sort_by(|a, b| compare_tasks(a, b, now));
    visible
}

fn compare_tasks(a: &Task, b: &Task, now: NaiveDateTime) -> Ordering {
    a.completed
        .cmp(&b.completed)
        .then_with(|| b.is_overdue(now).cmp(&a.is_overdue(now)))
        .then_with(|| match (a.due(), b.due()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// Counts over the unfiltered task list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub overdue: usize,
    pub today: usize,
    pub completed: usize,
    pub pending: usize,
}

impl TaskStats {
    pub fn compute(tasks: &[Task], now: NaiveDateTime) -> Self {
        let mut stats = Self::default();
        for task in tasks {
            if task.completed {
                stats.completed += 1;
                continue;
            }
            stats.pending += 1;
            if task.is_overdue(now) {
                stats.overdue += 1;
            }
            if task.is_due_on(now.date()) {
                stats.today += 1;
            }
        }
        stats
    }
}

/// "Showing 3 of 10 tasks in overdue matching "ada""
pub fn summary(shown: usize, total: usize, filter: TaskFilter, search: &str) -> String {
    let mut line = format!("Showing {} of {} tasks", shown, total);
    if filter != TaskFilter::All {
        line.push_str(&format!(" in {}", filter.label().to_lowercase()));
    }
    if !search.is_empty() {
        line.push_str(&format!(" matching \"{}\"", search));
    }
    line
}
