//! Filtering, sorting and pagination shared by every backend.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::error::{BoardError, Result};
use crate::id::SectionId;
use crate::priority::Priority;
use crate::task::Task;

/// Case-insensitive substring matcher for task titles.
struct TextMatcher {
    needle: String,
}

impl TextMatcher {
    /// Normalize a query string into a matcher. Returns `None` for blank inputs.
    fn new(query: &str) -> Option<Self> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            needle: trimmed.to_lowercase(),
        })
    }

    fn matches(&self, task: &Task) -> bool {
        task.title.to_lowercase().contains(&self.needle)
            || task.tags.iter().any(|tag| tag.to_lowercase().contains(&self.needle))
    }
}

/// Task filter; every populated field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    /// Free-text search over titles and tags.
    #[serde(default)]
    pub text: Option<String>,
    /// Restrict to one section.
    #[serde(default)]
    pub section: Option<SectionId>,
    /// Restrict to priorities.
    #[serde(default)]
    pub priorities: BTreeSet<Priority>,
    /// Restrict by completion flag.
    #[serde(default)]
    pub completed: Option<bool>,
    /// Restrict to an assignee.
    #[serde(default)]
    pub assignee: Option<String>,
    /// Tags that must all be present.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl TaskFilter {
    /// Returns true when no constraint is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().is_none_or(|text| text.trim().is_empty())
            && self.section.is_none()
            && self.priorities.is_empty()
            && self.completed.is_none()
            && self.assignee.is_none()
            && self.tags.is_empty()
    }

    /// Whether `task` satisfies the filter.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(matcher) = self.text.as_deref().and_then(TextMatcher::new)
            && !matcher.matches(task)
        {
            return false;
        }
        if self.section.as_ref().is_some_and(|section| section != &task.section) {
            return false;
        }
        if !self.priorities.is_empty() && !self.priorities.contains(&task.priority) {
            return false;
        }
        if self.completed.is_some_and(|completed| completed != task.completed) {
            return false;
        }
        if let Some(assignee) = &self.assignee
            && task.assignee.as_ref() != Some(assignee)
        {
            return false;
        }
        self.tags.is_subset(&task.tags)
    }
}

/// Sort field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Alphabetical by title.
    Title,
    /// By priority.
    Priority,
    /// By due date; tasks without one sort last.
    DueDate,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// Sort order. Ties are broken by task id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSort {
    /// Field to order by.
    pub key: SortKey,
    /// Direction.
    #[serde(default)]
    pub direction: SortDirection,
}

impl TaskSort {
    /// Compare two tasks under this ordering.
    #[must_use]
    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let primary = match self.key {
            SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortKey::Priority => a.priority.cmp(&b.priority),
            SortKey::DueDate => match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        };
        let primary = match self.direction {
            SortDirection::Ascending => primary,
            SortDirection::Descending => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// A `getTasks` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskQuery {
    /// 1-based page number.
    pub page_no: usize,
    /// Items per page.
    pub page_size: usize,
    /// Optional filter.
    #[serde(default)]
    pub filter: Option<TaskFilter>,
    /// Optional ordering; storage order otherwise.
    #[serde(default)]
    pub sort: Option<TaskSort>,
}

impl TaskQuery {
    /// First page of the given size, unfiltered and in storage order.
    #[must_use]
    pub const fn page(page_no: usize, page_size: usize) -> Self {
        Self {
            page_no,
            page_size,
            filter: None,
            sort: None,
        }
    }

    /// Same query, next page.
    #[must_use]
    pub fn next_page(&self) -> Self {
        Self {
            page_no: self.page_no + 1,
            ..self.clone()
        }
    }

    /// Run the query over tasks held in storage order.
    ///
    /// # Errors
    /// [`BoardError::InvalidPage`] for page 0 or a zero page size.
    pub fn run<'a, I>(&self, tasks: I) -> Result<Page<Task>>
    where
        I: IntoIterator<Item = &'a Task>,
    {
        if self.page_no == 0 || self.page_size == 0 {
            return Err(BoardError::InvalidPage {
                page_no: self.page_no,
                page_size: self.page_size,
            });
        }
        let mut matched: Vec<&Task> = tasks
            .into_iter()
            .filter(|task| self.filter.as_ref().is_none_or(|filter| filter.matches(task)))
            .collect();
        if let Some(sort) = &self.sort {
            matched.sort_by(|a, b| sort.compare(a, b));
        }

        let total_count = matched.len();
        let start = (self.page_no - 1).saturating_mul(self.page_size);
        let items: Vec<Task> = matched
            .into_iter()
            .skip(start)
            .take(self.page_size)
            .cloned()
            .collect();
        let has_next_page = start.saturating_add(items.len()) < total_count;

        Ok(Page {
            items,
            total_count,
            has_next_page,
            page_no: self.page_no,
            page_size: self.page_size,
        })
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Matches across all pages.
    pub total_count: usize,
    /// Whether another page follows.
    pub has_next_page: bool,
    /// This page's number (1-based).
    pub page_no: usize,
    /// Requested page size.
    pub page_size: usize,
}
