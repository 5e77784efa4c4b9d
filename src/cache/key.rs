use std::fmt;

use crate::client::{
    self, AnalyticsSummary, Collection, DeadLetterEntry, Entity, Page, Resource, ResourceApi, Run,
    Task,
};

/// One element of a key's ordered parameter tuple
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Name(&'static str),
    Id(i64),
    Param(&'static str, usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Name(name) => f.write_str(name),
            Segment::Id(id) => write!(f, "{}", id),
            Segment::Param(name, value) => write!(f, "{}={}", name, value),
        }
    }
}

/// Identity of a cached query: resource plus its parameters.
///
/// The status filter is not part of a key: it narrows a fetched page
/// locally and never selects a different server query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Tasks { page: Page },
    Task { id: i64 },
    Runs { task_id: i64, page: Page },
    DeadLetters { task_id: i64, page: Page },
    AnalyticsSummary,
}

impl QueryKey {
    pub fn segments(&self) -> Vec<Segment> {
        match self {
            QueryKey::Tasks { page } => vec![
                Segment::Name("tasks"),
                Segment::Param("limit", page.limit),
                Segment::Param("offset", page.offset),
            ],
            QueryKey::Task { id } => vec![Segment::Name("tasks"), Segment::Id(*id)],
            QueryKey::Runs { task_id, page } => vec![
                Segment::Name("runs"),
                Segment::Id(*task_id),
                Segment::Param("limit", page.limit),
                Segment::Param("offset", page.offset),
            ],
            QueryKey::DeadLetters { task_id, page } => vec![
                Segment::Name("dlq"),
                Segment::Id(*task_id),
                Segment::Param("limit", page.limit),
                Segment::Param("offset", page.offset),
            ],
            QueryKey::AnalyticsSummary => vec![Segment::Name("analytics"), Segment::Name("summary")],
        }
    }

    /// Issue the request this key stands for
    pub async fn fetch(&self, api: &dyn ResourceApi) -> client::Result<QueryData> {
        let data = match self {
            QueryKey::Tasks { page } => QueryData::Collection(api.list(Resource::Tasks, *page).await?),
            QueryKey::Task { id } => QueryData::Entity(api.get(Resource::Tasks, Some(*id)).await?),
            QueryKey::Runs { task_id, page } => QueryData::Collection(
                api.list(Resource::Runs { task_id: *task_id }, *page).await?,
            ),
            QueryKey::DeadLetters { task_id, page } => QueryData::Collection(
                api.list(Resource::DeadLetters { task_id: *task_id }, *page)
                    .await?,
            ),
            QueryKey::AnalyticsSummary => {
                QueryData::Entity(api.get(Resource::Analytics, None).await?)
            }
        };
        Ok(data)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_segments(f, &self.segments())
    }
}

/// Leading segments shared by a family of keys, e.g. `runs:3`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPrefix(Vec<Segment>);

impl KeyPrefix {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// Matches every key
    pub fn all() -> Self {
        Self(Vec::new())
    }

    pub fn tasks() -> Self {
        Self(vec![Segment::Name("tasks")])
    }

    pub fn runs(task_id: i64) -> Self {
        Self(vec![Segment::Name("runs"), Segment::Id(task_id)])
    }

    pub fn dead_letters(task_id: i64) -> Self {
        Self(vec![Segment::Name("dlq"), Segment::Id(task_id)])
    }

    pub fn analytics() -> Self {
        Self(vec![Segment::Name("analytics")])
    }

    pub fn matches(&self, key: &QueryKey) -> bool {
        key.segments().starts_with(&self.0)
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("*");
        }
        write_segments(f, &self.0)
    }
}

fn write_segments(f: &mut fmt::Formatter<'_>, segments: &[Segment]) -> fmt::Result {
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            f.write_str(":")?;
        }
        write!(f, "{}", segment)?;
    }
    Ok(())
}

/// Last-known server value behind a key
#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    Collection(Collection),
    Entity(Entity),
}

impl QueryData {
    /// Rows in the fetched page; singletons count as one row
    pub fn row_count(&self) -> usize {
        match self {
            QueryData::Collection(collection) => collection.len(),
            QueryData::Entity(_) => 1,
        }
    }

    pub fn tasks(&self) -> Option<&[Task]> {
        match self {
            QueryData::Collection(Collection::Tasks(rows)) => Some(rows),
            _ => None,
        }
    }

    pub fn runs(&self) -> Option<&[Run]> {
        match self {
            QueryData::Collection(Collection::Runs(rows)) => Some(rows),
            _ => None,
        }
    }

    pub fn dead_letters(&self) -> Option<&[DeadLetterEntry]> {
        match self {
            QueryData::Collection(Collection::DeadLetters(rows)) => Some(rows),
            _ => None,
        }
    }

    pub fn task(&self) -> Option<&Task> {
        match self {
            QueryData::Entity(Entity::Task(task)) => Some(task),
            _ => None,
        }
    }

    pub fn summary(&self) -> Option<&AnalyticsSummary> {
        match self {
            QueryData::Entity(Entity::Summary(summary)) => Some(summary),
            _ => None,
        }
    }
}
