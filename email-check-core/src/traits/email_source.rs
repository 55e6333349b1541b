//! Email source abstract Trait

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::CheckResult;
use crate::types::EmailRecord;

/// Email source Trait
///
/// Supplies candidate addresses page by page (a database table, a queue, a file).
/// Provides the in-memory implementation `StaticEmailSource`.
#[async_trait]
pub trait EmailSource: Send + Sync {
    /// Total number of records available.
    async fn count(&self) -> CheckResult<usize>;

    /// Fetch up to `limit` records starting at `offset`.
    async fn fetch(&self, limit: usize, offset: usize) -> CheckResult<Vec<EmailRecord>>;
}

/// In-memory email source
#[derive(Clone, Default)]
pub struct StaticEmailSource {
    records: Arc<RwLock<Vec<EmailRecord>>>,
}

impl StaticEmailSource {
    /// Create a source over `emails`, in order.
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            records: Arc::new(RwLock::new(
                emails.into_iter().map(EmailRecord::new).collect(),
            )),
        }
    }

    /// Append one address.
    pub async fn push(&self, email: impl Into<String>) {
        self.records.write().await.push(EmailRecord::new(email));
    }
}

#[async_trait]
impl EmailSource for StaticEmailSource {
    async fn count(&self) -> CheckResult<usize> {
        Ok(self.records.read().await.len())
    }

    async fn fetch(&self, limit: usize, offset: usize) -> CheckResult<Vec<EmailRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().skip(offset).take(limit).cloned().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source_pages() {
        let source = StaticEmailSource::new(["a@x.com", "b@x.com", "c@x.com"]);
        source.push("d@x.com").await;

        assert_eq!(source.count().await.unwrap(), 4);
        let page = source.fetch(2, 1).await.unwrap();
        assert_eq!(
            page,
            vec![EmailRecord::new("b@x.com"), EmailRecord::new("c@x.com")]
        );
        assert!(source.fetch(10, 10).await.unwrap().is_empty());
    }
}
