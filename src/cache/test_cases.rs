use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::{
    errors::Result,
    models::{problem::ProblemRef, test_case::CachedTestCase},
    repositories::{problem::ProblemRepositoryTrait, test_case::TestCaseRepositoryTrait},
};

use super::{
    KeyValueStoreTrait, PROBLEM_TTL_SECONDS, TESTCASE_TTL_SECONDS, problem_key, testcases_key,
};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TestCaseCacheTrait: Send + Sync {
    /// Ordered test-case list for a problem, from the cache when possible.
    async fn get(&self, problem_id: i64, force_refresh: bool) -> Result<Vec<CachedTestCase>>;
    /// Called by whatever CRUD layer edits test cases.
    async fn invalidate(&self, problem_id: i64) -> Result<()>;
}

/// Test cases rarely change, so reads go through the key-value store with a
/// one-hour TTL. The relational store stays authoritative; losing the cache
/// only costs a re-query.
pub struct TestCaseCache {
    store: Arc<dyn KeyValueStoreTrait>,
    test_case_repository: Arc<dyn TestCaseRepositoryTrait>,
}

impl TestCaseCache {
    pub fn new(
        store: Arc<dyn KeyValueStoreTrait>,
        test_case_repository: Arc<dyn TestCaseRepositoryTrait>,
    ) -> Self {
        Self {
            store,
            test_case_repository,
        }
    }
}

#[async_trait]
impl TestCaseCacheTrait for TestCaseCache {
    async fn get(&self, problem_id: i64, force_refresh: bool) -> Result<Vec<CachedTestCase>> {
        let key = testcases_key(problem_id);

        if !force_refresh
            && let Some(raw) = self.store.get(&key).await?
        {
            match serde_json::from_str::<Vec<CachedTestCase>>(&raw) {
                Ok(cached) => return Ok(cached),
                Err(e) => {
                    // A corrupt entry falls through to a refresh.
                    tracing::warn!(problem_id, error = %e, "Discarding undecodable test-case cache entry");
                }
            }
        }

        let test_cases: Vec<CachedTestCase> = self
            .test_case_repository
            .find_by_problem(problem_id)
            .await?
            .into_iter()
            .map(CachedTestCase::from)
            .collect();

        let serialized = serde_json::to_string(&test_cases)?;
        self.store
            .set_ex(&key, &serialized, TESTCASE_TTL_SECONDS)
            .await?;

        Ok(test_cases)
    }

    async fn invalidate(&self, problem_id: i64) -> Result<()> {
        self.store.delete(&testcases_key(problem_id)).await
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProblemCacheTrait: Send + Sync {
    async fn get(&self, problem_id: i64) -> Result<Option<ProblemRef>>;
}

/// Problem metadata the worker needs (currently just `function_name`),
/// cached for five minutes.
pub struct ProblemCache {
    store: Arc<dyn KeyValueStoreTrait>,
    problem_repository: Arc<dyn ProblemRepositoryTrait>,
}

impl ProblemCache {
    pub fn new(
        store: Arc<dyn KeyValueStoreTrait>,
        problem_repository: Arc<dyn ProblemRepositoryTrait>,
    ) -> Self {
        Self {
            store,
            problem_repository,
        }
    }
}

#[async_trait]
impl ProblemCacheTrait for ProblemCache {
    async fn get(&self, problem_id: i64) -> Result<Option<ProblemRef>> {
        let key = problem_key(problem_id);

        if let Some(raw) = self.store.get(&key).await?
            && let Ok(problem) = serde_json::from_str::<ProblemRef>(&raw)
        {
            return Ok(Some(problem));
        }

        let problem = self.problem_repository.find_ref(problem_id).await?;

        if let Some(ref p) = problem {
            let serialized = serde_json::to_string(p)?;
            self.store
                .set_ex(&key, &serialized, PROBLEM_TTL_SECONDS)
                .await?;
        }

        Ok(problem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MockKeyValueStoreTrait;
    use crate::models::test_case::TestCase;
    use crate::repositories::problem::MockProblemRepositoryTrait;
    use crate::repositories::test_case::MockTestCaseRepositoryTrait;
    use mockall::predicate::eq;

    fn test_case(id: i64, order: i32, hidden: bool) -> TestCase {
        TestCase {
            id,
            problem_id: 1,
            input: format!("in{id}"),
            expected_output: format!("out{id}"),
            is_hidden: hidden,
            order,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn cache_hit_skips_the_repository() {
        let cached = vec![CachedTestCase {
            id: 1,
            input: "in1".into(),
            expected_output: "out1".into(),
            order: 1,
            is_hidden: false,
        }];
        let raw = serde_json::to_string(&cached).unwrap();

        let mut store = MockKeyValueStoreTrait::new();
        store
            .expect_get()
            .with(eq("cache:testcases:1"))
            .returning(move |_| Ok(Some(raw.clone())));

        let mut repo = MockTestCaseRepositoryTrait::new();
        repo.expect_find_by_problem().never();

        let cache = TestCaseCache::new(Arc::new(store), Arc::new(repo));
        let got = cache.get(1, false).await.unwrap();
        assert_eq!(got, cached);
    }

    #[tokio::test]
    async fn cache_miss_queries_and_writes_back_with_ttl() {
        let mut store = MockKeyValueStoreTrait::new();
        store.expect_get().returning(|_| Ok(None));
        store
            .expect_set_ex()
            .withf(|key, value, ttl| {
                key == "cache:testcases:1"
                    && *ttl == TESTCASE_TTL_SECONDS
                    && value.contains("\"in1\"")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut repo = MockTestCaseRepositoryTrait::new();
        repo.expect_find_by_problem()
            .with(eq(1))
            .returning(|_| Ok(vec![test_case(1, 1, false), test_case(2, 2, true)]));

        let cache = TestCaseCache::new(Arc::new(store), Arc::new(repo));
        let got = cache.get(1, false).await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].id, 1);
        assert!(got[1].is_hidden);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_the_cached_entry() {
        let mut store = MockKeyValueStoreTrait::new();
        store.expect_get().never();
        store.expect_set_ex().returning(|_, _, _| Ok(()));

        let mut repo = MockTestCaseRepositoryTrait::new();
        repo.expect_find_by_problem()
            .times(1)
            .returning(|_| Ok(vec![]));

        let cache = TestCaseCache::new(Arc::new(store), Arc::new(repo));
        let got = cache.get(1, true).await.unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn invalidate_deletes_the_key() {
        let mut store = MockKeyValueStoreTrait::new();
        store
            .expect_delete()
            .with(eq("cache:testcases:9"))
            .times(1)
            .returning(|_| Ok(()));

        let repo = MockTestCaseRepositoryTrait::new();
        let cache = TestCaseCache::new(Arc::new(store), Arc::new(repo));
        cache.invalidate(9).await.unwrap();
    }

    #[tokio::test]
    async fn problem_cache_misses_fall_back_to_the_repository() {
        let mut store = MockKeyValueStoreTrait::new();
        store.expect_get().returning(|_| Ok(None));
        store
            .expect_set_ex()
            .withf(|key, _, ttl| key == "cache:problem:3" && *ttl == PROBLEM_TTL_SECONDS)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut repo = MockProblemRepositoryTrait::new();
        repo.expect_find_ref().with(eq(3)).returning(|_| {
            Ok(Some(ProblemRef {
                id: 3,
                function_name: Some("twoSum".into()),
            }))
        });

        let cache = ProblemCache::new(Arc::new(store), Arc::new(repo));
        let got = cache.get(3).await.unwrap().unwrap();
        assert_eq!(got.function_name.as_deref(), Some("twoSum"));
    }

    #[tokio::test]
    async fn problem_cache_does_not_cache_missing_problems() {
        let mut store = MockKeyValueStoreTrait::new();
        store.expect_get().returning(|_| Ok(None));
        store.expect_set_ex().never();

        let mut repo = MockProblemRepositoryTrait::new();
        repo.expect_find_ref().returning(|_| Ok(None));

        let cache = ProblemCache::new(Arc::new(store), Arc::new(repo));
        assert!(cache.get(404).await.unwrap().is_none());
    }
}
