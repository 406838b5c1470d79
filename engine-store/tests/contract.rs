use engine_store::InMemoryTaskRepository;
use std::sync::Arc;

#[tokio::test]
async fn in_memory_repository_satisfies_the_contract() {
    let repo = Arc::new(InMemoryTaskRepository::new());
    engine_core::testing::test_repository_contract(repo).await;
}
