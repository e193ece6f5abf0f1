//! LockClient scoped acquisition and direct calls

mod common;

use std::time::Duration;

use common::{FakeLockServer, Op, policy};
use ldlm_client::{ClientError, LockOptions};

#[tokio::test(start_paused = true)]
async fn test_with_lock_releases_after_critical_section() {
    let server = FakeLockServer::new();
    let client = server.client(policy(3));
    let options = LockOptions::new().with_lease_timeout(20);

    let observer = server.clone();
    let result = client
        .with_lock("work-item-aio1", &options, async |handle| {
            assert!(handle.is_locked());
            assert!(observer.is_held("work-item-aio1"));
            tokio::time::sleep(Duration::from_secs(15)).await;
            handle.key().map(str::to_string)
        })
        .await
        .unwrap();

    assert!(result.is_some());
    assert!(!server.is_held("work-item-aio1"));
    assert_eq!(server.count(Op::Lock), 1);
    assert_eq!(server.count(Op::RefreshLock), 1);
    assert_eq!(server.count(Op::Unlock), 1);
}

#[tokio::test(start_paused = true)]
async fn test_with_try_lock_runs_body_when_contended() {
    let server = FakeLockServer::new();
    server.hold("work-item", "other");
    let client = server.client(policy(3));

    let ran = client
        .with_try_lock("work-item", &LockOptions::new(), async |handle| {
            assert!(!handle.is_locked());
            true
        })
        .await
        .unwrap();

    assert!(ran);
    assert_eq!(server.count(Op::Unlock), 0);
    assert!(server.is_held("work-item"));
}

#[tokio::test(start_paused = true)]
async fn test_with_lock_surfaces_wait_timeout_when_raising() {
    let server = FakeLockServer::new();
    server.hold("work-item", "other");
    let client = server.client(policy(3));
    let options = LockOptions::new()
        .with_wait_timeout(2)
        .raise_on_wait_timeout(true);

    let result = client
        .with_lock("work-item", &options, async |_| ())
        .await;

    assert!(matches!(result, Err(ClientError::LockWaitTimeout)));
}

#[tokio::test(start_paused = true)]
async fn test_try_lock_rejects_wait_timeout() {
    let server = FakeLockServer::new();
    let client = server.client(policy(3));
    let options = LockOptions::new().with_wait_timeout(5);

    let result = client.try_lock("work-item", &options).await;
    assert!(matches!(result, Err(ClientError::InvalidRequest(_))));
    assert!(server.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_lock_returns_owning_session() {
    let server = FakeLockServer::new();
    let client = server.client(policy(3));

    let mut session = client
        .lock("work-item", &LockOptions::new().with_lease_timeout(40))
        .await
        .unwrap();
    assert!(session.is_locked());
    assert!(session.is_renewing());

    session.release().await.unwrap();
    assert!(!server.is_held("work-item"));
}

#[tokio::test(start_paused = true)]
async fn test_manual_refresh_and_unlock() {
    let server = FakeLockServer::new();
    let client = server.client(policy(3)).with_auto_refresh(false);

    let session = client
        .try_lock("work-item", &LockOptions::new().with_lease_timeout(20))
        .await
        .unwrap();
    let key = session.handle().unwrap().key().unwrap().to_string();

    let response = client.refresh_lock("work-item", &key, 20).await.unwrap();
    assert!(response.locked);

    let result = client.refresh_lock("work-item", "wrong", 20).await;
    assert!(matches!(result, Err(ClientError::InvalidLockKey)));

    assert!(client.unlock("work-item", &key).await.unwrap());
    assert!(!server.is_held("work-item"));

    // Already released server-side
    let result = client.unlock("work-item", &key).await;
    assert!(matches!(result, Err(ClientError::NotLocked)));

    // The session still believes it holds the lock and releases on drop
    drop(session);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(server.count(Op::Unlock), 3);
}

#[tokio::test(start_paused = true)]
async fn test_direct_calls_validate_arguments() {
    let server = FakeLockServer::new();
    let client = server.client(policy(3));

    assert!(matches!(
        client.unlock("", "key").await,
        Err(ClientError::InvalidRequest(_))
    ));
    assert!(matches!(
        client.refresh_lock("work-item", "", 20).await,
        Err(ClientError::InvalidRequest(_))
    ));
    assert!(server.calls().is_empty());
}
