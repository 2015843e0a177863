//! `IamService` behavior on top of the REST-level fake

mod common;

use common::*;
use gcp_service_account_controller::config::{ControllerConfig, Mode, OwnershipPolicy};
use gcp_service_account_controller::provider::gcp::IamService;
use gcp_service_account_controller::provider::{IamBackend, IamError};
use std::sync::atomic::Ordering;

fn prefix_service() -> (FakeApi, IamService<FakeApi>) {
    let api = FakeApi::default();
    let service =
        IamService::new(api.clone(), &config(Mode::Create)).expect("service should build");
    (api, service)
}

fn display_name_service() -> (FakeApi, IamService<FakeApi>) {
    let api = FakeApi::default();
    let config = ControllerConfig {
        ownership: OwnershipPolicy::DisplayName("local".to_string()),
        ..(*config(Mode::Create)).clone()
    };
    let service = IamService::new(api.clone(), &config).expect("service should build");
    (api, service)
}

#[tokio::test]
async fn test_create_uses_prefix_and_display_name() {
    let (api, service) = prefix_service();

    let account = service
        .create_account(" svc ")
        .await
        .expect("create should succeed");

    assert!(account.email.starts_with("ctl-svc-"));
    assert!(account.email.ends_with("@sa-container.iam.gserviceaccount.com"));
    let calls = api.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].starts_with("get_account:ctl-svc-"));
    assert!(calls[1].starts_with("create_account:ctl-svc-"));
    assert!(calls[1].ends_with(":ctl/svc"));
}

#[tokio::test]
async fn test_create_regenerates_taken_ids() {
    let (api, service) = prefix_service();
    api.collisions.store(3, Ordering::SeqCst);

    service
        .create_account("svc")
        .await
        .expect("create should succeed");

    let calls = api.calls();
    assert_eq!(
        calls.iter().filter(|c| c.starts_with("get_account:")).count(),
        4
    );
    assert_eq!(
        calls.iter().filter(|c| c.starts_with("create_account:")).count(),
        1
    );
}

#[tokio::test]
async fn test_create_gives_up_when_every_id_is_taken() {
    let (api, service) = prefix_service();
    api.collisions.store(100, Ordering::SeqCst);

    let result = service.create_account("svc").await;

    assert!(matches!(result, Err(IamError::Backend(_))));
    assert!(!api.calls().iter().any(|c| c.starts_with("create_account:")));
}

#[tokio::test]
async fn test_create_rejects_bad_names_without_calls() {
    let (api, service) = prefix_service();

    assert!(matches!(
        service.create_account("ab").await,
        Err(IamError::Validation(_))
    ));
    assert!(matches!(
        service.create_account(&"x".repeat(70)).await,
        Err(IamError::Validation(_))
    ));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_find_picks_largest_unique_id() {
    let (api, service) = prefix_service();
    api.add_account("ctl-svc-aaaa", "ctl/svc", "9");
    let newest = api.add_account("ctl-svc-bbbb", "ctl/svc", "100");
    api.add_account("ctl-svc-cccc", "ctl/svc", "12");
    api.add_account("ctl-web-dddd", "ctl/web", "1000");

    let account = service
        .find_account_by_logical_name("svc")
        .await
        .expect("account should be found");

    assert_eq!(account.name, newest);
}

#[tokio::test]
async fn test_find_without_match_is_not_found() {
    let (api, service) = prefix_service();
    api.add_account("ctl-web-dddd", "ctl/web", "1");

    assert!(matches!(
        service.find_account_by_logical_name("svc").await,
        Err(IamError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_foreign_names_are_refused_before_any_call() {
    let (api, service) = prefix_service();
    let other_project =
        "projects/other/serviceAccounts/ctl-svc-abcd@other.iam.gserviceaccount.com";
    let other_prefix = canonical_name("team-svc-abcd");

    for name in [other_project, other_prefix.as_str()] {
        assert!(matches!(
            service.create_key(name).await,
            Err(IamError::PolicyViolation { .. })
        ));
        assert!(matches!(
            service.purge_keys(name, chrono::Duration::hours(1)).await,
            Err(IamError::PolicyViolation { .. })
        ));
        assert!(matches!(
            service.delete_account(name).await,
            Err(IamError::PolicyViolation { .. })
        ));
        assert!(matches!(
            service.set_permissions(name, &[]).await,
            Err(IamError::PolicyViolation { .. })
        ));
    }
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_create_key_returns_material() {
    let (_api, service) = prefix_service();
    let name = canonical_name("ctl-svc-abcd");

    let key = service.create_key(&name).await.expect("key should be created");

    assert_eq!(key.name, format!("{name}/keys/new"));
    assert!(!key.private_key_data.is_empty());
}

#[tokio::test]
async fn test_purge_keeps_newest_key() {
    let (api, service) = prefix_service();
    let name = api.add_account("ctl-svc-abcd", "ctl/svc", "1");
    api.add_key(&name, "oldest", "2020-01-01T00:00:00Z");
    api.add_key(&name, "newest", "2020-03-01T00:00:00Z");
    api.add_key(&name, "middle", "2020-02-01T00:00:00Z");
    api.add_key(&name, "undated", "");

    let deleted = service
        .purge_keys(&name, chrono::Duration::hours(336))
        .await
        .expect("purge should succeed");

    assert_eq!(deleted, 2);
    assert_eq!(
        api.key_names(&name),
        vec![format!("{name}/keys/newest"), format!("{name}/keys/undated")]
    );
}

#[tokio::test]
async fn test_purge_spares_recent_keys() {
    let (api, service) = prefix_service();
    let name = api.add_account("ctl-svc-abcd", "ctl/svc", "1");
    let recent = (chrono::Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
    api.add_key(&name, "old", "2020-01-01T00:00:00Z");
    api.add_key(&name, "recent", &recent);
    api.add_key(&name, "current", &chrono::Utc::now().to_rfc3339());

    let deleted = service
        .purge_keys(&name, chrono::Duration::hours(336))
        .await
        .expect("purge should succeed");

    assert_eq!(deleted, 1);
    assert_eq!(api.key_names(&name).len(), 2);
}

#[tokio::test]
async fn test_display_name_policy() {
    let (api, service) = display_name_service();
    let owned = api.add_account("svc-abcd", "local/svc", "1");
    let foreign = api.add_account("svc-efgh", "elsewhere/svc", "2");
    let bare = api.add_account("svc-ijkl", "local/", "3");

    service
        .create_key(&owned)
        .await
        .expect("owned account should get a key");
    for name in [&foreign, &bare] {
        assert!(matches!(
            service.create_key(name).await,
            Err(IamError::PolicyViolation { .. })
        ));
    }
    assert!(!api.calls().iter().any(|c| c.contains("svc-efgh") && c.starts_with("create_key")));
}

#[tokio::test]
async fn test_display_name_policy_creates_unprefixed_ids() {
    let (api, service) = display_name_service();

    let account = service
        .create_account("svc")
        .await
        .expect("create should succeed");

    assert!(account.email.starts_with("svc-"));
    assert!(api
        .calls()
        .iter()
        .any(|c| c.starts_with("create_account:svc-") && c.ends_with(":local/svc")));
}

#[tokio::test]
async fn test_delete_of_missing_account_is_not_an_error() {
    let (api, service) = display_name_service();
    let owned = api.add_account("svc-abcd", "local/svc", "1");

    assert!(service
        .delete_account(&owned)
        .await
        .expect("delete should succeed"));
    assert!(!service
        .delete_account(&owned)
        .await
        .expect("second delete should succeed"));
}
