mod common;

use anyhow::Result;
use common::{OWNER, StandardRoster, parse_date, record_equal_bill, record_settlement, test_service};
use splitbook::Repository;
use splitbook::application::SplitService;
use splitbook::domain::{Direction, Settlement};
use tempfile::TempDir;

/// Build a repository for pre-seeding legacy data before a service sees it
async fn seeded_repo() -> Result<(Repository, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.to_str().unwrap());
    let repo = Repository::init(&db_url).await?;
    Ok((repo, temp_dir))
}

#[tokio::test]
async fn test_legacy_settlements_are_backfilled_once() -> Result<()> {
    let (repo, _temp) = seeded_repo().await?;

    // Legacy records: no direction tag
    let legacy = vec![
        Settlement::new(OWNER, "alice", 1000, parse_date("2024-01-10")),
        Settlement::new("alice", OWNER, 500, parse_date("2024-01-20")),
    ];
    repo.save_settlements(OWNER, "alice", &legacy).await?;

    let service = SplitService::new(repo, OWNER);
    let history = service.settlements_between(OWNER, "alice").await?;

    assert_eq!(history[0].direction, Some(Direction::UserToFriend));
    assert_eq!(history[1].direction, Some(Direction::FriendToUser));

    // The backfill was persisted: a raw reload sees the tags
    let reloaded = service.settlements_between(OWNER, "alice").await?;
    assert_eq!(reloaded[0].direction, Some(Direction::UserToFriend));

    Ok(())
}

#[tokio::test]
async fn test_third_party_settlements_stay_untagged() -> Result<()> {
    let (repo, _temp) = seeded_repo().await?;

    let legacy = vec![Settlement::new(
        "alice",
        "bob",
        1000,
        parse_date("2024-01-10"),
    )];
    repo.save_settlements("alice", "bob", &legacy).await?;

    let service = SplitService::new(repo, OWNER);
    let history = service.settlements_between("alice", "bob").await?;

    // Neither party is the account owner, so there is nothing to infer
    assert_eq!(history[0].direction, None);

    Ok(())
}

#[tokio::test]
async fn test_new_settlements_carry_a_direction_tag() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardRoster::create_basic(&service).await?;

    let paid = service
        .record_settlement(OWNER, "alice", 1000, parse_date("2024-03-01"), None)
        .await?;
    assert_eq!(paid.direction, Some(Direction::UserToFriend));

    let received = service
        .record_settlement("alice", OWNER, 500, parse_date("2024-03-02"), None)
        .await?;
    assert_eq!(received.direction, Some(Direction::FriendToUser));

    Ok(())
}

#[tokio::test]
async fn test_settlement_history_is_shared_per_unordered_pair() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardRoster::create_basic(&service).await?;

    record_settlement(&service, OWNER, "alice", 1000, "2024-03-01").await?;
    record_settlement(&service, "alice", OWNER, 500, "2024-03-02").await?;

    // Both directions land in the same history, whichever way we ask
    let history = service.settlements_between(OWNER, "alice").await?;
    assert_eq!(history.len(), 2);
    let flipped = service.settlements_between("alice", OWNER).await?;
    assert_eq!(flipped.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_settlement_rejects_non_positive_amount() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardRoster::create_basic(&service).await?;

    let result = service
        .record_settlement(OWNER, "alice", 0, parse_date("2024-03-01"), None)
        .await;
    assert!(result.is_err());

    let result = service
        .record_settlement(OWNER, "alice", -100, parse_date("2024-03-01"), None)
        .await;
    assert!(result.is_err());

    Ok(())
}

#[tokio::test]
async fn test_settlement_with_unrelated_payer_does_not_move_the_balance() -> Result<()> {
    let (repo, _temp) = seeded_repo().await?;

    // A corrupt record between two strangers filed under our pair key
    let stray = vec![Settlement::new(
        "dave",
        "erin",
        9999,
        parse_date("2024-03-02"),
    )];
    repo.save_settlements(OWNER, "alice", &stray).await?;

    let service = SplitService::new(repo, OWNER);
    service.add_friend("alice").await?;
    record_equal_bill(&service, "alice", 4000, &[OWNER, "alice"], "2024-03-01").await?;

    let overview = service.friend_overview("alice").await?;
    assert_eq!(overview.balance.you_owe, 2000);

    Ok(())
}

#[tokio::test]
async fn test_settlement_note_round_trips() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardRoster::create_basic(&service).await?;

    service
        .record_settlement(
            OWNER,
            "alice",
            1000,
            parse_date("2024-03-01"),
            Some("bank transfer".to_string()),
        )
        .await?;

    let history = service.settlements_between(OWNER, "alice").await?;
    assert_eq!(history[0].note.as_deref(), Some("bank transfer"));

    Ok(())
}
