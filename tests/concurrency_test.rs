mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{customer_with_accounts, test_service};
use contabile::application::AppError;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposing_transfers_all_complete_and_conserve_money() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (_, accounts) = customer_with_accounts(&service, "Ada", &[500_00, 500_00]).await?;
    let (a, b) = (accounts[0], accounts[1]);

    // Alternate directions so lock ordering is exercised from both sides
    let service = Arc::new(service);
    let mut handles = Vec::new();
    for i in 0..20 {
        let service = Arc::clone(&service);
        let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
        handles.push(tokio::spawn(async move {
            service.transfer(from, to, 1_00).await
        }));
    }

    // Every transfer must finish; none may deadlock or fail
    for handle in handles {
        handle.await?.map_err(anyhow::Error::from)?;
    }

    // Equal traffic both ways: balances return to start, total conserved
    assert_eq!(service.balance(a).await?, 500_00);
    assert_eq!(service.balance(b).await?, 500_00);

    // Two opening deposits plus a debit/credit pair per transfer
    let entries = service.history(a).await?.len() + service.history(b).await?.len();
    assert_eq!(entries, 2 + 20 * 2);

    let report = service.check_integrity().await?;
    assert!(report.is_clean(), "issues: {:?}", report.issues());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposing_pair_commits_without_lost_update() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (_, accounts) = customer_with_accounts(&service, "Ada", &[10_00, 10_00]).await?;
    let (a, b) = (accounts[0], accounts[1]);

    let service = Arc::new(service);
    let forward = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.transfer(a, b, 1_00).await })
    };
    let backward = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.transfer(b, a, 50).await })
    };

    forward.await?.map_err(anyhow::Error::from)?;
    backward.await?.map_err(anyhow::Error::from)?;

    // Both applied: a nets -50, b nets +50, neither update lost
    assert_eq!(service.balance(a).await?, 9_50);
    assert_eq!(service.balance(b).await?, 10_50);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_debits_never_overdraw() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (_, accounts) = customer_with_accounts(&service, "Ada", &[10_00, 0]).await?;
    let (source, sink) = (accounts[0], accounts[1]);

    let service = Arc::new(service);
    let mut handles = Vec::new();
    for _ in 0..20 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.transfer(source, sink, 1_00).await
        }));
    }

    let mut committed = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => committed += 1,
            Err(AppError::InsufficientFunds { .. }) => refused += 1,
            Err(other) => return Err(other.into()),
        }
    }

    // The source covers exactly ten of the twenty attempts
    assert_eq!(committed, 10);
    assert_eq!(refused, 10);
    assert_eq!(service.balance(source).await?, 0);
    assert_eq!(service.balance(sink).await?, 10_00);

    let report = service.check_integrity().await?;
    assert!(report.is_clean(), "issues: {:?}", report.issues());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_transfers_over_disjoint_pairs_run_independently() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (_, accounts) =
        customer_with_accounts(&service, "Ada", &[100_00, 100_00, 100_00, 100_00]).await?;

    let service = Arc::new(service);
    let mut handles = Vec::new();
    for i in 0..10 {
        let service = Arc::clone(&service);
        let (from, to) = if i % 2 == 0 {
            (accounts[0], accounts[1])
        } else {
            (accounts[2], accounts[3])
        };
        handles.push(tokio::spawn(async move {
            service.transfer(from, to, 5_00).await
        }));
    }

    for handle in handles {
        handle.await?.map_err(anyhow::Error::from)?;
    }

    assert_eq!(service.balance(accounts[0]).await?, 75_00);
    assert_eq!(service.balance(accounts[1]).await?, 125_00);
    assert_eq!(service.balance(accounts[2]).await?, 75_00);
    assert_eq!(service.balance(accounts[3]).await?, 125_00);

    Ok(())
}
