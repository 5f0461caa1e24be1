use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pipeline::ConcurrencyGate;

#[tokio::test]
async fn test_gate_admits_up_to_capacity() -> Result<(), Box<dyn Error>> {
    let gate = ConcurrencyGate::new(2);
    let first = gate.acquire().await;
    let second = gate.acquire().await;
    assert_eq!(gate.available_permits(), 0);

    let blocked = tokio::time::timeout(Duration::from_millis(20), gate.acquire()).await;
    assert!(blocked.is_err(), "third acquire must wait");
    assert_eq!(gate.waiting(), 0, "timed out waiter leaves the line");

    drop(first);
    let third = tokio::time::timeout(Duration::from_millis(100), gate.acquire()).await?;

    drop(second);
    drop(third);
    assert_eq!(gate.available_permits(), 2);
    Ok(())
}

#[tokio::test]
async fn test_gate_wakes_waiters_in_order() -> Result<(), Box<dyn Error>> {
    let gate = ConcurrencyGate::new(1);
    let held = gate.acquire().await;
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for i in 0..3usize {
        let task_gate = gate.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move {
            let _permit = task_gate.acquire().await;
            order.lock().unwrap().push(i);
            tokio::time::sleep(Duration::from_millis(1)).await;
        }));
        while gate.waiting() < i + 1 {
            tokio::task::yield_now().await;
        }
    }

    drop(held);
    for handle in handles {
        handle.await?;
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    assert_eq!(gate.available_permits(), 1);
    Ok(())
}

#[tokio::test]
async fn test_cancelled_waiter_passes_permit_on() -> Result<(), Box<dyn Error>> {
    let gate = ConcurrencyGate::new(1);
    let held = gate.acquire().await;

    let abandoned = tokio::spawn({
        let gate = gate.clone();
        async move {
            let _permit = gate.acquire().await;
        }
    });
    while gate.waiting() < 1 {
        tokio::task::yield_now().await;
    }
    let next = tokio::spawn({
        let gate = gate.clone();
        async move {
            let _permit = gate.acquire().await;
        }
    });
    while gate.waiting() < 2 {
        tokio::task::yield_now().await;
    }

    // The permit is handed to the first waiter, which is cancelled before it runs.
    drop(held);
    abandoned.abort();

    tokio::time::timeout(Duration::from_millis(200), next).await??;
    assert_eq!(gate.available_permits(), 1);
    assert_eq!(gate.waiting(), 0);
    Ok(())
}

#[tokio::test]
async fn test_permit_released_when_holder_panics() -> Result<(), Box<dyn Error>> {
    let gate = ConcurrencyGate::new(1);

    let task = tokio::spawn({
        let gate = gate.clone();
        async move {
            let _permit = gate.acquire().await;
            panic!("handler blew up");
        }
    });
    assert!(task.await.is_err());

    assert_eq!(gate.available_permits(), 1);
    Ok(())
}
