//! Ordering guarantees of the handler chain.

use bytes::Bytes;
use enforcer_chain::{
    error_handler_fn, sync_handler, Completion, Exchange, Flow, HandlerChain, HandlerEntry,
};
use enforcer_core::EnforcerError;
use parking_lot::Mutex;
use std::sync::Arc;

type Log = Arc<Mutex<Vec<u32>>>;

fn exchange() -> Exchange {
    Exchange::new(
        http::Request::builder()
            .uri("/not/declared")
            .body(Bytes::new())
            .unwrap(),
    )
}

fn normal(log: &Log, n: u32) -> HandlerEntry {
    let log = Arc::clone(log);
    HandlerEntry::normal(sync_handler(move |_| {
        log.lock().push(n);
        Ok(Flow::Next)
    }))
}

fn error_handler(log: &Log, n: u32) -> HandlerEntry {
    let log = Arc::clone(log);
    HandlerEntry::error_handling(error_handler_fn(move |_, _| {
        log.lock().push(n);
        Box::pin(async { Ok::<_, EnforcerError>(Flow::Next) })
    }))
}

#[tokio::test]
async fn panicking_handler_routes_to_next_error_handler() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let first = {
        let log = Arc::clone(&log);
        HandlerEntry::normal(sync_handler(move |_| {
            log.lock().push(1);
            panic!("first handler failed");
        }))
    };

    let chain = HandlerChain::new(vec![
        first,
        normal(&log, 2),
        error_handler(&log, 3),
        normal(&log, 4),
    ]);

    let completion = chain.run(&mut exchange(), None).await;
    assert!(matches!(completion, Completion::Finished(None)));
    assert_eq!(*log.lock(), vec![1, 3, 4]);
}

#[tokio::test]
async fn returned_error_routes_like_a_panic() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let first = {
        let log = Arc::clone(&log);
        HandlerEntry::normal(sync_handler(move |_| {
            log.lock().push(1);
            Err(EnforcerError::handler("failed"))
        }))
    };

    let chain = HandlerChain::new(vec![
        first,
        normal(&log, 2),
        error_handler(&log, 3),
        normal(&log, 4),
    ]);

    assert!(chain.run(&mut exchange(), None).await.into_error().is_none());
    assert_eq!(*log.lock(), vec![1, 3, 4]);
}

#[tokio::test]
async fn error_handlers_are_skipped_without_error() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let chain = HandlerChain::new(vec![
        normal(&log, 1),
        error_handler(&log, 2),
        normal(&log, 3),
    ]);

    chain.run(&mut exchange(), None).await;
    assert_eq!(*log.lock(), vec![1, 3]);
}

#[tokio::test]
async fn error_handler_can_rethrow() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let rethrow = {
        let log = Arc::clone(&log);
        HandlerEntry::error_handling(error_handler_fn(move |error, _| {
            log.lock().push(2);
            Box::pin(async move { Err::<Flow, _>(error) })
        }))
    };

    let chain = HandlerChain::new(vec![rethrow, error_handler(&log, 3)]);
    let completion = chain
        .run(&mut exchange(), Some(EnforcerError::handler("upstream")))
        .await;

    assert!(completion.into_error().is_none());
    assert_eq!(*log.lock(), vec![2, 3]);
}
