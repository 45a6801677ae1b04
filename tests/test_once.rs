use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use httpipe::once::Once;

#[test]
fn test_once_runs_action_once_across_threads() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let once = Arc::new(Once::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        42
    }));

    let handles: Vec<_> = (0..1000)
        .map(|_| {
            let once = Arc::clone(&once);
            thread::spawn(move || *once.ensure_done())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 42);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_once_boxed_action() {
    let once: Once<String> = Once::new(Box::new(|| "done".to_string()));

    assert_eq!(once.get(), None);
    assert_eq!(once.ensure_done(), "done");
    assert_eq!(once.ensure_done(), "done");
    assert!(once.is_done());
}
