//! Shared helpers for integration tests

#![allow(dead_code)]

mod index;
pub mod protocol;

use std::time::Duration;

use tokio::time::{sleep, timeout};

pub use index::{FakeIndex, FakeMetadata};

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
