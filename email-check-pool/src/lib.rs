//! Bounded-concurrency async task pool.
//!
//! Work items are queued with [`Pool::add`], admitted while fewer than
//! `concurrency` tasks are running, and supervised by [`Pool::wait`], which
//! polls running tasks, aborts the ones that exceed the timeout and dispatches
//! each outcome to the task's success or failure continuation.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use email_check_pool::Pool;
//!
//! # async fn demo() {
//! let mut pool = Pool::create()
//!     .concurrency(4)
//!     .timeout(Duration::from_secs(10))
//!     .poll_interval(Duration::from_millis(50));
//!
//! pool.add(async { Ok::<_, std::convert::Infallible>(21 * 2) })
//!     .on_success(|value| println!("got {value}"))
//!     .on_failure(|failure| eprintln!("failed: {failure}"));
//!
//! let report = pool.wait().await;
//! assert_eq!(report.succeeded(), 1);
//! # }
//! ```

mod error;
mod pool;
mod task;

pub use error::TaskFailure;
pub use pool::{Pool, PoolReport};
pub use task::{Task, TaskId, TaskState};
