pub mod api;
pub mod codec;
pub mod executor;
pub mod lock;
pub mod post_id;
pub mod refresher;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod types;
pub mod validator;
pub mod worker;
