//! Integration tests running the client and slave against a mock master.

mod helpers;

mod cache_test;
mod slave_test;
