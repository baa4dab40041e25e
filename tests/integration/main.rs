//! End-to-end tests over the in-memory stores and a temporary blob directory.

mod helpers;

mod documents_test;
mod tasks_test;
mod tenants_test;
