//! Test suites for the btrmount service.

mod dispatch_behaviour;
pub(crate) mod support;
