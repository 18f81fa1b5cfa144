//! Shared harness for pipeline integration tests
//!
//! - `recorder`: a [`Transport`](mediacore::transport::Transport) that records everything it is asked to do
//! - `tool`: a scripted [`MediaTool`](mediacore::media::tool::MediaTool)
//! - `fixtures`: temp database, pipeline settings and inbound requests

pub mod fixtures;
pub mod recorder;
pub mod tool;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use recorder::*;
#[allow(unused_imports)]
pub use tool::*;
