//! Connection core: configuration selection, the driver, the reconnect
//! policy, status presentation and the session tying them together.

pub mod driver;
pub mod presenter;
pub mod reconnect;
pub mod selector;
pub mod session;
pub mod worker;

pub use driver::{
    AttemptId, ConnectOrigin, ConnectionDriver, ConnectionFailure, FailureResponse, Finished,
    LocationRequest,
};
pub use presenter::{ConnectionStatusPresenter, StatusContext, UnexpectedDisconnect};
pub use reconnect::{reconnect_delay, ReconnectAttempt, ReconnectPhase, ReconnectPolicy};
pub use selector::ConnectionConfigurationSelector;
pub use session::Session;
pub use worker::{Job, QueuedWorker, ThreadWorker, Worker};
