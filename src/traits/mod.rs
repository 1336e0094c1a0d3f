pub mod callback;
pub mod driver;
pub mod loader;

pub use callback::{CallbackInvocation, FnCallback, LogSink, RankCallback};
pub use driver::{DriverCall, TransportDriver};
pub use loader::ProgramLoader;
