mod controller;
mod session;
mod ticker;

pub use controller::{ControllerState, FinishOptions, SessionController};
pub use session::{
    Session, SessionDurations, SessionType, BASE_WORK_SECS, LONG_BREAK_SECS, SHORT_BREAK_SECS,
};
pub use ticker::{SessionTicker, TickUpdate, TickerHandle};
