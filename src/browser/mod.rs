pub mod driver;
pub mod launcher;
pub mod session;

pub use driver::{ChromePage, ElementInfo, PageDriver};
pub use session::{BrowserSession, SessionState};
