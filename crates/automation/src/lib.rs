pub mod driver;
pub mod google;
pub mod probe;
pub mod selectors;
pub mod session;

pub use driver::{DriverReport, DriverSuccess};
pub use session::{BrowserSession, ChromeSession};
