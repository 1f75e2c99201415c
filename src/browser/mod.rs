//! Browser-automation collaborator.
//!
//! The update loop only knows the [`ResumeSession`] seam; the WebDriver
//! mechanics live behind it so tests can drive the loop with fakes.

pub mod driver;
pub mod session;
pub mod webdriver;

pub use driver::DriverHandle;
pub use session::{FlowResult, ResumeSession, SessionFactory};
pub use webdriver::WebDriverFactory;
