mod discovery;
mod driver;
mod launcher;
mod session;
mod stealth;

pub use discovery::{discover_all_browsers, discover_browser, parse_version, BrowserInfo, BrowserType};
pub use driver::{PageDriver, SessionFactory};
pub use launcher::BrowserLauncher;
pub use session::{BrowserSession, ChromeSessionFactory};
pub use stealth::{build_user_agent, resolve_user_agent, FALLBACK_USER_AGENT};
