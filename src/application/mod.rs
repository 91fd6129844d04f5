pub mod use_cases;

pub use use_cases::history::HistoryStore;
pub use use_cases::page::{Effect, Page, PageController, PageEvent};
pub use use_cases::page_flow::{FlowCommand, PageFlow, UiUpdate};
pub use use_cases::session::{SessionEvent, SessionHandle, TranslationSession};
