pub mod history;
pub mod page;
pub mod page_flow;
pub mod session;
