pub mod bootstrap;
pub mod capture;
pub mod llm_clients;
pub mod storage;
pub mod update;
