pub mod address;
pub mod backend;
pub mod batch;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod dns;
pub mod error;
pub mod extract;
pub mod http;
pub mod logger;
pub mod pipeline;
pub mod retry;
pub mod reverse_ip;

pub use batch::CancelFlag;
pub use config::AppConfig;
pub use error::FissionError;
pub use pipeline::{Fission, RunSummary};
