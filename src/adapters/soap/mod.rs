pub mod client;
pub mod envelope;
pub mod server;
pub mod wsdl;

pub use client::SoapClient;
pub use envelope::{Operation, SoapCall};
pub use server::{dispatch, router, SERVICE_PATH};
