// Adapters layer: the outside world a market node talks to (SOAP, audit files, market lookup).

pub mod audit;
pub mod directory;
pub mod soap;
