// Ledger data model shared by every other module
pub mod types;

// LedgerSource trait plus address parsing
pub mod data_sources;
// JSON-RPC connector for Ethereum nodes, and connect() which validates it before use
pub mod rpc_source;
// Endpoint credential and baseline loading
pub mod config;

// Block-range aggregation: walks the window and accumulates senders
pub mod vitals;

// Finished report and its health tier
pub mod summary;
// Console styling for the report
pub mod theme;
