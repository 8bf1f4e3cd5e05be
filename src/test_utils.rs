// Test utilities - an in-memory native interface for exercising the adapter
//
// - mock_oci: scripted call-level interface that records every native call

mod mock_oci;

pub use mock_oci::{MockCell, MockConn, MockEvent, MockLob, MockOci, MockResult, MockStmt};
