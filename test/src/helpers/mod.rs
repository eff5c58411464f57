pub mod fake_clock;

pub use fake_clock::FakeClock;
pub use harness::{Harness, TestClient};
pub use recording_handler::RecordingHandler;
