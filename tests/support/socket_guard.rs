//! Skip socket-bound tests where localhost cannot be bound.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

fn socket_tests_required() -> bool {
    std::env::var("SOCH_REQUIRE_SOCKET_TESTS")
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

#[track_caller]
fn should_skip_socket_bound_test() -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return false;
    }

    let location = Location::caller();
    let message = format!(
        "[socket-bound-test] cannot bind localhost socket at {}:{}",
        location.file(),
        location.line()
    );
    if socket_tests_required() {
        panic!("{message}. Set SOCH_REQUIRE_SOCKET_TESTS=0 to allow local skip behavior.");
    }

    eprintln!("{message}. Skipping test. Set SOCH_REQUIRE_SOCKET_TESTS=1 to fail-fast instead.");
    true
}

/// Starts a mock server, or returns `None` when localhost sockets are unavailable.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if should_skip_socket_bound_test() {
        None
    } else {
        Some(MockServer::start().await)
    }
}

/// Value returned by a skipped test.
pub fn socket_skip_return() -> Result<(), Box<dyn std::error::Error>> {
    Ok(())
}
