/*! Integration tests for coordtree.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - path: Tests for joining and validating node paths
 * - store: Tests for NodeStore primitives, composite operations, reconciliation and typed views
 * - transport: Tests for the in-memory transport and the retry decorator
 * - client: Tests for client startup, shutdown and connection-state notifications
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("coordtree=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod client;
mod path;
