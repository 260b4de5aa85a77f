//! Handle numbering in a fresh process.

mod common;

use common::CreateArgs;
use davhost::{davhost_cleanup, davhost_destroy_server};
use tempfile::TempDir;

#[test]
fn test_first_handle_is_zero_and_counting_survives_cleanup() {
    let dir = TempDir::new().unwrap();

    assert_eq!(CreateArgs::new(dir.path()).create(), 0);
    assert_eq!(CreateArgs::new(dir.path()).create(), 1);

    davhost_cleanup();
    assert_eq!(CreateArgs::new(dir.path()).create(), 2);
    assert_eq!(davhost_destroy_server(2), 0);
}
