//! Workspace-level integration tests for segpool; see `tests/`.
