//! Integration tests: full decision cycles over in-memory collaborators.

mod cycle;
mod mock_venue;
