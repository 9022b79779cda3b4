//! Soloist - a single-user embedded application server.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── server        # Bootstrap and supervise the server
//! │   ├── manage        # migrate / collectstatic / token
//! │   └── completions   # Shell completions
//! ├── core/             # Core library components
//! │   ├── env           # .env file reading and writing
//! │   ├── secrets       # Idempotent secret provisioning
//! │   ├── settings      # Runtime environment and settings
//! │   ├── bootstrap     # Startup preparation and steps
//! │   ├── store         # sqlite identity store
//! │   ├── assets        # Static asset collection
//! │   └── supervisor    # Child process supervision
//! └── server/           # HTTP service (child process)
//!     ├── auth          # Single-user bearer authentication
//!     ├── routes        # Router and handlers
//!     └── reload        # Development auto-reload
//! ```
//!
//! # Flow
//!
//! `soloist server` provisions secrets in the data directory, merges them
//! into the environment, runs migrations and static collection, then
//! launches `soloist serve` as a child and waits on it. The child checks
//! every request's bearer token against the provisioned API token.

pub mod cli;
pub mod core;
pub mod error;
pub mod server;
