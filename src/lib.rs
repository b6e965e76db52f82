//! This crate serves purely as a rest api abstraction for a small json document server.
//! Additionally there is a canonical server implementation in the same repository.
//!
//! ## Usage
//! For the complete usage, see the serde structs in [`api`].
//! Apart from the health probe, every response is wrapped in an [`api::Envelope`].
//! * `GET /api/health` returns a [`api::HealthResponse`].
//! * `GET /api/data` and `GET /api/data2` return the primary and secondary document.
//! * `POST /api/data` and `POST /api/data2` replace them with the request body.
//! * `GET /api/data/{n}` returns split document `n`, see [`api::SplitIndex`].
//! * `POST /api/command` runs a [`api::CommandRequest`] through the host shell.
//! * `GET /api/files` lists the json files of the data directory.
//!
//! ## Documents
//! The server never builds a path from request input. The primary and secondary
//! documents have fixed names chosen at startup, and split documents are named
//! `<base>_split_<n>.json` with `n` in `1..=20`.
//! Writes replace the whole document, and concurrent writes to the same document
//! race: the last one wins.
//!
//! ## Long running commands
//! A command is killed after its timeout (default [`api::DEFAULT_COMMAND_TIMEOUT_MS`])
//! and each output stream is limited to [`api::MAX_OUTPUT_BYTES`].
//! Exceeding either is reported as a failure carrying the output captured so far.
//!
//! ## Security
//! The api does not include any security measures, `/api/command` is *remote execution as a service!*.
//! Make sure it is only reachable from trusted hosts. E.g. by means of ssh port forwarding.

pub mod api;
