//! The Content Directory Service core: object model, storage engine,
//! search/sort compilers, and the service-facing layers built on top of
//! them — client resolution, subscriptions, streaming IO, transcoding,
//! the external service ports, and the importer that feeds it all from
//! the filesystem.

pub mod autoscan;
pub mod clients;
pub mod error;
pub mod gena;
pub mod importer;
pub mod io;
pub mod object;
pub mod ports;
pub mod search;
pub mod service;
pub mod storage;
pub mod subscription;
pub mod transcode;
