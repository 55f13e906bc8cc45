// ============================================================================
// src/lib.rs – drbd_shim: drive drbdsetup/drbdmeta from Rust
// ============================================================================
//! Resource lifecycle, minor binding, meta-data creation, attach/detach,
//! peering and role changes for kernel drbd, done by running the userland
//! tools and reading back `drbdsetup show all`.

pub mod cmd;
pub mod config;
pub mod drbd;
pub mod endpoint;
pub mod error;
pub mod provision;
pub mod resource;
pub mod show;
pub mod ui;
pub mod util;

pub use drbd::{minor_dev, Drbd, Settings};
pub use endpoint::{AddressFamily, Endpoint};
pub use error::{DrbdError, Result};
pub use provision::{
    connect_pair, disconnect_pair, provision, teardown, with_volume, Link, VolumeSpec,
};
pub use resource::Resource;
pub use show::{parse_show, ResourceShow, ShowReport, VolumeShow};
