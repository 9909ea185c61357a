//! Data source implementations

pub mod cen_instances;
pub mod ram_users;
pub mod vpcs;

pub use cen_instances::CenInstancesDataSource;
pub use ram_users::RamUsersDataSource;
pub use vpcs::VpcsDataSource;
