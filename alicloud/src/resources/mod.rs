//! Resource implementations

pub mod cen_instance;
pub mod eip_address;
pub mod ram_user;
pub mod security_group;
pub mod vpc;

pub use cen_instance::CenInstanceResource;
pub use eip_address::EipAddressResource;
pub use ram_user::RamUserResource;
pub use security_group::SecurityGroupResource;
pub use vpc::VpcResource;
