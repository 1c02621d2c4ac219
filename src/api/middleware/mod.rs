pub mod cors;
pub mod identity;
pub mod verify_admin;
pub mod verify_gateway;
