pub mod activity_code;
pub mod agency_location;
pub mod application;
pub mod business;
pub mod claim;
pub mod contact;
pub mod ids;
pub mod insurer;
pub mod location;
pub mod payload;
pub mod policy;
pub mod policy_type;
pub mod question;
pub mod quote;
pub mod rules;
