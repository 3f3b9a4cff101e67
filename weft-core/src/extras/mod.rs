//! Optional facilities built on aspects

pub mod design_by_contract;

pub use design_by_contract::{Condition, Contract, ContractError, ContractKind, ContractSpec};
