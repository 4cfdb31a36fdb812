pub mod blockchain;
pub mod canonical;
pub mod cli;
pub mod proof;
pub mod protocol;
