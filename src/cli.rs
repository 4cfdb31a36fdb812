/*
    This module contains a struct representing the CLI of the ledger client, along with
    the enum of available commands. The same enum is what the client sends to the daemon,
    so it is both a `clap` subcommand and a serde type.
*/

use crate::proof::parse_proof;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Deserialize, Parser, Serialize)]
pub struct Args {
    #[command(name = "command", subcommand)]
    pub cmd: Command,
}

impl Display for Args {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Command: {}", self.cmd)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, Subcommand)]
pub enum Command {
    /// View the full chain
    Chain,

    /// Submit a transaction to be included in the next block
    #[command(arg_required_else_help = true, allow_negative_numbers = true)]
    Transaction {
        /// The address of the sender
        #[arg(name = "SENDER")]
        sender: String,
        /// The address of the recipient
        #[arg(name = "RECIPIENT")]
        recipient: String,
        /// The amount to transfer
        #[arg(name = "AMOUNT")]
        amount: i64,
    },

    /// Mine a new block from the pending transactions
    Mine,

    /// View the transactions waiting for the next block
    Pending,

    /// Verify the hash linkage and proofs of the whole chain
    Validate,

    /// Check whether a proof is valid for the preceding proof
    #[command(arg_required_else_help = true)]
    CheckProof {
        /// The proof of the preceding block
        #[arg(name = "LAST_PROOF", value_parser = parse_proof)]
        last_proof: u64,
        /// The proof to check
        #[arg(name = "PROOF", value_parser = parse_proof)]
        proof: u64,
    },
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Command::Chain => write!(f, "chain"),
            Command::Transaction {
                sender,
                recipient,
                amount,
            } => write!(f, "transaction {} {} {}", sender, recipient, amount),
            Command::Mine => write!(f, "mine"),
            Command::Pending => write!(f, "pending"),
            Command::Validate => write!(f, "validate"),
            Command::CheckProof { last_proof, proof } => {
                write!(f, "check-proof {} {}", last_proof, proof)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        Args::try_parse_from(std::iter::once("client").chain(args.iter().copied()))
            .map(|args| args.cmd)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse(&["chain"]).unwrap(), Command::Chain);
        assert_eq!(parse(&["mine"]).unwrap(), Command::Mine);
        assert_eq!(
            parse(&["transaction", "alice", "bob", "-3"]).unwrap(),
            Command::Transaction {
                sender: "alice".into(),
                recipient: "bob".into(),
                amount: -3,
            }
        );
        assert_eq!(
            parse(&["check-proof", "100", "137543"]).unwrap(),
            Command::CheckProof {
                last_proof: 100,
                proof: 137543,
            }
        );
    }

    #[test]
    fn test_malformed_proof_is_rejected() {
        assert!(parse(&["check-proof", "100", "1.5"]).is_err());
        assert!(parse(&["check-proof", "abc", "1"]).is_err());
    }

    #[test]
    fn test_display_round_trips_through_parser() {
        let cmd = Command::Transaction {
            sender: "alice".into(),
            recipient: "bob".into(),
            amount: 10,
        };
        let line = cmd.to_string();
        let args = line.split_whitespace().collect::<Vec<_>>();
        assert_eq!(parse(&args).unwrap(), cmd);
    }
}
